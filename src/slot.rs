//! Shared cells the parser writes parsed values into.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A bound program variable.
///
/// The caller keeps one clone and hands another to the parser; after a
/// successful parse the caller reads the value back with [`Slot::get`].
/// Clones share storage, so two slots are "the same target" exactly when
/// [`Slot::same_as`] says so.
pub struct Slot<T>(Rc<RefCell<T>>);

/// Target of a string flag or fixed positional argument.
pub type StrSlot = Slot<String>;
/// Target of a variadic positional argument or command options.
pub type ListSlot = Slot<Vec<String>>;
/// Target of a bool flag.
pub type BoolSlot = Slot<bool>;
/// Target of an int flag.
pub type IntSlot = Slot<i64>;

impl<T: Default> Slot<T> {
    pub fn new() -> Self {
        Self::with(T::default())
    }
}

impl<T: Default> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slot<T> {
    pub fn with(value: T) -> Self {
        Slot(Rc::new(RefCell::new(value)))
    }

    pub fn set(&self, value: T) {
        *self.0.borrow_mut() = value;
    }

    /// Whether both slots point at the same storage.
    pub fn same_as(&self, other: &Slot<T>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Run `f` against the current value without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.borrow())
    }
}

impl<T: Clone> Slot<T> {
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Slot(Rc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Slot").field(&self.0.borrow()).finish()
    }
}
