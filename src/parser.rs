//! Argument parser: rule registration and the parse entry point.
//!
//! Registration methods check their arguments against what is already
//! declared and abort on a contract violation, since a correct caller never
//! triggers one. Problems with the user's input are returned from
//! [`ArgParser::parse`] as a [`ParseError`].

use crate::command::{run_command, Command, Dispatch, DispatchError};
use crate::flags::{Flag, FlagError, FlagSet, FlagValue};
use crate::help::{render_usage, HelpRequest};
use crate::pipeline::{self, ParseState};
use crate::quote::{quote, quote_list};
use crate::slot::{BoolSlot, IntSlot, ListSlot, StrSlot};
use crate::table::{
    CommandEntry, CommandTable, FixedPositional, OptionConstraint, Operation, PatternConstraint,
    RegistrationError, RegistrationTable, VariadicPositional, Violation,
};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Errors in the user's input, reported by [`ArgParser::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Flag(#[from] FlagError),

    #[error("missing command")]
    MissingCommand,

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("options not allowed for command: {0}")]
    OptionsNotAllowed(String),

    #[error("no positional arguments expected")]
    NoPositionalsExpected,

    #[error("insufficient number of positional arguments, see --help")]
    InsufficientPositionals,

    #[error("no {} positional argument(s) provided, see --help", quote(.name))]
    NoneProvided { name: String },

    #[error("no {} positional argument(s) provided, expected {min}, see --help", quote(.name))]
    NoneProvidedExpected { name: String, min: usize },

    #[error("got {got} {} positional argument(s), expected {min} at least, see --help", quote(.name))]
    TooFew { name: String, got: usize, min: usize },

    #[error("got {got} {} positional argument(s), expected {max} at most, see --help", quote(.name))]
    TooMany { name: String, got: usize, max: usize },

    #[error("unexpected number of positional arguments")]
    UnexpectedPositionals,

    #[error("missing required flag: {0}")]
    MissingRequired(String),

    #[error("missing required flags: {}", .0.join(", "))]
    MissingRequiredMany(Vec<String>),

    #[error("{0} and {1} are mutually exclusive flags")]
    MutuallyExclusive(String, String),

    #[error("flag/argument is empty: {0}")]
    Empty(String),

    #[error("flags/arguments are empty: {}", .0.join(", "))]
    EmptyMany(Vec<String>),

    #[error(
        "{name}: invalid value: {} is not among options: {}",
        quote(.value),
        quote_list(.options)
    )]
    NotAmongOptions {
        name: String,
        value: String,
        options: Vec<String>,
    },

    #[error(
        "{name}: invalid value: {} is not matching regexp {}",
        quote(.value),
        quote(.pattern)
    )]
    NotMatchingPattern {
        name: String,
        value: String,
        pattern: String,
    },
}

/// Outcome of a parse that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// All rules passed and every bound slot is populated.
    Parsed,
    /// Usage text must be shown instead; see [`HelpRequest::exit`].
    Help(HelpRequest),
}

/// Abort on a registration contract violation.
///
/// The panic payload is the [`RegistrationError`] itself, so it can be told
/// apart from any other panic with `downcast_ref::<RegistrationError>()`.
fn fatal(err: RegistrationError) -> ! {
    error!(operation = %err.op, error = %err, "invalid argument registration");
    std::panic::panic_any(err)
}

/// A flag set plus the declarative rules validated after tokenizing.
#[derive(Debug)]
pub struct ArgParser {
    name: String,
    flags: FlagSet,
    table: RegistrationTable,
    help: BoolSlot,
    nested: bool,
}

impl ArgParser {
    /// Create a parser for program `name` with `-h/--help` registered.
    pub fn new(name: &str) -> Self {
        let help = BoolSlot::new();
        let mut flags = FlagSet::new();
        flags.add(Flag::new(
            "help",
            Some('h'),
            "display this help text and exit",
            FlagValue::Bool(help.clone()),
        ));
        Self {
            name: name.to_string(),
            flags,
            table: RegistrationTable::default(),
            help,
            nested: false,
        }
    }

    /// Parser owned by a sub-command; it cannot declare commands itself.
    pub(crate) fn for_command(name: &str) -> Self {
        Self {
            nested: true,
            ..Self::new(name)
        }
    }

    /// Program name used in help text.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    /// Whether `name` was explicitly supplied by the user.
    pub fn changed(&self, name: &str) -> bool {
        self.flags.lookup(name).is_some_and(|f| f.changed)
    }

    /// Name of the command chosen by the last parse.
    pub fn selected_command(&self) -> Option<&str> {
        let commands = self.table.commands.as_ref()?;
        let selection = commands.selected.as_ref()?;
        Some(commands.entries[selection.index].name.as_str())
    }

    /// Usage text as shown for `--help`.
    pub fn usage(&self) -> String {
        render_usage(&self.name, &self.table, &self.flags)
    }

    fn commit(op: Operation, subject: String, result: Result<(), Violation>) {
        if let Err(violation) = result {
            fatal(RegistrationError::new(op, subject, violation));
        }
    }

    fn not_parsed(&self) -> Result<(), Violation> {
        if self.flags.parsed() {
            return Err(Violation::PostParse);
        }
        Ok(())
    }

    fn check_flag(&self, flag: &Flag) -> Result<(), Violation> {
        if flag.name.is_empty() {
            return Err(Violation::EmptyName);
        }
        if self.flags.lookup(&flag.name).is_some() {
            return Err(Violation::DefinedAsFlag);
        }
        if let Some(short) = flag.short {
            if let Some(other) = self.flags.lookup_short(short) {
                return Err(Violation::ShorthandTaken(short, other.name.clone()));
            }
        }
        if self.table.fixed_named(&flag.name).is_some()
            || self.table.variadic.as_ref().is_some_and(|v| v.name == flag.name)
        {
            return Err(Violation::DefinedAsPositional);
        }
        self.not_parsed()
    }

    fn define_flag(&mut self, flag: Flag) {
        let result = self.check_flag(&flag);
        Self::commit(Operation::DefineFlag, quote(&flag.name), result);
        self.flags.add(flag);
    }

    /// Define a string flag bound to `target`, which is set to `default`.
    pub fn string_var(
        &mut self,
        target: &StrSlot,
        name: &str,
        short: Option<char>,
        default: &str,
        usage: &str,
    ) {
        target.set(default.to_string());
        self.define_flag(Flag::new(name, short, usage, FlagValue::Str(target.clone())));
    }

    /// Define a bool flag bound to `target`, which is set to `default`.
    pub fn bool_var(
        &mut self,
        target: &BoolSlot,
        name: &str,
        short: Option<char>,
        default: bool,
        usage: &str,
    ) {
        target.set(default);
        self.define_flag(Flag::new(name, short, usage, FlagValue::Bool(target.clone())));
    }

    /// Define an int flag bound to `target`, which is set to `default`.
    pub fn int_var(
        &mut self,
        target: &IntSlot,
        name: &str,
        short: Option<char>,
        default: i64,
        usage: &str,
    ) {
        target.set(default);
        self.define_flag(Flag::new(name, short, usage, FlagValue::Int(target.clone())));
    }

    /// Require the named flag to be explicitly supplied.
    pub fn mark_required(&mut self, name: &str) {
        let result = if name.is_empty() {
            Err(Violation::EmptyName)
        } else if self.flags.lookup(name).is_none() {
            Err(Violation::UndefinedFlag)
        } else {
            self.not_parsed()
        };
        Self::commit(Operation::MarkRequired, quote(name), result);
        self.table.required.push(name.to_string());
    }

    fn check_group(&self, names: &[&str]) -> Result<(), Violation> {
        if names.len() < 2 {
            return Err(Violation::TooFewNames);
        }
        let mut seen = std::collections::HashSet::new();
        if !names.iter().all(|name| seen.insert(*name)) {
            return Err(Violation::DuplicateNames);
        }
        if let Some(missing) = names.iter().find(|n| self.flags.lookup(n).is_none()) {
            return Err(Violation::UndefinedGroupMember(missing.to_string()));
        }
        self.not_parsed()
    }

    /// Allow at most one of the named flags to be supplied.
    pub fn declare_mutually_exclusive(&mut self, names: &[&str]) {
        let result = self.check_group(names);
        Self::commit(
            Operation::DeclareMutuallyExclusive,
            quote_list(names),
            result,
        );
        self.table
            .exclusive
            .push(names.iter().map(|n| n.to_string()).collect());
    }

    /// Check shared by the string-only constraints: `name` must be a fixed
    /// positional or a string flag.
    fn string_ref(&self, name: &str) -> Result<(), Violation> {
        if name.is_empty() {
            return Err(Violation::EmptyName);
        }
        if self.table.fixed_named(name).is_none() {
            let flag = self.flags.lookup(name).ok_or(Violation::UndefinedFlag)?;
            if !flag.value.is_string() {
                return Err(Violation::NotString);
            }
        }
        Ok(())
    }

    /// Restrict a string flag or fixed positional to one of `options`.
    pub fn restrict_to_options(&mut self, target: &StrSlot, name: &str, options: &[&str]) {
        let result = self.string_ref(name).and_then(|_| self.not_parsed());
        Self::commit(Operation::RestrictToOptions, quote(name), result);
        self.table.options.push(OptionConstraint {
            name: name.to_string(),
            target: target.clone(),
            options: options.iter().map(|o| o.to_string()).collect(),
        });
    }

    /// Restrict a string flag or fixed positional to values matching `pattern`.
    pub fn restrict_to_pattern(&mut self, target: &StrSlot, name: &str, pattern: &str) {
        let pattern = self
            .string_ref(name)
            .and_then(|_| Regex::new(pattern).map_err(|e| Violation::InvalidPattern(e.to_string())))
            .and_then(|re| self.not_parsed().map(|_| re))
            .unwrap_or_else(|violation| {
                fatal(RegistrationError::new(
                    Operation::RestrictToPattern,
                    quote(name),
                    violation,
                ))
            });
        self.table.patterns.push(PatternConstraint {
            name: name.to_string(),
            target: target.clone(),
            pattern,
        });
    }

    /// Reject an empty final value for a string flag or fixed positional.
    pub fn forbid_empty(&mut self, name: &str) {
        let result = self.string_ref(name).and_then(|_| self.not_parsed());
        Self::commit(Operation::ForbidEmpty, quote(name), result);
        self.table.non_empty.push(name.to_string());
    }

    fn check_fixed(&self, target: &StrSlot, name: &str) -> Result<(), Violation> {
        if name.is_empty() {
            return Err(Violation::EmptyName);
        }
        if self.table.commands.is_some() {
            return Err(Violation::CommandTableDefined);
        }
        if self.flags.lookup(name).is_some() {
            return Err(Violation::DefinedAsFlag);
        }
        for pos in &self.table.fixed {
            if pos.name == name {
                return Err(Violation::FixedDefined(pos.name.clone()));
            }
            if pos.target.same_as(target) {
                return Err(Violation::SameTarget(pos.name.clone()));
            }
        }
        if let Some(ref variadic) = self.table.variadic {
            return Err(Violation::VariadicDefined(variadic.name.clone()));
        }
        self.not_parsed()
    }

    fn check_variadic(&self, name: &str, min: usize, max: Option<usize>) -> Result<(), Violation> {
        if name.is_empty() {
            return Err(Violation::EmptyName);
        }
        if self.table.commands.is_some() {
            return Err(Violation::CommandTableDefined);
        }
        match max {
            Some(0) => return Err(Violation::ZeroMax),
            Some(max) if min > max => return Err(Violation::MinAboveMax { min, max }),
            _ => {}
        }
        if let Some(ref variadic) = self.table.variadic {
            return Err(Violation::VariadicDefined(variadic.name.clone()));
        }
        if self.table.fixed_named(name).is_some() {
            return Err(Violation::FixedDefined(name.to_string()));
        }
        if self.flags.lookup(name).is_some() {
            return Err(Violation::DefinedAsFlag);
        }
        self.not_parsed()
    }

    /// Declare the next single positional argument, bound to `target`.
    pub fn add_fixed_positional(&mut self, target: &StrSlot, name: &str, usage: &str) {
        let result = self.check_fixed(target, name);
        Self::commit(Operation::AddFixedPositional, quote(name), result);
        self.table.fixed.push(FixedPositional {
            target: target.clone(),
            name: name.to_string(),
            usage: usage.to_string(),
        });
    }

    /// Declare a trailing positional taking between `min` and `max` values;
    /// `max` of `None` is unbounded.
    pub fn add_variadic_positional(
        &mut self,
        target: &ListSlot,
        name: &str,
        usage: &str,
        min: usize,
        max: Option<usize>,
    ) {
        let result = self.check_variadic(name, min, max);
        Self::commit(Operation::AddVariadicPositional, quote(name), result);
        self.table.variadic = Some(VariadicPositional {
            target: target.clone(),
            name: name.to_string(),
            usage: usage.to_string(),
            min,
            max,
        });
    }

    /// Declare that the first positional token selects a command.
    ///
    /// The selected name is written to `name_target`. Tokens after the name
    /// go to `options_target`; without one they are rejected.
    pub fn init_command_table(&mut self, name_target: &StrSlot, options_target: Option<&ListSlot>) {
        let result = if self.nested {
            Err(Violation::NestedCommandTable)
        } else if self.table.commands.is_some() {
            Err(Violation::CommandTableDefined)
        } else if self.table.has_positionals() {
            Err(Violation::PositionalsDefined)
        } else {
            self.not_parsed()
        };
        Self::commit(Operation::InitCommandTable, String::new(), result);

        // Flags after the command name belong to the command
        self.flags.set_interspersed(false);
        self.table.commands = Some(CommandTable {
            name_target: name_target.clone(),
            options_target: options_target.cloned(),
            entries: Vec::new(),
            selected: None,
        });
    }

    fn check_command(&self, name: &str) -> Result<(), Violation> {
        if name.is_empty() {
            return Err(Violation::EmptyName);
        }
        let commands = self
            .table
            .commands
            .as_ref()
            .ok_or(Violation::CommandTableMissing)?;
        if self.table.has_positionals() {
            return Err(Violation::PositionalsDefined);
        }
        if commands.entries.iter().any(|c| c.name == name) {
            return Err(Violation::CommandDefined(name.to_string()));
        }
        self.not_parsed()
    }

    /// Register a named command. [`ArgParser::init_command_table`] must come first.
    pub fn add_command(
        &mut self,
        name: &str,
        description: &str,
        command: impl Command + 'static,
    ) {
        let result = self.check_command(name);
        Self::commit(Operation::AddCommand, quote(name), result);

        if let Some(ref mut commands) = self.table.commands {
            commands.entries.push(CommandEntry {
                name: name.to_string(),
                description: description.to_string(),
                command: Box::new(command),
            });
        }
    }

    /// Tokenize `tokens` and run every validation stage in order.
    ///
    /// `tokens` excludes the program name. A parser is meant to parse once.
    pub fn parse(&mut self, tokens: &[String]) -> Result<ParseOutcome, ParseError> {
        if self.flags.parsed() {
            warn!(parser = %self.name, "parser reused, results are unspecified");
        }
        debug!(parser = %self.name, ?tokens, "parsing arguments");

        self.flags.parse(tokens)?;

        let mut state = ParseState {
            program: &self.name,
            flags: &self.flags,
            table: &mut self.table,
            supplied: tokens.len(),
            help_requested: self.help.get(),
            leftover: self.flags.args().to_vec(),
        };
        pipeline::run(&mut state)
    }

    /// Parse the current process arguments.
    pub fn parse_env_args(&mut self) -> Result<ParseOutcome, ParseError> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        self.parse(&args)
    }

    /// Run the command selected by the last successful parse.
    pub fn dispatch(&mut self) -> Result<Dispatch, DispatchError> {
        let commands = self
            .table
            .commands
            .as_mut()
            .ok_or(DispatchError::NotSelected)?;
        let selection = commands
            .selected
            .clone()
            .ok_or(DispatchError::NotSelected)?;
        let CommandEntry { name, command, .. } = &mut commands.entries[selection.index];
        run_command(name, command.as_mut(), &selection.options)
    }
}
