//! Registration table: the declared rules a parser validates against.

use crate::command::Command;
use crate::parser::ParseError;
use crate::quote::quote;
use crate::slot::{ListSlot, StrSlot};
use regex::Regex;
use std::fmt;
use thiserror::Error;

/// Registration operation that detected a contract violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    DefineFlag,
    MarkRequired,
    DeclareMutuallyExclusive,
    RestrictToOptions,
    RestrictToPattern,
    ForbidEmpty,
    AddFixedPositional,
    AddVariadicPositional,
    InitCommandTable,
    AddCommand,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::DefineFlag => "define_flag",
            Operation::MarkRequired => "mark_required",
            Operation::DeclareMutuallyExclusive => "declare_mutually_exclusive",
            Operation::RestrictToOptions => "restrict_to_options",
            Operation::RestrictToPattern => "restrict_to_pattern",
            Operation::ForbidEmpty => "forbid_empty",
            Operation::AddFixedPositional => "add_fixed_positional",
            Operation::AddVariadicPositional => "add_variadic_positional",
            Operation::InitCommandTable => "init_command_table",
            Operation::AddCommand => "add_command",
        };
        f.write_str(name)
    }
}

/// Why a registration was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("with empty name")]
    EmptyName,

    #[error("for undefined flag")]
    UndefinedFlag,

    #[error("for undefined flag {}", quote(.0))]
    UndefinedGroupMember(String),

    #[error("for a flag that is not a string value")]
    NotString,

    #[error("post-parse")]
    PostParse,

    #[error("with less than two names")]
    TooFewNames,

    #[error("with duplicate values")]
    DuplicateNames,

    #[error("with max(0)")]
    ZeroMax,

    #[error("with min({min}) > max({max})")]
    MinAboveMax { min: usize, max: usize },

    #[error("as add_variadic_positional({}) is already defined", quote(.0))]
    VariadicDefined(String),

    #[error("as add_fixed_positional({}) is already defined", quote(.0))]
    FixedDefined(String),

    #[error("using the same target as add_fixed_positional({})", quote(.0))]
    SameTarget(String),

    #[error("as already defined as flag")]
    DefinedAsFlag,

    #[error("as already defined as positional argument")]
    DefinedAsPositional,

    #[error("as shorthand '{}' is already used by flag {}", .0, quote(.1))]
    ShorthandTaken(char, String),

    #[error("as init_command_table() has already been defined")]
    CommandTableDefined,

    #[error("as init_command_table() has not been defined")]
    CommandTableMissing,

    #[error("as positional arguments have been defined")]
    PositionalsDefined,

    #[error("as add_command({}) is already defined", quote(.0))]
    CommandDefined(String),

    #[error("in a sub-command parser")]
    NestedCommandTable,

    #[error("due to: {0}")]
    InvalidPattern(String),
}

/// A programmer error in the registration sequence.
///
/// Never returned as a value: registration methods abort with it, see
/// [`crate::parser::ArgParser`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{op}({subject}): cannot be defined {violation}")]
pub struct RegistrationError {
    pub op: Operation,
    pub subject: String,
    pub violation: Violation,
}

impl RegistrationError {
    pub fn new(op: Operation, subject: impl Into<String>, violation: Violation) -> Self {
        Self {
            op,
            subject: subject.into(),
            violation,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FixedPositional {
    pub target: StrSlot,
    pub name: String,
    pub usage: String,
}

#[derive(Debug, Clone)]
pub(crate) struct VariadicPositional {
    pub target: ListSlot,
    pub name: String,
    pub usage: String,
    pub min: usize,
    /// `None` means unbounded.
    pub max: Option<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct OptionConstraint {
    pub name: String,
    pub target: StrSlot,
    pub options: Vec<String>,
}

impl OptionConstraint {
    pub fn check(&self) -> Result<(), ParseError> {
        let value = self.target.get();
        if self.options.contains(&value) {
            return Ok(());
        }
        Err(ParseError::NotAmongOptions {
            name: self.name.clone(),
            value,
            options: self.options.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PatternConstraint {
    pub name: String,
    pub target: StrSlot,
    pub pattern: Regex,
}

impl PatternConstraint {
    pub fn check(&self) -> Result<(), ParseError> {
        let value = self.target.get();
        if self.pattern.is_match(&value) {
            return Ok(());
        }
        Err(ParseError::NotMatchingPattern {
            name: self.name.clone(),
            value,
            pattern: self.pattern.as_str().to_string(),
        })
    }
}

pub(crate) struct CommandEntry {
    pub name: String,
    pub description: String,
    pub command: Box<dyn Command>,
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Command chosen by the last parse and the tokens left for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Selection {
    pub index: usize,
    pub options: Vec<String>,
}

/// Registered sub-commands plus the cells the command stage writes into.
#[derive(Debug)]
pub(crate) struct CommandTable {
    pub name_target: StrSlot,
    /// Remaining tokens after the command name; `None` rejects them.
    pub options_target: Option<ListSlot>,
    pub entries: Vec<CommandEntry>,
    pub selected: Option<Selection>,
}

/// Everything declared on one parser. Owned by exactly one
/// [`crate::parser::ArgParser`].
#[derive(Debug, Default)]
pub(crate) struct RegistrationTable {
    pub required: Vec<String>,
    pub exclusive: Vec<Vec<String>>,
    pub options: Vec<OptionConstraint>,
    pub patterns: Vec<PatternConstraint>,
    pub non_empty: Vec<String>,
    pub fixed: Vec<FixedPositional>,
    pub variadic: Option<VariadicPositional>,
    pub commands: Option<CommandTable>,
}

impl RegistrationTable {
    pub fn fixed_named(&self, name: &str) -> Option<&FixedPositional> {
        self.fixed.iter().find(|p| p.name == name)
    }

    pub fn has_positionals(&self) -> bool {
        !self.fixed.is_empty() || self.variadic.is_some()
    }

    /// Whether running with no arguments at all can never succeed.
    pub fn has_obligations(&self) -> bool {
        self.commands.is_some()
            || !self.fixed.is_empty()
            || self.variadic.as_ref().is_some_and(|v| v.min > 0)
            || !self.required.is_empty()
    }
}
