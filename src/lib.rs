//! argguard - declarative argument validation on top of a flag tokenizer.
//!
//! Register flags and positionals on an [`ArgParser`], attach rules
//! (required, mutually exclusive, option lists, patterns, non-empty), then
//! parse. Values land in shared [`Slot`]s; rule violations come back as a
//! [`ParseError`]. Sub-commands implement [`Command`] and are run with
//! [`ArgParser::dispatch`].

pub mod command;
pub mod config;
pub mod flags;
pub mod help;
pub mod output;
pub mod parser;
mod pipeline;
mod quote;
pub mod slot;
pub mod table;

pub use command::{
    run_command, CaptureError, Command, CommandOutput, CommandResult, Dispatch, DispatchError,
    ResultData,
};
pub use config::{Config, ConfigError, DeclaredCommand, Values};
pub use flags::{Flag, FlagError, FlagSet, FlagValue};
pub use help::HelpRequest;
pub use output::{render_json, render_result_text, render_text, Report};
pub use parser::{ArgParser, ParseError, ParseOutcome};
pub use slot::{BoolSlot, IntSlot, ListSlot, Slot, StrSlot};
pub use table::{Operation, RegistrationError, Violation};
