//! Sub-command dispatch and result capture.
//!
//! A command registers its own flags and positionals on a parser built just
//! for it, then executes against the values that parser bound.

use crate::help::HelpRequest;
use crate::parser::{ArgParser, ParseError, ParseOutcome};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Payload a command hands back: something with a display string that can
/// also be rendered as JSON.
pub trait ResultData: fmt::Display {
    fn to_json(&self) -> serde_json::Result<serde_json::Value>;
}

impl<T: fmt::Display + Serialize> ResultData for T {
    fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// What a command's execution produced.
#[derive(Default)]
pub struct CommandOutput {
    pub payload: Option<Box<dyn ResultData>>,
    pub errors: Vec<anyhow::Error>,
}

impl CommandOutput {
    /// No payload and no errors.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_payload(payload: impl ResultData + 'static) -> Self {
        Self {
            payload: Some(Box::new(payload)),
            errors: Vec::new(),
        }
    }

    pub fn error(mut self, err: impl Into<anyhow::Error>) -> Self {
        self.errors.push(err.into());
        self
    }
}

/// A runnable sub-command.
pub trait Command {
    /// Register this command's flags and positionals on `parser`.
    fn args(&mut self, parser: &mut ArgParser);

    /// Execute using the values bound during [`Command::args`].
    fn execute(&mut self) -> CommandOutput;
}

/// The payload returned by a command breaks the [`ResultData`] contract.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("command result capture: payload cannot be serialized: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("command result capture: payload serialized to null")]
    NullPayload,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The command's own arguments were rejected.
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("no command selected, a successful parse must come first")]
    NotSelected,
}

/// Captured outcome of one command run.
pub struct CommandResult {
    name: String,
    payload: Option<Box<dyn ResultData>>,
    json: Option<serde_json::Value>,
    errors: Vec<anyhow::Error>,
}

impl CommandResult {
    /// Validate a command's output and keep it for rendering.
    pub fn capture(name: &str, output: CommandOutput) -> Result<Self, CaptureError> {
        let json = match output.payload {
            Some(ref payload) => match payload.to_json()? {
                serde_json::Value::Null => return Err(CaptureError::NullPayload),
                value => Some(value),
            },
            None => None,
        };
        Ok(Self {
            name: name.to_string(),
            payload: output.payload,
            json,
            errors: output.errors,
        })
    }

    /// Name the command was invoked as.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> Option<&dyn ResultData> {
        self.payload.as_deref()
    }

    pub fn json(&self) -> Option<&serde_json::Value> {
        self.json.as_ref()
    }

    pub fn errors(&self) -> &[anyhow::Error] {
        &self.errors
    }

    /// Error messages including their causes.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| format!("{:#}", e)).collect()
    }
}

impl fmt::Debug for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandResult")
            .field("name", &self.name)
            .field("json", &self.json)
            .field("errors", &self.error_messages())
            .finish()
    }
}

impl Serialize for CommandResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if !self.errors.is_empty() {
            map.serialize_entry("error", &self.error_messages())?;
        }
        if let Some(ref json) = self.json {
            map.serialize_entry("result", json)?;
        }
        map.end()
    }
}

/// Outcome of running a command.
#[derive(Debug)]
pub enum Dispatch {
    Completed(CommandResult),
    /// The command's parser asked for its usage text to be shown.
    Help(HelpRequest),
}

/// Run `command` as `name` against the tokens that followed its name.
///
/// Builds a fresh parser for the command, lets it register its arguments,
/// validates `opts`, and only then executes.
pub fn run_command(
    name: &str,
    command: &mut dyn Command,
    opts: &[String],
) -> Result<Dispatch, DispatchError> {
    let mut parser = ArgParser::for_command(name);
    command.args(&mut parser);

    if let ParseOutcome::Help(help) = parser.parse(opts)? {
        return Ok(Dispatch::Help(help));
    }

    debug!(command = name, "executing command");
    let output = command.execute();
    let result = CommandResult::capture(name, output)?;
    debug!(
        command = name,
        errors = result.errors().len(),
        has_payload = result.json().is_some(),
        "command finished"
    );
    Ok(Dispatch::Completed(result))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parser::tests::registration_panic;
    use crate::slot::{ListSlot, StrSlot};
    use serde::Serialize;

    #[derive(Debug, Serialize)]
    struct Greeting {
        text: String,
    }

    impl fmt::Display for Greeting {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.text)
        }
    }

    struct Nothing;

    impl fmt::Display for Nothing {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("nothing")
        }
    }

    impl Serialize for Nothing {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_unit()
        }
    }

    /// Command that records how it was driven.
    #[derive(Default)]
    pub(crate) struct Probe {
        pub args_called: usize,
        pub execute_called: usize,
        pub target: StrSlot,
    }

    impl Command for Probe {
        fn args(&mut self, parser: &mut ArgParser) {
            self.args_called += 1;
            parser.add_fixed_positional(&self.target, "target", "what to greet");
        }

        fn execute(&mut self) -> CommandOutput {
            self.execute_called += 1;
            CommandOutput::with_payload(Greeting {
                text: format!("hello {}", self.target.get()),
            })
        }
    }

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_run_registers_parses_and_captures() {
        let mut probe = Probe::default();
        let outcome = run_command("greet", &mut probe, &args(&["world"])).unwrap();

        let Dispatch::Completed(result) = outcome else {
            panic!("Expected Completed");
        };
        assert_eq!(result.name(), "greet");
        assert_eq!(probe.args_called, 1);
        assert_eq!(probe.execute_called, 1);
        assert_eq!(result.payload().unwrap().to_string(), "hello world");
        assert!(result.errors().is_empty());
    }

    #[test]
    fn test_run_does_not_execute_on_parse_error() {
        let mut probe = Probe::default();
        let err = run_command("greet", &mut probe, &args(&["a", "b"])).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Parse(ParseError::UnexpectedPositionals)
        ));
        assert_eq!(probe.execute_called, 0);
    }

    #[test]
    fn test_run_without_args_shows_command_usage() {
        let mut probe = Probe::default();
        let outcome = run_command("greet", &mut probe, &[]).unwrap();
        let Dispatch::Help(help) = outcome else {
            panic!("Expected Help");
        };
        assert!(help.text.starts_with("usage: greet [option].. target\n"));
        assert_eq!(help.exit_code, 1);
        assert_eq!(probe.execute_called, 0);
    }

    #[test]
    fn test_capture_keeps_errors_without_payload() {
        let output = CommandOutput::empty().error(anyhow::anyhow!("e1")).error(anyhow::anyhow!("e2"));
        let result = CommandResult::capture("x", output).unwrap();
        assert!(result.payload().is_none());
        assert_eq!(result.error_messages(), vec!["e1", "e2"]);
    }

    #[test]
    fn test_capture_rejects_null_payload() {
        let output = CommandOutput::with_payload(Nothing);
        let err = CommandResult::capture("x", output).unwrap_err();
        assert!(matches!(err, CaptureError::NullPayload));
    }

    #[test]
    fn test_serialize_result_and_errors() {
        let output = CommandOutput::with_payload(Greeting {
            text: "hello".to_string(),
        })
        .error(anyhow::anyhow!("a"))
        .error(anyhow::anyhow!("b"));
        let result = CommandResult::capture("x", output).unwrap();

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"error": ["a", "b"], "result": {"text": "hello"}})
        );
    }

    #[test]
    fn test_serialize_omits_empty_fields() {
        let result = CommandResult::capture("x", CommandOutput::empty()).unwrap();
        assert_eq!(serde_json::to_string(&result).unwrap(), "{}");
    }

    #[test]
    fn test_error_messages_include_context() {
        let err = anyhow::anyhow!("disk full").context("writing report");
        let result = CommandResult::capture("x", CommandOutput::empty().error(err)).unwrap();
        assert_eq!(result.error_messages(), vec!["writing report: disk full"]);
    }

    #[test]
    fn test_sub_command_cannot_nest_commands() {
        let err = registration_panic(|| {
            struct Nested;
            impl Command for Nested {
                fn args(&mut self, parser: &mut ArgParser) {
                    parser.init_command_table(&StrSlot::new(), Some(&ListSlot::new()));
                }
                fn execute(&mut self) -> CommandOutput {
                    CommandOutput::empty()
                }
            }
            let _ = run_command("outer", &mut Nested, &args(&["x"]));
        });
        assert_eq!(
            err.to_string(),
            "init_command_table(): cannot be defined in a sub-command parser"
        );
    }
}
