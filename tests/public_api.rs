use argguard::{
    ArgParser, BoolSlot, Command, CommandOutput, Dispatch, DispatchError, ListSlot, ParseError,
    Operation, ParseOutcome, RegistrationError, StrSlot, Violation,
};
use serde::Serialize;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

fn args(s: &[&str]) -> Vec<String> {
    s.iter().map(|s| s.to_string()).collect()
}

#[derive(Serialize)]
struct Copied {
    from: String,
    to: Vec<String>,
}

impl fmt::Display for Copied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to.join(","))
    }
}

#[derive(Default)]
struct CopyFiles {
    force: BoolSlot,
    from: StrSlot,
    to: ListSlot,
}

impl Command for CopyFiles {
    fn args(&mut self, parser: &mut ArgParser) {
        parser.bool_var(&self.force, "force", Some('f'), false, "overwrite");
        parser.add_fixed_positional(&self.from, "from", "source");
        parser.add_variadic_positional(&self.to, "to", "destinations", 1, Some(2));
    }

    fn execute(&mut self) -> CommandOutput {
        let output = CommandOutput::with_payload(Copied {
            from: self.from.get(),
            to: self.to.get(),
        });
        if self.force.get() {
            output.error(anyhow::anyhow!("refusing to force"))
        } else {
            output
        }
    }
}

fn tool() -> (ArgParser, StrSlot, ListSlot, BoolSlot) {
    let mut p = ArgParser::new("tool");
    let verbose = BoolSlot::new();
    let name = StrSlot::new();
    let opts = ListSlot::new();
    p.bool_var(&verbose, "verbose", Some('v'), false, "chatty");
    p.init_command_table(&name, Some(&opts));
    p.add_command("cp", "copy things", CopyFiles::default());
    (p, name, opts, verbose)
}

#[test]
fn dispatch_runs_selected_command() {
    let (mut p, name, opts, verbose) = tool();
    let outcome = p.parse(&args(&["-v", "cp", "-f", "a", "b"])).unwrap();
    assert_eq!(outcome, ParseOutcome::Parsed);
    assert!(verbose.get());
    assert_eq!(name.get(), "cp");
    assert_eq!(opts.get(), args(&["-f", "a", "b"]));

    let Dispatch::Completed(result) = p.dispatch().unwrap() else {
        panic!("Expected Completed");
    };
    assert_eq!(result.name(), "cp");
    assert_eq!(result.payload().unwrap().to_string(), "a -> b");
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        serde_json::json!({
            "error": ["refusing to force"],
            "result": {"from": "a", "to": ["b"]}
        })
    );
}

#[test]
fn dispatch_reports_command_argument_errors() {
    let (mut p, _, _, _) = tool();
    p.parse(&args(&["cp", "a", "b", "c", "d"])).unwrap();
    let err = p.dispatch().unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Parse(ParseError::TooMany { got: 3, max: 2, .. })
    ));
}

#[test]
fn dispatch_command_help() {
    let (mut p, _, _, _) = tool();
    p.parse(&args(&["cp", "--help"])).unwrap();
    let Dispatch::Help(help) = p.dispatch().unwrap() else {
        panic!("Expected Help");
    };
    assert_eq!(help.exit_code, 0);
    assert!(help.text.starts_with("usage: cp [option].. from to [to]\n"));
}

#[test]
fn dispatch_before_parse_fails() {
    let (mut p, _, _, _) = tool();
    assert!(matches!(p.dispatch(), Err(DispatchError::NotSelected)));
}

#[test]
fn unknown_command() {
    let (mut p, _, _, _) = tool();
    let err = p.parse(&args(&["mv", "a"])).unwrap_err();
    assert_eq!(err.to_string(), "invalid command: mv");
}

#[test]
fn missing_command() {
    let (mut p, _, _, _) = tool();
    let err = p.parse(&args(&["-v"])).unwrap_err();
    assert_eq!(err, ParseError::MissingCommand);
}

#[test]
fn no_arguments_shows_usage_on_error_stream() {
    let (mut p, _, _, _) = tool();
    let ParseOutcome::Help(help) = p.parse(&[]).unwrap() else {
        panic!("Expected Help");
    };
    assert_eq!(help.exit_code, 1);
    assert!(help.text.contains("commands:\n  cp   copy things\n"));
}

#[test]
fn duplicate_command_is_fatal() {
    let (mut p, _, _, _) = tool();
    let payload = catch_unwind(AssertUnwindSafe(|| {
        p.add_command("cp", "again", CopyFiles::default());
    }))
    .unwrap_err();
    let err = payload.downcast::<RegistrationError>().unwrap();
    assert_eq!(err.op, Operation::AddCommand);
    assert_eq!(err.violation, Violation::CommandDefined("cp".to_string()));
    assert_eq!(
        err.to_string(),
        "add_command(\"cp\"): cannot be defined as add_command(\"cp\") is already defined"
    );
}

#[test]
fn flag_value_errors() {
    let mut p = ArgParser::new("prog");
    p.int_var(&argguard::IntSlot::new(), "count", Some('c'), 0, "count");
    let err = p.parse(&args(&["--count", "many"])).unwrap_err();
    assert!(matches!(err, ParseError::Flag(_)));
}
