//! Validation stages run after flag tokenizing.
//!
//! The stages run in the order of [`STAGES`]; the first failure or help
//! request ends the run, so the order is the precedence between errors.

use crate::flags::FlagSet;
use crate::help::{render_usage, HelpRequest};
use crate::parser::{ParseError, ParseOutcome};
use crate::table::{RegistrationTable, Selection};
use tracing::debug;

/// Everything a stage may look at, plus the leftover positional tokens.
pub(crate) struct ParseState<'a> {
    pub program: &'a str,
    pub flags: &'a FlagSet,
    pub table: &'a mut RegistrationTable,
    /// Number of raw tokens handed to the parser.
    pub supplied: usize,
    pub help_requested: bool,
    pub leftover: Vec<String>,
}

impl ParseState<'_> {
    fn changed(&self, name: &str) -> bool {
        self.flags.lookup(name).is_some_and(|f| f.changed)
    }
}

/// Whether the run goes on after a stage.
pub(crate) enum Flow {
    Continue,
    Help(HelpRequest),
}

pub(crate) struct Stage {
    pub name: &'static str,
    pub run: fn(&mut ParseState<'_>) -> Result<Flow, ParseError>,
}

pub(crate) const STAGES: [Stage; 7] = [
    Stage {
        name: "help",
        run: intercept_help,
    },
    Stage {
        name: "command",
        run: resolve_command,
    },
    Stage {
        name: "positionals",
        run: match_positionals,
    },
    Stage {
        name: "required",
        run: check_required,
    },
    Stage {
        name: "exclusive",
        run: check_exclusive,
    },
    Stage {
        name: "non_empty",
        run: check_non_empty,
    },
    Stage {
        name: "constraints",
        run: check_constraints,
    },
];

/// Run every stage in order, stopping at the first that does not continue.
pub(crate) fn run(state: &mut ParseState<'_>) -> Result<ParseOutcome, ParseError> {
    for stage in &STAGES {
        match (stage.run)(state) {
            Ok(Flow::Continue) => debug!(stage = stage.name, "stage passed"),
            Ok(Flow::Help(help)) => {
                debug!(stage = stage.name, exit_code = help.exit_code, "showing usage");
                return Ok(ParseOutcome::Help(help));
            }
            Err(e) => {
                debug!(stage = stage.name, error = %e, "stage failed");
                return Err(e);
            }
        }
    }
    Ok(ParseOutcome::Parsed)
}

fn intercept_help(state: &mut ParseState<'_>) -> Result<Flow, ParseError> {
    if state.supplied == 0 && state.table.has_obligations() {
        let text = render_usage(state.program, &*state.table, state.flags);
        return Ok(Flow::Help(HelpRequest::implicit(text)));
    }
    if state.help_requested {
        let text = render_usage(state.program, &*state.table, state.flags);
        return Ok(Flow::Help(HelpRequest::requested(text)));
    }
    Ok(Flow::Continue)
}

fn resolve_command(state: &mut ParseState<'_>) -> Result<Flow, ParseError> {
    let Some(commands) = state.table.commands.as_mut() else {
        return Ok(Flow::Continue);
    };

    let mut rest = std::mem::take(&mut state.leftover).into_iter();
    let name = rest.next().ok_or(ParseError::MissingCommand)?;
    let index = commands
        .entries
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| ParseError::InvalidCommand(name.clone()))?;

    commands.name_target.set(name.clone());
    let options: Vec<String> = rest.collect();
    commands.selected = Some(Selection {
        index,
        options: options.clone(),
    });

    if options.is_empty() {
        return Ok(Flow::Continue);
    }
    match commands.options_target {
        Some(ref target) => {
            target.set(options);
            Ok(Flow::Continue)
        }
        None => Err(ParseError::OptionsNotAllowed(name)),
    }
}

fn match_positionals(state: &mut ParseState<'_>) -> Result<Flow, ParseError> {
    let table = &*state.table;
    if table.commands.is_some() {
        // The command's own parser handles what is left
        return Ok(Flow::Continue);
    }

    let mut rest = state.leftover.as_slice();
    if !rest.is_empty() && !table.has_positionals() {
        return Err(ParseError::NoPositionalsExpected);
    }

    if rest.len() < table.fixed.len() {
        return Err(ParseError::InsufficientPositionals);
    }
    for (pos, value) in table.fixed.iter().zip(rest) {
        pos.target.set(value.clone());
    }
    rest = &rest[table.fixed.len()..];

    if let Some(ref variadic) = table.variadic {
        let got = rest.len();
        let name = variadic.name.clone();
        if got < variadic.min {
            return Err(match (got, variadic.max) {
                (0, None) => ParseError::NoneProvided { name },
                (0, Some(_)) => ParseError::NoneProvidedExpected {
                    name,
                    min: variadic.min,
                },
                _ => ParseError::TooFew {
                    name,
                    got,
                    min: variadic.min,
                },
            });
        }
        if let Some(max) = variadic.max {
            if got > max {
                return Err(ParseError::TooMany { name, got, max });
            }
        }
        variadic.target.set(rest.to_vec());
        rest = &[];
    }

    if !rest.is_empty() {
        return Err(ParseError::UnexpectedPositionals);
    }
    Ok(Flow::Continue)
}

fn check_required(state: &mut ParseState<'_>) -> Result<Flow, ParseError> {
    let missing: Vec<String> = state
        .table
        .required
        .iter()
        .filter(|name| !state.changed(name))
        .cloned()
        .collect();

    match missing.len() {
        0 => Ok(Flow::Continue),
        1 => Err(ParseError::MissingRequired(missing[0].clone())),
        _ => Err(ParseError::MissingRequiredMany(missing)),
    }
}

fn check_exclusive(state: &mut ParseState<'_>) -> Result<Flow, ParseError> {
    for group in &state.table.exclusive {
        let mut first: Option<&String> = None;
        for name in group.iter().filter(|name| state.changed(name)) {
            match first {
                Some(first) => {
                    return Err(ParseError::MutuallyExclusive(first.clone(), name.clone()));
                }
                None => first = Some(name),
            }
        }
    }
    Ok(Flow::Continue)
}

fn check_non_empty(state: &mut ParseState<'_>) -> Result<Flow, ParseError> {
    let table = &*state.table;
    let empty: Vec<String> = table
        .non_empty
        .iter()
        .filter(|name| match table.fixed_named(name) {
            Some(pos) => pos.target.read(|v| v.is_empty()),
            None => state
                .flags
                .lookup(name)
                .is_some_and(|f| f.value.as_text().is_empty()),
        })
        .cloned()
        .collect();

    match empty.len() {
        0 => Ok(Flow::Continue),
        1 => Err(ParseError::Empty(empty[0].clone())),
        _ => Err(ParseError::EmptyMany(empty)),
    }
}

fn check_constraints(state: &mut ParseState<'_>) -> Result<Flow, ParseError> {
    for constraint in &state.table.options {
        constraint.check()?;
    }
    for constraint in &state.table.patterns {
        constraint.check()?;
    }
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ArgParser;
    use crate::slot::{ListSlot, StrSlot};

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_stage_order() {
        let names: Vec<&str> = STAGES.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "help",
                "command",
                "positionals",
                "required",
                "exclusive",
                "non_empty",
                "constraints"
            ]
        );
    }

    #[test]
    fn test_positionals_reported_before_required() {
        let mut p = ArgParser::new("testprog");
        p.string_var(&StrSlot::new(), "name", Some('n'), "", "name");
        p.mark_required("name");
        p.add_fixed_positional(&StrSlot::new(), "file", "file");
        let err = p.parse(&args(&["-n", ""])).unwrap_err();
        assert_eq!(err, ParseError::InsufficientPositionals);
    }

    #[test]
    fn test_required_reported_before_exclusive() {
        let mut p = ArgParser::new("testprog");
        let a = StrSlot::new();
        let b = StrSlot::new();
        p.string_var(&a, "a", Some('a'), "", "a");
        p.string_var(&b, "b", Some('b'), "", "b");
        p.string_var(&StrSlot::new(), "c", Some('c'), "", "c");
        p.mark_required("c");
        p.declare_mutually_exclusive(&["a", "b"]);
        let err = p.parse(&args(&["-a", "x", "-b", "y"])).unwrap_err();
        assert_eq!(err, ParseError::MissingRequired("c".to_string()));
    }

    #[test]
    fn test_exclusive_reported_before_empty_and_constraints() {
        let mut p = ArgParser::new("testprog");
        let a = StrSlot::new();
        let b = StrSlot::new();
        p.string_var(&a, "a", Some('a'), "", "a");
        p.string_var(&b, "b", Some('b'), "", "b");
        p.forbid_empty("a");
        p.restrict_to_options(&b, "b", &["ok"]);
        p.declare_mutually_exclusive(&["a", "b"]);
        let err = p.parse(&args(&["-a", "", "-b", "bad"])).unwrap_err();
        assert_eq!(err, ParseError::MutuallyExclusive("a".into(), "b".into()));
    }

    #[test]
    fn test_empty_reported_before_constraints() {
        let mut p = ArgParser::new("testprog");
        let a = StrSlot::new();
        p.string_var(&a, "a", Some('a'), "x", "a");
        p.forbid_empty("a");
        p.restrict_to_options(&a, "a", &["x"]);
        let err = p.parse(&args(&["-a", ""])).unwrap_err();
        assert_eq!(err, ParseError::Empty("a".to_string()));
    }

    #[test]
    fn test_variadic_keeps_leftover_order() {
        let mut p = ArgParser::new("testprog");
        let files = ListSlot::new();
        p.bool_var(&crate::slot::BoolSlot::new(), "all", Some('a'), false, "all");
        p.add_variadic_positional(&files, "files", "files", 1, None);
        p.parse(&args(&["one", "-a", "two", "--", "-three"])).unwrap();
        assert_eq!(files.get(), args(&["one", "two", "-three"]));
    }
}
