//! Usage text generation.

use crate::flags::FlagSet;
use crate::table::{RegistrationTable, VariadicPositional};

/// Usage text the parser wants shown instead of continuing.
///
/// An explicit `-h/--help` yields exit code 0 and standard output; running
/// with no arguments while something is required yields exit code 1 and the
/// error stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpRequest {
    pub text: String,
    pub exit_code: i32,
}

impl HelpRequest {
    pub fn requested(text: String) -> Self {
        Self { text, exit_code: 0 }
    }

    pub fn implicit(text: String) -> Self {
        Self { text, exit_code: 1 }
    }

    pub fn print(&self) {
        if self.exit_code == 0 {
            print!("{}", self.text);
        } else {
            eprint!("{}", self.text);
        }
    }

    /// Print the text and terminate the process.
    pub fn exit(self) -> ! {
        self.print();
        std::process::exit(self.exit_code)
    }
}

/// Render the arity of a variadic positional for the usage line.
fn variadic_arity(variadic: &VariadicPositional) -> String {
    let name = &variadic.name;
    let mut out = String::new();

    if variadic.min == 0 && variadic.max.is_none() {
        out.push_str(&format!(" [{}]", name));
    }
    for _ in 0..variadic.min {
        out.push(' ');
        out.push_str(name);
    }
    match variadic.max {
        None => out.push_str(".."),
        Some(max) => {
            let optional = max.saturating_sub(variadic.min);
            for _ in 0..optional {
                out.push_str(&format!(" [{}", name));
            }
            out.push_str(&"]".repeat(optional));
        }
    }
    out
}

/// Two-column listing with the first column padded to its widest entry.
fn columns<'a>(rows: impl Iterator<Item = (&'a str, &'a str)> + Clone) -> String {
    let width = rows.clone().map(|(name, _)| name.len()).max().unwrap_or(0);
    rows.map(|(name, text)| format!("  {:<width$}   {}\n", name, text, width = width))
        .collect()
}

/// Generate the usage text for a parser.
pub(crate) fn render_usage(program: &str, table: &RegistrationTable, flags: &FlagSet) -> String {
    let mut out = String::new();

    let commands = table.commands.as_ref().filter(|c| !c.entries.is_empty());

    if let Some(commands) = commands {
        if commands.options_target.is_some() {
            out.push_str(&format!(
                "usage: {} [option].. <command> [command option]..\n\n",
                program
            ));
        } else {
            out.push_str(&format!("usage: {} [option].. <command>\n\n", program));
        }
        out.push_str("commands:\n");
        out.push_str(&columns(
            commands
                .entries
                .iter()
                .map(|c| (c.name.as_str(), c.description.as_str())),
        ));
        out.push('\n');
    } else {
        let mut positionals = String::new();
        for pos in &table.fixed {
            positionals.push(' ');
            positionals.push_str(&pos.name);
        }
        if let Some(ref variadic) = table.variadic {
            positionals.push_str(&variadic_arity(variadic));
        }
        out.push_str(&format!("usage: {} [option]..{}\n\n", program, positionals));
    }

    if table.has_positionals() {
        out.push_str("arguments:\n");
        out.push_str(&columns(
            table
                .fixed
                .iter()
                .map(|p| (p.name.as_str(), p.usage.as_str()))
                .chain(
                    table
                        .variadic
                        .iter()
                        .map(|v| (v.name.as_str(), v.usage.as_str())),
                ),
        ));
        out.push('\n');
    }

    out.push_str("options:\n");
    out.push_str(&flags.usages());
    out
}
