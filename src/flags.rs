//! Primitive flag tokenizer.
//!
//! Splits raw tokens into flag assignments and leftover positional tokens.
//! It knows nothing about required flags, positionals or commands; those rules
//! are layered on top by [`crate::parser::ArgParser`].

use crate::quote::quote;
use crate::slot::{BoolSlot, IntSlot, StrSlot};
use thiserror::Error;

/// Errors raised while tokenizing flags.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagError {
    #[error("unknown flag: --{0}")]
    UnknownFlag(String),

    #[error("unknown shorthand flag: '{0}' in {1}")]
    UnknownShorthand(char, String),

    #[error("flag needs an argument: --{0}")]
    MissingValue(String),

    #[error("flag needs an argument: '{0}' in {1}")]
    MissingShorthandValue(char, String),

    #[error("invalid argument {} for {} flag: {reason}", quote(.value), quote(.flag))]
    InvalidValue {
        value: String,
        flag: String,
        reason: String,
    },
}

/// Storage and type of a flag's value.
#[derive(Debug, Clone)]
pub enum FlagValue {
    Str(StrSlot),
    Bool(BoolSlot),
    Int(IntSlot),
}

impl FlagValue {
    /// Type name as shown in the option listing.
    pub fn type_name(&self) -> &'static str {
        match self {
            FlagValue::Str(_) => "string",
            FlagValue::Bool(_) => "bool",
            FlagValue::Int(_) => "int",
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, FlagValue::Str(_))
    }

    /// Current value rendered as text.
    pub fn as_text(&self) -> String {
        match self {
            FlagValue::Str(slot) => slot.get(),
            FlagValue::Bool(slot) => slot.get().to_string(),
            FlagValue::Int(slot) => slot.get().to_string(),
        }
    }

    fn assign(&self, raw: &str) -> Result<(), String> {
        match self {
            FlagValue::Str(slot) => slot.set(raw.to_string()),
            FlagValue::Bool(slot) => {
                let value = match raw {
                    "true" | "1" | "t" | "T" | "TRUE" | "True" => true,
                    "false" | "0" | "f" | "F" | "FALSE" | "False" => false,
                    _ => return Err("invalid syntax".to_string()),
                };
                slot.set(value);
            }
            FlagValue::Int(slot) => {
                let value = raw.parse::<i64>().map_err(|e| e.to_string())?;
                slot.set(value);
            }
        }
        Ok(())
    }
}

/// A named, typed program option.
#[derive(Debug, Clone)]
pub struct Flag {
    pub name: String,
    pub short: Option<char>,
    pub usage: String,
    /// Default value rendered as text.
    pub default: String,
    /// Set when the user supplied the flag explicitly.
    pub changed: bool,
    pub value: FlagValue,
}

impl Flag {
    pub fn new(name: &str, short: Option<char>, usage: &str, value: FlagValue) -> Self {
        Self {
            name: name.to_string(),
            short,
            usage: usage.to_string(),
            default: value.as_text(),
            changed: false,
            value,
        }
    }

    fn has_zero_default(&self) -> bool {
        match self.value {
            FlagValue::Str(_) => self.default.is_empty(),
            FlagValue::Bool(_) => self.default == "false",
            FlagValue::Int(_) => self.default == "0",
        }
    }

    /// `-s, --name` or `--name`, as used in value errors.
    fn display_name(&self) -> String {
        match self.short {
            Some(short) => format!("-{}, --{}", short, self.name),
            None => format!("--{}", self.name),
        }
    }

    fn set(&mut self, raw: &str) -> Result<(), FlagError> {
        self.value
            .assign(raw)
            .map_err(|reason| FlagError::InvalidValue {
                value: raw.to_string(),
                flag: self.display_name(),
                reason,
            })?;
        self.changed = true;
        Ok(())
    }
}

/// Registered flags plus the outcome of tokenizing.
#[derive(Debug, Clone)]
pub struct FlagSet {
    flags: Vec<Flag>,
    interspersed: bool,
    parsed: bool,
    args: Vec<String>,
}

impl Default for FlagSet {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagSet {
    pub fn new() -> Self {
        Self {
            flags: Vec::new(),
            interspersed: true,
            parsed: false,
            args: Vec::new(),
        }
    }

    /// When disabled, flag parsing stops at the first positional token and
    /// everything from there on is left over untouched.
    pub fn set_interspersed(&mut self, interspersed: bool) {
        self.interspersed = interspersed;
    }

    /// Register a flag. Name and shorthand uniqueness is the caller's job.
    pub(crate) fn add(&mut self, flag: Flag) {
        self.flags.push(flag);
    }

    pub fn lookup(&self, name: &str) -> Option<&Flag> {
        self.flags.iter().find(|f| f.name == name)
    }

    pub fn lookup_short(&self, short: char) -> Option<&Flag> {
        self.flags.iter().find(|f| f.short == Some(short))
    }

    pub fn parsed(&self) -> bool {
        self.parsed
    }

    /// Leftover positional tokens from the last parse.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Tokenize `tokens`, assigning flag values and collecting positionals.
    pub fn parse(&mut self, tokens: &[String]) -> Result<(), FlagError> {
        self.parsed = true;

        let mut leftover = Vec::new();
        let mut iter = tokens.iter();

        while let Some(token) = iter.next() {
            if token == "--" {
                // Everything after is positional
                leftover.extend(iter.by_ref().cloned());
                break;
            }

            if let Some(body) = token.strip_prefix("--") {
                self.parse_long(body, &mut iter)?;
            } else if token.starts_with('-') && token.len() > 1 {
                self.parse_shorts(token, &mut iter)?;
            } else {
                leftover.push(token.clone());
                if !self.interspersed {
                    leftover.extend(iter.by_ref().cloned());
                    break;
                }
            }
        }

        self.args = leftover;
        Ok(())
    }

    fn parse_long(
        &mut self,
        body: &str,
        iter: &mut std::slice::Iter<String>,
    ) -> Result<(), FlagError> {
        // Check for --name=value format
        let (name, inline_value) = match body.split_once('=') {
            Some((n, v)) => (n, Some(v)),
            None => (body, None),
        };

        let flag = self
            .flags
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| FlagError::UnknownFlag(name.to_string()))?;

        let value = match (inline_value, &flag.value) {
            (Some(v), _) => v.to_string(),
            (None, FlagValue::Bool(_)) => "true".to_string(),
            (None, _) => iter
                .next()
                .ok_or_else(|| FlagError::MissingValue(name.to_string()))?
                .clone(),
        };

        flag.set(&value)
    }

    fn parse_shorts(
        &mut self,
        token: &str,
        iter: &mut std::slice::Iter<String>,
    ) -> Result<(), FlagError> {
        let chars: Vec<char> = token[1..].chars().collect(); // Strip "-"

        for (i, c) in chars.iter().enumerate() {
            let flag = self
                .flags
                .iter_mut()
                .find(|f| f.short == Some(*c))
                .ok_or_else(|| FlagError::UnknownShorthand(*c, token.to_string()))?;

            if let FlagValue::Bool(_) = flag.value {
                flag.set("true")?;
                continue;
            }

            // The value is either the rest of this token (-ofile, -o=file)
            // or the next token (-o file)
            let remaining: String = chars[i + 1..].iter().collect();
            let remaining = remaining
                .strip_prefix('=')
                .map(str::to_string)
                .unwrap_or(remaining);
            let value = if !remaining.is_empty() {
                remaining
            } else {
                iter.next()
                    .ok_or_else(|| FlagError::MissingShorthandValue(*c, token.to_string()))?
                    .clone()
            };
            return flag.set(&value);
        }

        Ok(())
    }

    /// Option listing, one aligned line per flag in registration order.
    pub fn usages(&self) -> String {
        let lines: Vec<(String, String)> = self
            .flags
            .iter()
            .map(|flag| {
                let mut head = match flag.short {
                    Some(short) => format!("  -{}, --{}", short, flag.name),
                    None => format!("      --{}", flag.name),
                };
                if !matches!(flag.value, FlagValue::Bool(_)) {
                    head.push(' ');
                    head.push_str(flag.value.type_name());
                }

                let mut usage = flag.usage.clone();
                if !flag.has_zero_default() {
                    match flag.value {
                        FlagValue::Str(_) => usage.push_str(&format!(" (default {})", quote(&flag.default))),
                        _ => usage.push_str(&format!(" (default {})", flag.default)),
                    }
                }
                (head, usage)
            })
            .collect();

        let width = lines.iter().map(|(head, _)| head.len()).max().unwrap_or(0);
        lines
            .iter()
            .map(|(head, usage)| format!("{:<width$}   {}\n", head, usage, width = width))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    struct Fixture {
        set: FlagSet,
        output: StrSlot,
        verbose: BoolSlot,
        count: IntSlot,
    }

    fn fixture() -> Fixture {
        let output = StrSlot::with("out.txt".to_string());
        let verbose = BoolSlot::new();
        let count = IntSlot::new();
        let mut set = FlagSet::new();
        set.add(Flag::new("output", Some('o'), "output file", FlagValue::Str(output.clone())));
        set.add(Flag::new("verbose", Some('v'), "verbose", FlagValue::Bool(verbose.clone())));
        set.add(Flag::new("count", Some('c'), "count", FlagValue::Int(count.clone())));
        Fixture {
            set,
            output,
            verbose,
            count,
        }
    }

    #[test]
    fn test_long_option_space_and_equals() {
        let mut f = fixture();
        f.set.parse(&args(&["--output", "a.txt", "--count=3"])).unwrap();
        assert_eq!(f.output.get(), "a.txt");
        assert_eq!(f.count.get(), 3);
        assert!(f.set.lookup("output").unwrap().changed);
        assert!(!f.set.lookup("verbose").unwrap().changed);
    }

    #[test]
    fn test_bool_long_and_explicit_false() {
        let mut f = fixture();
        f.set.parse(&args(&["--verbose"])).unwrap();
        assert!(f.verbose.get());

        let mut f = fixture();
        f.set.parse(&args(&["--verbose=false"])).unwrap();
        assert!(!f.verbose.get());
        assert!(f.set.lookup("verbose").unwrap().changed);
    }

    #[test]
    fn test_short_cluster_with_attached_value() {
        let mut f = fixture();
        f.set.parse(&args(&["-vofile.txt"])).unwrap();
        assert!(f.verbose.get());
        assert_eq!(f.output.get(), "file.txt");
    }

    #[test]
    fn test_short_value_from_next_token() {
        let mut f = fixture();
        f.set.parse(&args(&["-c", "7"])).unwrap();
        assert_eq!(f.count.get(), 7);
    }

    #[test]
    fn test_default_kept_when_not_supplied() {
        let mut f = fixture();
        f.set.parse(&args(&[])).unwrap();
        assert_eq!(f.output.get(), "out.txt");
        assert!(!f.set.lookup("output").unwrap().changed);
    }

    #[test]
    fn test_interspersed_positionals() {
        let mut f = fixture();
        f.set.parse(&args(&["a", "-v", "b", "-", "--", "-c"])).unwrap();
        assert_eq!(f.set.args(), &args(&["a", "b", "-", "-c"])[..]);
        assert!(f.verbose.get());
        assert_eq!(f.count.get(), 0);
    }

    #[test]
    fn test_non_interspersed_stops_at_first_positional() {
        let mut f = fixture();
        f.set.set_interspersed(false);
        f.set.parse(&args(&["-v", "cmd", "-c", "2"])).unwrap();
        assert_eq!(f.set.args(), &args(&["cmd", "-c", "2"])[..]);
        assert_eq!(f.count.get(), 0);
    }

    #[test]
    fn test_unknown_flags() {
        let mut f = fixture();
        let err = f.set.parse(&args(&["--nope"])).unwrap_err();
        assert_eq!(err.to_string(), "unknown flag: --nope");

        let mut f = fixture();
        let err = f.set.parse(&args(&["-b", "test"])).unwrap_err();
        assert_eq!(err.to_string(), "unknown shorthand flag: 'b' in -b");
    }

    #[test]
    fn test_missing_values() {
        let mut f = fixture();
        let err = f.set.parse(&args(&["--output"])).unwrap_err();
        assert_eq!(err.to_string(), "flag needs an argument: --output");

        let mut f = fixture();
        let err = f.set.parse(&args(&["-o"])).unwrap_err();
        assert_eq!(err.to_string(), "flag needs an argument: 'o' in -o");
    }

    #[test]
    fn test_invalid_int() {
        let mut f = fixture();
        let err = f.set.parse(&args(&["--count", "many"])).unwrap_err();
        assert!(matches!(err, FlagError::InvalidValue { ref flag, .. } if flag == "-c, --count"));
        assert!(err
            .to_string()
            .starts_with("invalid argument \"many\" for \"-c, --count\" flag:"));
    }

    #[test]
    fn test_usages_alignment_and_defaults() {
        let f = fixture();
        let expected = concat!(
            "  -o, --output string   output file (default \"out.txt\")\n",
            "  -v, --verbose         verbose\n",
            "  -c, --count int       count\n",
        );
        assert_eq!(f.set.usages(), expected);
    }

    #[test]
    fn test_usages_without_shorthand() {
        let mut set = FlagSet::new();
        set.add(Flag::new("level", None, "level", FlagValue::Int(IntSlot::with(2))));
        assert_eq!(set.usages(), "      --level int   level (default 2)\n");
    }
}
