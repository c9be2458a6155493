//! JSON description of a program's command-line interface.
//!
//! The `argguard` binary turns a [`Config`] into an [`ArgParser`] so any
//! program can have its arguments validated without writing Rust.

use crate::command::{Command, CommandOutput};
use crate::parser::ArgParser;
use crate::slot::{BoolSlot, IntSlot, ListSlot, StrSlot};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during config parsing and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse JSON config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("argument with empty name")]
    EmptyName,

    #[error("duplicate argument name: {0}")]
    DuplicateName(String),

    #[error("'help' and '-h' are reserved")]
    ReservedName,

    #[error("invalid short option '{0}': must be a single ASCII letter or digit")]
    InvalidShortOption(String),

    #[error("duplicate short option: {0}")]
    DuplicateShort(char),

    #[error("invalid default {value:?} for {kind} flag '{name}'")]
    InvalidDefault {
        name: String,
        kind: &'static str,
        value: String,
    },

    #[error("'{field}' on flag '{name}' requires type string")]
    StringOnly { name: String, field: &'static str },

    #[error("'choices' on argument '{0}' is empty: must have at least one valid value")]
    EmptyChoices(String),

    #[error("invalid pattern on argument '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("exclusive group {0:?} needs at least two distinct flags")]
    InvalidGroup(Vec<String>),

    #[error("exclusive group refers to unknown flag: {0}")]
    UnknownGroupMember(String),

    #[error("variadic argument '{0}' has invalid bounds")]
    InvalidBounds(String),

    #[error("commands and positional arguments cannot be combined")]
    CommandsWithPositionals,

    #[error("duplicate command name: {0}")]
    DuplicateCommand(String),
}

/// Value type of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlagType {
    #[default]
    String,
    Bool,
    Int,
}

impl FlagType {
    fn as_str(self) -> &'static str {
        match self {
            FlagType::String => "string",
            FlagType::Bool => "bool",
            FlagType::Int => "int",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlagConfig {
    pub name: String,
    #[serde(default)]
    pub short: Option<char>,
    #[serde(default, rename = "type")]
    pub flag_type: FlagType,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub choices: Option<Vec<String>>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub non_empty: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionalConfig {
    pub name: String,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub choices: Option<Vec<String>>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub non_empty: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariadicConfig {
    pub name: String,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub min: usize,
    /// Absent means unbounded.
    #[serde(default)]
    pub max: Option<usize>,
}

/// Flags and positionals of one parser.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterfaceConfig {
    #[serde(default)]
    pub flags: Vec<FlagConfig>,
    #[serde(default)]
    pub exclusive: Vec<Vec<String>>,
    #[serde(default)]
    pub positionals: Vec<PositionalConfig>,
    #[serde(default)]
    pub variadic: Option<VariadicConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandConfig {
    pub name: String,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(flatten)]
    pub interface: InterfaceConfig,
}

fn default_true() -> bool {
    true
}

/// Top-level configuration for a program.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub interface: InterfaceConfig,
    #[serde(default)]
    pub commands: Vec<CommandConfig>,
    /// Whether tokens after the command name are passed to the command.
    #[serde(default = "default_true")]
    pub command_options: bool,
}

impl Config {
    /// Parse a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Read a config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Inline JSON, or `@path` to read it from a file.
    pub fn load(source: &str) -> Result<Config, ConfigError> {
        match source.strip_prefix('@') {
            Some(path) => Self::from_file(Path::new(path)),
            None => Self::from_json(source),
        }
    }

    /// Program name, falling back to `fallback`.
    pub fn effective_name<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(fallback)
    }

    /// Reject everything the parser would treat as a registration bug.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.interface.validate()?;

        if self.commands.is_empty() {
            return Ok(());
        }
        if !self.interface.positionals.is_empty() || self.interface.variadic.is_some() {
            return Err(ConfigError::CommandsWithPositionals);
        }
        let mut names = HashSet::new();
        for command in &self.commands {
            if command.name.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if !names.insert(command.name.as_str()) {
                return Err(ConfigError::DuplicateCommand(command.name.clone()));
            }
            command.interface.validate()?;
        }
        Ok(())
    }

    /// Build a parser for this config and the slots it binds.
    ///
    /// Call [`Config::validate`] first; an invalid config aborts here.
    pub fn build(&self, fallback_name: &str) -> (ArgParser, Bindings) {
        let mut parser = ArgParser::new(self.effective_name(fallback_name));
        let bindings = self.interface.register(&mut parser);

        // The selected name is reported with the command result, not here
        if !self.commands.is_empty() {
            let name = StrSlot::new();
            let options = ListSlot::new();
            parser.init_command_table(&name, self.command_options.then_some(&options));
            for command in &self.commands {
                parser.add_command(
                    &command.name,
                    command.help.as_deref().unwrap_or_default(),
                    DeclaredCommand::new(command.interface.clone()),
                );
            }
        }
        (parser, bindings)
    }
}

fn check_string_rules(
    name: &str,
    choices: &Option<Vec<String>>,
    pattern: &Option<String>,
) -> Result<(), ConfigError> {
    if choices.as_ref().is_some_and(|c| c.is_empty()) {
        return Err(ConfigError::EmptyChoices(name.to_string()));
    }
    if let Some(ref pattern) = pattern {
        Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

impl FlagConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.name == "help" || self.short == Some('h') {
            return Err(ConfigError::ReservedName);
        }
        if let Some(short) = self.short {
            if !short.is_ascii_alphanumeric() {
                return Err(ConfigError::InvalidShortOption(short.to_string()));
            }
        }
        if let Some(ref default) = self.default {
            let valid = match self.flag_type {
                FlagType::String => true,
                FlagType::Bool => default.parse::<bool>().is_ok(),
                FlagType::Int => default.parse::<i64>().is_ok(),
            };
            if !valid {
                return Err(ConfigError::InvalidDefault {
                    name: self.name.clone(),
                    kind: self.flag_type.as_str(),
                    value: default.clone(),
                });
            }
        }
        if self.flag_type != FlagType::String {
            let field = if self.choices.is_some() {
                Some("choices")
            } else if self.pattern.is_some() {
                Some("pattern")
            } else if self.non_empty {
                Some("non_empty")
            } else {
                None
            };
            if let Some(field) = field {
                return Err(ConfigError::StringOnly {
                    name: self.name.clone(),
                    field,
                });
            }
        }
        check_string_rules(&self.name, &self.choices, &self.pattern)
    }
}

impl InterfaceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        let mut shorts = HashSet::new();

        for flag in &self.flags {
            flag.validate()?;
            if !names.insert(flag.name.as_str()) {
                return Err(ConfigError::DuplicateName(flag.name.clone()));
            }
            if let Some(short) = flag.short {
                if !shorts.insert(short) {
                    return Err(ConfigError::DuplicateShort(short));
                }
            }
        }

        for group in &self.exclusive {
            let distinct: HashSet<&str> = group.iter().map(String::as_str).collect();
            if group.len() < 2 || distinct.len() != group.len() {
                return Err(ConfigError::InvalidGroup(group.clone()));
            }
            if let Some(unknown) = group.iter().find(|n| !self.flags.iter().any(|f| &f.name == *n)) {
                return Err(ConfigError::UnknownGroupMember(unknown.clone()));
            }
        }

        for pos in &self.positionals {
            if pos.name.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if pos.name == "help" {
                return Err(ConfigError::ReservedName);
            }
            if !names.insert(pos.name.as_str()) {
                return Err(ConfigError::DuplicateName(pos.name.clone()));
            }
            check_string_rules(&pos.name, &pos.choices, &pos.pattern)?;
        }

        if let Some(ref variadic) = self.variadic {
            if variadic.name.is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if variadic.name == "help" {
                return Err(ConfigError::ReservedName);
            }
            if !names.insert(variadic.name.as_str()) {
                return Err(ConfigError::DuplicateName(variadic.name.clone()));
            }
            if let Some(max) = variadic.max {
                if max == 0 || variadic.min > max {
                    return Err(ConfigError::InvalidBounds(variadic.name.clone()));
                }
            }
        }
        Ok(())
    }

    /// Register everything declared here on `parser`.
    fn register(&self, parser: &mut ArgParser) -> Bindings {
        let mut bindings = Bindings::default();

        for flag in &self.flags {
            let help = flag.help.as_deref().unwrap_or_default();
            let default = flag.default.as_deref();
            match flag.flag_type {
                FlagType::String => {
                    let slot = StrSlot::new();
                    parser.string_var(&slot, &flag.name, flag.short, default.unwrap_or_default(), help);
                    if let Some(ref choices) = flag.choices {
                        let choices: Vec<&str> = choices.iter().map(String::as_str).collect();
                        parser.restrict_to_options(&slot, &flag.name, &choices);
                    }
                    if let Some(ref pattern) = flag.pattern {
                        parser.restrict_to_pattern(&slot, &flag.name, pattern);
                    }
                    if flag.non_empty {
                        parser.forbid_empty(&flag.name);
                    }
                    bindings.push(&flag.name, Binding::Str(slot));
                }
                FlagType::Bool => {
                    let slot = BoolSlot::new();
                    let default = default.and_then(|d| d.parse().ok()).unwrap_or_default();
                    parser.bool_var(&slot, &flag.name, flag.short, default, help);
                    bindings.push(&flag.name, Binding::Bool(slot));
                }
                FlagType::Int => {
                    let slot = IntSlot::new();
                    let default = default.and_then(|d| d.parse().ok()).unwrap_or_default();
                    parser.int_var(&slot, &flag.name, flag.short, default, help);
                    bindings.push(&flag.name, Binding::Int(slot));
                }
            }
            if flag.required {
                parser.mark_required(&flag.name);
            }
        }

        for group in &self.exclusive {
            let names: Vec<&str> = group.iter().map(String::as_str).collect();
            parser.declare_mutually_exclusive(&names);
        }

        for pos in &self.positionals {
            let slot = StrSlot::new();
            parser.add_fixed_positional(&slot, &pos.name, pos.help.as_deref().unwrap_or_default());
            if let Some(ref choices) = pos.choices {
                let choices: Vec<&str> = choices.iter().map(String::as_str).collect();
                parser.restrict_to_options(&slot, &pos.name, &choices);
            }
            if let Some(ref pattern) = pos.pattern {
                parser.restrict_to_pattern(&slot, &pos.name, pattern);
            }
            if pos.non_empty {
                parser.forbid_empty(&pos.name);
            }
            bindings.push(&pos.name, Binding::Str(slot));
        }

        if let Some(ref variadic) = self.variadic {
            let slot = ListSlot::new();
            parser.add_variadic_positional(
                &slot,
                &variadic.name,
                variadic.help.as_deref().unwrap_or_default(),
                variadic.min,
                variadic.max,
            );
            bindings.push(&variadic.name, Binding::List(slot));
        }

        bindings
    }
}

/// A slot bound by a config-built parser.
#[derive(Debug, Clone)]
pub enum Binding {
    Str(StrSlot),
    Bool(BoolSlot),
    Int(IntSlot),
    List(ListSlot),
}

impl Binding {
    fn to_json(&self) -> serde_json::Value {
        match self {
            Binding::Str(slot) => slot.get().into(),
            Binding::Bool(slot) => slot.get().into(),
            Binding::Int(slot) => slot.get().into(),
            Binding::List(slot) => slot.get().into(),
        }
    }
}

/// Named slots in registration order.
#[derive(Debug, Clone, Default)]
pub struct Bindings(Vec<(String, Binding)>);

impl Bindings {
    fn push(&mut self, name: &str, binding: Binding) {
        self.0.push((name.to_string(), binding));
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, b)| b)
    }

    /// Current values keyed by argument name.
    pub fn values(&self) -> Values {
        Values(
            self.0
                .iter()
                .map(|(name, binding)| (name.clone(), binding.to_json()))
                .collect(),
        )
    }
}

/// Snapshot of bound values, printable as `name=value` lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Values(pub BTreeMap<String, serde_json::Value>);

impl fmt::Display for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.0 {
            match value {
                serde_json::Value::String(s) => writeln!(f, "{}={}", name, s)?,
                serde_json::Value::Array(items) => {
                    let items: Vec<String> = items
                        .iter()
                        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                        .collect();
                    writeln!(f, "{}={}", name, items.join(" "))?
                }
                other => writeln!(f, "{}={}", name, other)?,
            }
        }
        Ok(())
    }
}

/// Command declared in a config; its result is the values it was given.
pub struct DeclaredCommand {
    interface: InterfaceConfig,
    bindings: Bindings,
}

impl DeclaredCommand {
    pub fn new(interface: InterfaceConfig) -> Self {
        Self {
            interface,
            bindings: Bindings::default(),
        }
    }
}

impl Command for DeclaredCommand {
    fn args(&mut self, parser: &mut ArgParser) {
        self.bindings = self.interface.register(parser);
    }

    fn execute(&mut self) -> CommandOutput {
        CommandOutput::with_payload(self.bindings.values())
    }
}
