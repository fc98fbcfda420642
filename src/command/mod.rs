//! Command mirrors for the `nx` CLI.
//!
//! Each mirrored subcommand is a static [`CommandSpec`]: its path, positional
//! schema, flag schema (with the CLI's documented defaults and accepted
//! values), output format selector, and mutually exclusive flag pairs. One
//! generic routine, [`CommandSpec::build`], validates a call against the spec
//! and produces the argument vector, so no command duplicates the
//! validate-then-build pattern.
//!
//! Argument vector layout: path segments, positionals in declared order,
//! then flags in declared order. A flag is emitted only when its value
//! differs from the CLI default, so a bound invocation is textually the
//! minimal hand-typed command line.

use std::collections::BTreeMap;

use crate::error::{BindingError, Result, ValidationError};
use crate::transport::{ArgVector, Invoker, Output, OutputKind, Transport};

/// Generates a closed-set CLI option enum with `as_str`, `FromStr`
/// (rejecting unknown values with `InvalidChoice`) and an `ACCEPTED` list
/// usable in static command specs.
macro_rules! cli_choice {
    (
        $(#[$meta:meta])*
        $name:ident, $option:literal {
            $($(#[$vmeta:meta])* $variant:ident => $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every value the CLI accepts, in documented order.
            pub const ACCEPTED: &'static [&'static str] = &[$($value),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::ValidationError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    _ => Err(crate::command::invalid_choice($option, s, Self::ACCEPTED)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod batch;
pub mod monitor;

/// The format value that selects structured (JSON) output.
pub const STRUCTURED_FORMAT: &str = "json";

/// Whether a mirror is callable yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    Implemented,
    /// Known to the CLI grammar but not bound; calls fail with `NotImplemented`.
    Pending,
}

/// A required positional value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionalSpec {
    /// Parameter name, used in validation messages (e.g. `batch_id`).
    pub name: &'static str,
    /// Flag preceding the value, for commands that take their identifier as
    /// `--id <value>` rather than bare.
    pub flag: Option<&'static str>,
}

impl PositionalSpec {
    pub const fn bare(name: &'static str) -> Self {
        Self { name, flag: None }
    }

    pub const fn flagged(name: &'static str, flag: &'static str) -> Self {
        Self {
            name,
            flag: Some(flag),
        }
    }
}

/// Shape and default of one optional flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    /// Boolean flag, off by default (`--jobs-only`).
    Switch,
    /// Free-form value; `None` default means "absent".
    Text { default: Option<&'static str> },
    /// Value from a closed set.
    Choice {
        default: Option<&'static str>,
        accepted: &'static [&'static str],
    },
    /// Non-negative integer.
    Count { default: u64 },
}

/// One optional flag. `name` is the long flag without leading dashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagSpec {
    pub name: &'static str,
    pub kind: FlagKind,
}

impl FlagSpec {
    pub const fn switch(name: &'static str) -> Self {
        Self {
            name,
            kind: FlagKind::Switch,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: FlagKind::Text { default: None },
        }
    }

    pub const fn choice(
        name: &'static str,
        default: Option<&'static str>,
        accepted: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            kind: FlagKind::Choice { default, accepted },
        }
    }

    pub const fn count(name: &'static str, default: u64) -> Self {
        Self {
            name,
            kind: FlagKind::Count { default },
        }
    }
}

/// The `--format` selector of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    /// The CLI's own default when `--format` is omitted.
    pub default: &'static str,
    pub accepted: &'static [&'static str],
}

/// Declarative description of one mirrored subcommand.
#[derive(Debug)]
pub struct CommandSpec {
    pub path: &'static [&'static str],
    pub summary: &'static str,
    pub positionals: &'static [PositionalSpec],
    pub flags: &'static [FlagSpec],
    pub format: FormatSpec,
    /// Flag pairs that must not both be set.
    pub exclusive: &'static [(&'static str, &'static str)],
    pub support: Support,
}

/// A validated call, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
    pub args: ArgVector,
    pub output: OutputKind,
}

/// Value supplied for an optional flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    Switch(bool),
    Value(String),
}

/// Caller-supplied arguments for a mirrored command.
///
/// Flag names are normalized on insertion: leading dashes are stripped and
/// `_` becomes `-`, so `jobs_only`, `jobs-only` and `--jobs-only` are the
/// same flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandArgs {
    positionals: Vec<String>,
    flags: BTreeMap<String, FlagValue>,
    format: Option<String>,
}

impl CommandArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(mut self, value: impl Into<String>) -> Self {
        self.positionals.push(value.into());
        self
    }

    pub fn switch(mut self, name: &str, on: bool) -> Self {
        self.flags.insert(normalize_flag(name), FlagValue::Switch(on));
        self
    }

    pub fn value(mut self, name: &str, value: impl Into<String>) -> Self {
        self.flags
            .insert(normalize_flag(name), FlagValue::Value(value.into()));
        self
    }

    /// Set a flag only when `value` is present.
    pub fn value_opt(self, name: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.value(name, v),
            None => self,
        }
    }

    pub fn flag(mut self, name: &str, value: FlagValue) -> Self {
        self.flags.insert(normalize_flag(name), value);
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn positionals(&self) -> &[String] {
        &self.positionals
    }

    pub fn get_flag(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(&normalize_flag(name))
    }

    pub fn get_format(&self) -> Option<&str> {
        self.format.as_deref()
    }
}

fn normalize_flag(name: &str) -> String {
    name.trim_start_matches('-').replace('_', "-")
}

pub(crate) fn invalid_choice(option: &str, value: &str, accepted: &[&str]) -> ValidationError {
    ValidationError::InvalidChoice {
        option: option.to_string(),
        value: value.to_string(),
        accepted: accepted.iter().map(|s| s.to_string()).collect(),
    }
}

impl CommandSpec {
    /// Space-separated subcommand path, e.g. `batch inspect plan`.
    pub fn name(&self) -> String {
        self.path.join(" ")
    }

    /// Validate `call` against this command's grammar and build the argument vector.
    ///
    /// Nothing here launches a process: every error is raised locally.
    pub fn build(&self, call: &CommandArgs) -> Result<PreparedCall> {
        let command = self.name();

        if self.support == Support::Pending {
            return Err(BindingError::NotImplemented(command));
        }

        if call.positionals.len() != self.positionals.len() {
            return Err(ValidationError::Arity {
                command,
                expected: self.positionals.len(),
                got: call.positionals.len(),
            }
            .into());
        }
        for (spec, value) in self.positionals.iter().zip(&call.positionals) {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyIdentifier {
                    name: spec.name.to_string(),
                }
                .into());
            }
            reject_flag_like(spec.name, value)?;
        }

        if let Some(unknown) = call
            .flags
            .keys()
            .find(|key| !self.flags.iter().any(|f| f.name == key.as_str()))
        {
            return Err(ValidationError::UnknownFlag {
                command,
                flag: unknown.clone(),
            }
            .into());
        }

        // (flag name, optional value) in declaration order, defaults dropped
        let mut emitted: Vec<(&'static str, Option<String>)> = Vec::new();
        for flag in self.flags {
            let Some(value) = call.flags.get(flag.name) else {
                continue;
            };
            if let Some(arg) = resolve_flag(flag, value)? {
                emitted.push((flag.name, arg));
            }
        }

        for (first, second) in self.exclusive {
            let set = |name: &str| emitted.iter().any(|(n, _)| *n == name);
            if set(first) && set(second) {
                return Err(ValidationError::MutuallyExclusive {
                    first: format!("--{}", first),
                    second: format!("--{}", second),
                }
                .into());
            }
        }

        let format = call.format.as_deref().unwrap_or(self.format.default);
        if !self.format.accepted.contains(&format) {
            return Err(invalid_choice("format", format, self.format.accepted).into());
        }
        let output = if format == STRUCTURED_FORMAT {
            OutputKind::Structured
        } else {
            OutputKind::Raw
        };

        let mut args: Vec<String> = self.path.iter().map(|s| s.to_string()).collect();
        for (spec, value) in self.positionals.iter().zip(&call.positionals) {
            if let Some(flag) = spec.flag {
                args.push(flag.to_string());
            }
            args.push(value.clone());
        }
        for (name, value) in emitted {
            args.push(format!("--{}", name));
            args.extend(value);
        }
        // Structured output gets its flag from the transport.
        if output == OutputKind::Raw && format != self.format.default {
            args.push("--format".to_string());
            args.push(format.to_string());
        }

        Ok(PreparedCall {
            args: ArgVector::from(args),
            output,
        })
    }

    /// Build and run this command through `transport`.
    pub fn call<I: Invoker>(&self, transport: &Transport<I>, call: &CommandArgs) -> Result<Output> {
        let prepared = self.build(call)?;
        tracing::debug!(command = %self.name(), args = %prepared.args, "dispatching mirrored command");
        transport.invoke(prepared.args, prepared.output)
    }
}

/// Check one flag value against its spec. `Ok(None)` means "omit".
/// Free-form values go on the command line unquoted; one starting with `-`
/// would be read by nx-cli as another option.
fn reject_flag_like(name: &str, value: &str) -> Result<()> {
    if value.trim_start().starts_with('-') {
        return Err(ValidationError::FlagLikeValue {
            name: name.to_string(),
            value: value.to_string(),
        }
        .into());
    }
    Ok(())
}

fn resolve_flag(flag: &FlagSpec, value: &FlagValue) -> Result<Option<Option<String>>> {
    let shape = |expected: &str| ValidationError::FlagShape {
        flag: flag.name.to_string(),
        expected: expected.to_string(),
    };

    let resolved = match (flag.kind, value) {
        (FlagKind::Switch, FlagValue::Switch(true)) => Some(None),
        (FlagKind::Switch, FlagValue::Switch(false)) => None,
        (FlagKind::Switch, FlagValue::Value(_)) => return Err(shape("takes no value").into()),
        (_, FlagValue::Switch(_)) => return Err(shape("requires a value").into()),

        (FlagKind::Text { default }, FlagValue::Value(v)) => {
            if v.is_empty() || default == Some(v.as_str()) {
                None
            } else {
                reject_flag_like(flag.name, v)?;
                Some(Some(v.clone()))
            }
        }
        (FlagKind::Choice { default, accepted }, FlagValue::Value(v)) => {
            if !accepted.contains(&v.as_str()) {
                return Err(invalid_choice(flag.name, v, accepted).into());
            }
            if default == Some(v.as_str()) {
                None
            } else {
                Some(Some(v.clone()))
            }
        }
        (FlagKind::Count { default }, FlagValue::Value(v)) => {
            let n: u64 = v.trim().parse().map_err(|_| ValidationError::NotANumber {
                option: flag.name.to_string(),
                value: v.clone(),
            })?;
            if n == default {
                None
            } else {
                Some(Some(n.to_string()))
            }
        }
    };

    Ok(resolved)
}

/// Every command known to the binding, implemented or pending.
pub fn registry() -> &'static [&'static CommandSpec] {
    static REGISTRY: [&CommandSpec; 15] = [
        &monitor::STATUS,
        &monitor::JOBS,
        &monitor::JOB,
        &monitor::ENGINES,
        &monitor::VERSION,
        &batch::INSPECT_PLAN,
        &batch::INSPECT_JOBS,
        &batch::INSPECT_STATUS,
        &batch::INSPECT_JOB,
        &batch::INSPECT_POLICIES,
        &batch::INSPECT_ARTIFACTS,
        &batch::INSPECT_ARTIFACT,
        &batch::STATUS,
        &batch::SESSION,
        &batch::JOBS,
    ];
    &REGISTRY
}

/// Look up a command by path: `"batch inspect plan"` or `"batch.inspect.plan"`.
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    let wanted: Vec<&str> = name
        .split(|c: char| c.is_whitespace() || c == '.')
        .filter(|s| !s.is_empty())
        .collect();
    registry()
        .iter()
        .copied()
        .find(|spec| spec.path == wanted.as_slice())
}
