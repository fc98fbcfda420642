//! TOML manifests of golden cases.
//!
//! ```toml
//! [[case]]
//! name = "plan of nightly batch"
//! direct = ["batch", "inspect", "plan", "nightly", "--jobs-only", "--format", "json"]
//! command = "batch inspect plan"
//! positionals = ["nightly"]
//! format = "json"
//!
//! [case.flags]
//! jobs_only = true
//!
//! [[case.fixture]]
//! path = "batches/nightly/plan.json"
//! contents = "{}"
//! ```
//!
//! Each entry drives the dynamic call surface, so every registered command
//! can be checked without writing Rust.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::command::{self, CommandArgs};
use crate::error::{BindingError, Result};
use crate::golden::GoldenCase;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoldenManifest {
    #[serde(default, rename = "case")]
    pub cases: Vec<ManifestCase>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestCase {
    pub name: String,
    /// Argument vector for the direct run.
    pub direct: Vec<String>,
    /// Registered command path, e.g. `"monitor status"`.
    pub command: String,
    #[serde(default)]
    pub positionals: Vec<String>,
    pub format: Option<String>,
    /// Flag values: booleans are switches, strings and integers are values.
    #[serde(default)]
    pub flags: BTreeMap<String, toml::Value>,
    #[serde(default, rename = "fixture")]
    pub fixtures: Vec<ManifestFixture>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestFixture {
    pub path: PathBuf,
    #[serde(default)]
    pub contents: String,
}

impl GoldenManifest {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let manifest: GoldenManifest = toml::from_str(text)
            .map_err(|e| BindingError::InvalidConfig(format!("golden manifest: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BindingError::Io(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Reject manifests whose cases could never run.
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for case in &self.cases {
            if case.name.trim().is_empty() {
                return Err(BindingError::InvalidConfig(
                    "golden case name must not be empty".to_string(),
                ));
            }
            if !seen.insert(case.name.as_str()) {
                return Err(case.invalid("duplicate case name"));
            }
            if case.direct.is_empty() {
                return Err(case.invalid("'direct' must not be empty"));
            }
            if command::find(&case.command).is_none() {
                return Err(case.invalid(&format!("unknown command '{}'", case.command)));
            }
            case.command_args()?;
        }
        Ok(())
    }

    pub fn into_cases(self) -> Result<Vec<GoldenCase>> {
        self.cases.into_iter().map(ManifestCase::into_case).collect()
    }
}

impl ManifestCase {
    /// The arguments the bound side of this case is called with.
    pub fn command_args(&self) -> Result<CommandArgs> {
        let mut args = CommandArgs::new();
        for value in &self.positionals {
            args = args.positional(value.as_str());
        }
        for (name, value) in &self.flags {
            args = match value {
                toml::Value::Boolean(on) => args.switch(name, *on),
                toml::Value::String(s) => args.value(name, s.as_str()),
                toml::Value::Integer(n) => args.value(name, n.to_string()),
                _ => {
                    return Err(self.invalid(&format!(
                        "flag '{}' must be a boolean, string or integer",
                        name
                    )));
                }
            };
        }
        if let Some(format) = &self.format {
            args = args.format(format.as_str());
        }
        Ok(args)
    }

    pub fn into_case(self) -> Result<GoldenCase> {
        let args = self.command_args()?;
        let command = self.command;
        let mut case = GoldenCase::new(self.name, self.direct, move |client| {
            client.call(&command, &args)
        });
        for fixture in self.fixtures {
            case = case.with_fixture(fixture.path, fixture.contents);
        }
        Ok(case)
    }

    fn invalid(&self, reason: &str) -> BindingError {
        BindingError::InvalidConfig(format!("golden case '{}': {}", self.name, reason))
    }
}
