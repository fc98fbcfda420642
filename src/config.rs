//! Binding configuration: deserialization and validation.

use crate::error::{BindingError, Result};
use crate::resolver::Resolver;
use crate::transport::{DEFAULT_PROGRAM, DEFAULT_STRUCTURED_FLAG, SubprocessInvoker, Transport};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One `[transport.env]` value.
///
/// `${NAME}` reads `NAME` from the binding's own environment when the
/// invoker is built; anything not starting with `$` is passed as written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum EnvValue {
    Ref(String),
    Literal(String),
}

impl EnvValue {
    /// The value the child sees. `None` for a reference to an unset variable,
    /// which leaves the variable unset in the child too.
    pub fn resolve(&self) -> Option<String> {
        match self {
            EnvValue::Ref(name) => std::env::var(name).ok(),
            EnvValue::Literal(value) => Some(value.clone()),
        }
    }
}

impl TryFrom<String> for EnvValue {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        if let Some(name) = value.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
            let valid = !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(format!("'{}' is not a valid variable reference", value));
            }
            return Ok(EnvValue::Ref(name.to_string()));
        }
        if value.starts_with('$') {
            return Err(format!(
                "'{}' looks like a variable; write it as ${{VAR}}",
                value
            ));
        }
        Ok(EnvValue::Literal(value))
    }
}

/// Top-level binding configuration, parsed from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
    #[serde(default)]
    pub executable: ExecutableConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Which program the binding launches.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutableConfig {
    /// Bare program name or path. Defaults to `nx`.
    pub program: Option<PathBuf>,
    /// Locate `nx-cli` with the deterministic resolver instead.
    #[serde(default)]
    pub resolve: bool,
    /// Resolver root; the crate's anchor when unset. A relative root in a
    /// loaded file is taken relative to that file's directory.
    pub project_root: Option<PathBuf>,
}

/// How each invocation is run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Flag appended to structured invocations.
    #[serde(default = "default_structured_flag")]
    pub structured_flag: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Extra child environment, resolved when the invoker is built.
    #[serde(default)]
    pub env: HashMap<String, EnvValue>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            structured_flag: default_structured_flag(),
            cwd: None,
            env: HashMap::new(),
        }
    }
}

fn default_structured_flag() -> Vec<String> {
    DEFAULT_STRUCTURED_FLAG.iter().map(|s| s.to_string()).collect()
}

impl TransportConfig {
    /// The child environment with references read from this process.
    pub fn resolved_env(&self) -> HashMap<String, String> {
        self.env
            .iter()
            .filter_map(|(key, value)| {
                let resolved = value.resolve();
                if resolved.is_none() {
                    tracing::debug!(key = %key, "env reference unset, not passed");
                }
                resolved.map(|v| (key.clone(), v))
            })
            .collect()
    }
}

impl BindingConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config = Self::parse(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BindingError::Io(format!("failed to read {}: {}", path.display(), e)))?;
        let mut config = Self::parse(&text)?;

        if let Some(root) = config.executable.project_root.take_if(|r| r.is_relative()) {
            let file = std::path::absolute(path).map_err(|e| {
                BindingError::Io(format!("failed to locate {}: {}", path.display(), e))
            })?;
            let base = file.parent().unwrap_or(&file);
            config.executable.project_root = Some(base.join(root));
        }

        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded binding config");
        Ok(config)
    }

    fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| BindingError::InvalidConfig(e.to_string()))
    }

    /// Validate the config, failing fast before anything is launched.
    pub fn validate(&self) -> Result<()> {
        let exe = &self.executable;

        // 1. Exactly one way to pick the program
        if exe.resolve && exe.program.is_some() {
            return Err(BindingError::InvalidConfig(
                "executable.program and executable.resolve are mutually exclusive".to_string(),
            ));
        }
        if let Some(root) = &exe.project_root {
            if !exe.resolve {
                return Err(BindingError::InvalidConfig(
                    "executable.project_root requires executable.resolve = true".to_string(),
                ));
            }
            if root.is_relative() {
                return Err(BindingError::InvalidConfig(format!(
                    "executable.project_root must be absolute outside a config file, got '{}'",
                    root.display()
                )));
            }
        }
        if exe
            .program
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(BindingError::InvalidConfig(
                "executable.program must not be empty".to_string(),
            ));
        }

        // 2. Structured flag must be usable
        let flag = &self.transport.structured_flag;
        if flag.is_empty() || flag.iter().any(|f| f.trim().is_empty()) {
            return Err(BindingError::InvalidConfig(
                "transport.structured_flag must be non-empty and contain no blank entries"
                    .to_string(),
            ));
        }

        // 3. Env keys must be settable
        if let Some(key) = self
            .transport
            .env
            .keys()
            .find(|k| k.is_empty() || k.contains('='))
        {
            return Err(BindingError::InvalidConfig(format!(
                "transport.env key '{}' is not a valid variable name",
                key
            )));
        }

        Ok(())
    }

    /// The resolver this config selects, if any.
    pub fn resolver(&self) -> Result<Option<Resolver>> {
        if !self.executable.resolve {
            return Ok(None);
        }
        let resolver = match &self.executable.project_root {
            Some(root) => Resolver::with_project_root(root)?,
            None => Resolver::from_anchor(),
        };
        Ok(Some(resolver))
    }

    /// The program to launch: resolved `nx-cli`, explicit program, or `nx`.
    pub fn program(&self) -> Result<PathBuf> {
        if let Some(resolver) = self.resolver()? {
            return resolver.resolve();
        }
        Ok(self
            .executable
            .program
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRAM)))
    }

    /// Build a subprocess invoker with env references resolved.
    pub fn invoker(&self) -> Result<SubprocessInvoker> {
        let mut invoker =
            SubprocessInvoker::new(self.program()?).with_env(self.transport.resolved_env());
        if let Some(cwd) = &self.transport.cwd {
            invoker = invoker.current_dir(cwd);
        }
        Ok(invoker)
    }

    pub fn transport(&self) -> Result<Transport<SubprocessInvoker>> {
        Ok(Transport::new(self.invoker()?)
            .with_structured_flag(self.transport.structured_flag.clone()))
    }
}
