//! Golden equivalence harness.
//!
//! Proves that a bound call prints exactly what the program prints when run
//! by hand. Each case walks
//! `Setup → DirectInvoke → BindingInvoke → Compare → Pass | Fail | Abstain`
//! inside its own temporary working directory, which is removed on every
//! exit path.
//!
//! Cases are independent: they share no mutable state, so callers may run
//! them from as many threads as they like.

pub mod manifest;

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use crate::client::Client;
use crate::error::Result;
use crate::resolver::Resolver;
use crate::transport::{
    ArgVector, DEFAULT_STRUCTURED_FLAG, Invoker, Output, SubprocessInvoker, Transport,
};

pub use manifest::{GoldenManifest, ManifestCase, ManifestFixture};

/// The bound side of a case: a call made through a client whose every
/// invocation runs in the case's working directory.
pub type BindingCall = Box<dyn Fn(&Client<SubprocessInvoker>) -> Result<Output> + Send + Sync>;

/// A file written into the working directory before anything runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    /// Relative path inside the working directory.
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

/// One equivalence check.
pub struct GoldenCase {
    pub name: String,
    /// Argument vector for the direct run, exactly as typed by hand.
    pub direct: ArgVector,
    pub fixtures: Vec<Fixture>,
    binding: BindingCall,
}

impl GoldenCase {
    pub fn new<S, F>(name: impl Into<String>, direct: impl IntoIterator<Item = S>, binding: F) -> Self
    where
        S: Into<String>,
        F: Fn(&Client<SubprocessInvoker>) -> Result<Output> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            direct: direct.into_iter().collect(),
            fixtures: Vec::new(),
            binding: Box::new(binding),
        }
    }

    pub fn with_fixture(mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.fixtures.push(Fixture {
            path: path.into(),
            contents: contents.into(),
        });
        self
    }
}

impl fmt::Debug for GoldenCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoldenCase")
            .field("name", &self.name)
            .field("direct", &self.direct)
            .field("fixtures", &self.fixtures)
            .finish_non_exhaustive()
    }
}

/// Where in the state machine a case stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoldenStage {
    Setup,
    DirectInvoke,
    BindingInvoke,
    Compare,
}

impl fmt::Display for GoldenStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GoldenStage::Setup => "setup",
            GoldenStage::DirectInvoke => "direct invoke",
            GoldenStage::BindingInvoke => "binding invoke",
            GoldenStage::Compare => "compare",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoldenOutcome {
    Pass,
    Fail { stage: GoldenStage, reason: String },
    /// The direct run itself exited non-zero, so there is nothing to compare
    /// against. Not a failure.
    Abstain { exit_code: i32, stderr: String },
}

impl GoldenOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, GoldenOutcome::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, GoldenOutcome::Fail { .. })
    }

    fn fail(stage: GoldenStage, reason: impl Into<String>) -> Self {
        GoldenOutcome::Fail {
            stage,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GoldenReport {
    pub name: String,
    pub outcome: GoldenOutcome,
    /// The (already removed) working directory the case ran in.
    pub workdir: PathBuf,
    pub duration: Duration,
}

impl fmt::Display for GoldenReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.duration.as_millis();
        match &self.outcome {
            GoldenOutcome::Pass => write!(f, "PASS  {} ({} ms)", self.name, ms),
            GoldenOutcome::Fail { stage, reason } => {
                write!(f, "FAIL  {} at {}: {}", self.name, stage, reason)
            }
            GoldenOutcome::Abstain { exit_code, stderr } => {
                write!(f, "SKIP  {} (direct run exited {}): {}", self.name, exit_code, stderr)
            }
        }
    }
}

/// Where a harness gets its executable from.
#[derive(Debug, Clone)]
enum ProgramSource {
    Fixed(PathBuf),
    /// Resolved again in every case's Setup stage.
    Resolved(Resolver),
}

/// Runs golden cases against the `nx-cli` executable.
#[derive(Debug, Clone)]
pub struct GoldenHarness {
    source: ProgramSource,
    structured_flag: Vec<String>,
}

impl GoldenHarness {
    /// Harness for an explicit executable, bypassing the resolver.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self::with_source(ProgramSource::Fixed(program.into()))
    }

    /// Harness for the `nx-cli` found by the anchored resolver.
    pub fn resolve() -> Self {
        Self::with_resolver(Resolver::from_anchor())
    }

    pub fn with_resolver(resolver: Resolver) -> Self {
        Self::with_source(ProgramSource::Resolved(resolver))
    }

    fn with_source(source: ProgramSource) -> Self {
        Self {
            source,
            structured_flag: DEFAULT_STRUCTURED_FLAG.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_structured_flag(mut self, flag: Vec<String>) -> Self {
        self.structured_flag = flag;
        self
    }

    /// The executable a case started now would run.
    pub fn program(&self) -> Result<PathBuf> {
        match &self.source {
            ProgramSource::Fixed(program) => Ok(program.clone()),
            ProgramSource::Resolved(resolver) => resolver.resolve(),
        }
    }

    /// Run one case to completion. Never panics on case failure; every
    /// problem is folded into the report.
    pub fn run(&self, case: &GoldenCase) -> GoldenReport {
        let start = Instant::now();
        let span = tracing::info_span!("golden_case", case = %case.name);
        let _enter = span.enter();

        let workdir = tempfile::Builder::new().prefix("nx-golden-").tempdir();
        let (outcome, workdir) = match workdir {
            Ok(dir) => {
                let path = dir.path().to_path_buf();
                let outcome = self.run_in(case, &path);
                if let Err(e) = dir.close() {
                    tracing::warn!(workdir = %path.display(), error = %e, "failed to remove working directory");
                }
                (outcome, path)
            }
            Err(e) => (
                GoldenOutcome::fail(
                    GoldenStage::Setup,
                    format!("failed to create working directory: {}", e),
                ),
                PathBuf::new(),
            ),
        };

        match &outcome {
            GoldenOutcome::Pass => tracing::info!("golden case passed"),
            GoldenOutcome::Fail { stage, reason } => {
                tracing::warn!(stage = %stage, reason = %reason, "golden case failed")
            }
            GoldenOutcome::Abstain { exit_code, .. } => {
                tracing::info!(exit_code, "golden case abstained")
            }
        }

        GoldenReport {
            name: case.name.clone(),
            outcome,
            workdir,
            duration: start.elapsed(),
        }
    }

    /// Run cases one after another, in order.
    pub fn run_all<'a>(&self, cases: impl IntoIterator<Item = &'a GoldenCase>) -> Vec<GoldenReport> {
        cases.into_iter().map(|case| self.run(case)).collect()
    }

    fn run_in(&self, case: &GoldenCase, workdir: &Path) -> GoldenOutcome {
        let program = match self.program() {
            Ok(program) => program,
            Err(e) => return GoldenOutcome::fail(GoldenStage::Setup, e.to_string()),
        };
        for fixture in &case.fixtures {
            if let Err(reason) = write_fixture(workdir, fixture) {
                return GoldenOutcome::fail(GoldenStage::Setup, reason);
            }
        }

        let invoker = SubprocessInvoker::new(program).current_dir(workdir);
        let direct = match invoker.execute(&case.direct) {
            Ok(captured) => captured,
            Err(e) => return GoldenOutcome::fail(GoldenStage::DirectInvoke, e.to_string()),
        };
        if !direct.succeeded() {
            return GoldenOutcome::Abstain {
                exit_code: direct.exit_code,
                stderr: direct.stderr.trim().to_string(),
            };
        }

        let client = Client::with_transport(
            Transport::new(invoker).with_structured_flag(self.structured_flag.clone()),
        );
        let output = match (case.binding)(&client) {
            Ok(output) => output,
            Err(e) => return GoldenOutcome::fail(GoldenStage::BindingInvoke, e.to_string()),
        };

        // Compared as bytes: direct stdout is never decoded before comparison
        let expected = direct.stdout.trim_ascii();
        let rendered = output.to_golden_text();
        let actual = rendered.as_bytes().trim_ascii();
        if expected == actual {
            GoldenOutcome::Pass
        } else {
            GoldenOutcome::fail(
                GoldenStage::Compare,
                format!(
                    "output differs\n  direct:  {}\n  binding: {}",
                    String::from_utf8_lossy(expected),
                    String::from_utf8_lossy(actual)
                ),
            )
        }
    }
}

fn write_fixture(workdir: &Path, fixture: &Fixture) -> std::result::Result<(), String> {
    let relative = &fixture.path;
    let contained = relative.components().next().is_some()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if !contained {
        return Err(format!(
            "fixture path '{}' must be relative and stay inside the working directory",
            relative.display()
        ));
    }

    let target = workdir.join(relative);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
    }
    std::fs::write(&target, &fixture.contents)
        .map_err(|e| format!("failed to write fixture {}: {}", relative.display(), e))
}
