//! nx-bind — Rust binding transport for the `nx` command-line program.
//! Resolves the `nx-cli` executable deterministically, mirrors every
//! supported subcommand as a typed call, and proves with a golden harness
//! that bound output is byte-identical to running the program by hand.

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod golden;
pub mod resolver;
pub mod transport;

pub use client::Client;
pub use command::batch::{
    ArtifactFormat, ArtifactOptions, ArtifactType, ArtifactsOptions, Batch, BatchInspect,
    InspectFormat, JobOptions, JobSort, JobState, JobsOptions, PlanOptions, PoliciesOptions,
    PolicyType, StatusOptions,
};
pub use command::monitor::{Monitor, MonitorFormat};
pub use command::{CommandArgs, CommandSpec, FlagValue, Support};
pub use config::{BindingConfig, EnvValue};
pub use error::{BindingError, Result, ValidationError};
pub use golden::{GoldenCase, GoldenHarness, GoldenManifest, GoldenOutcome, GoldenReport, GoldenStage};
pub use resolver::Resolver;
pub use transport::{
    ArgVector, CapturedOutput, Invoker, Output, OutputKind, RecordingInvoker, SubprocessInvoker,
    Transport,
};
