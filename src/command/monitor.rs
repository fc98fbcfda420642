//! `nx monitor`: read-only system observation.

use super::{CommandArgs, CommandSpec, FlagSpec, FormatSpec, PositionalSpec, Support};
use crate::error::Result;
use crate::transport::{Invoker, Output, Transport};

cli_choice! {
    /// Output format for monitor commands.
    ///
    /// The binding defaults to JSON; the CLI itself defaults to text.
    #[derive(Default)]
    MonitorFormat, "format" {
        #[default]
        Json => "json",
        Text => "text",
    }
}

const FORMAT: FormatSpec = FormatSpec {
    default: "text",
    accepted: MonitorFormat::ACCEPTED,
};

pub static STATUS: CommandSpec = CommandSpec {
    path: &["monitor", "status"],
    summary: "Global system status snapshot",
    positionals: &[],
    flags: &[],
    format: FORMAT,
    exclusive: &[],
    support: Support::Implemented,
};

pub static JOBS: CommandSpec = CommandSpec {
    path: &["monitor", "jobs"],
    summary: "Jobs list snapshot",
    positionals: &[],
    flags: &[FlagSpec::text("engine")],
    format: FORMAT,
    exclusive: &[],
    support: Support::Implemented,
};

pub static JOB: CommandSpec = CommandSpec {
    path: &["monitor", "job"],
    summary: "Single job snapshot",
    positionals: &[PositionalSpec::flagged("job_id", "--id")],
    flags: &[],
    format: FORMAT,
    exclusive: &[],
    support: Support::Implemented,
};

pub static ENGINES: CommandSpec = CommandSpec {
    path: &["monitor", "engines"],
    summary: "Engines list snapshot",
    positionals: &[],
    flags: &[],
    format: FORMAT,
    exclusive: &[],
    support: Support::Implemented,
};

pub static VERSION: CommandSpec = CommandSpec {
    path: &["monitor", "version"],
    summary: "Version information",
    positionals: &[],
    flags: &[],
    format: FORMAT,
    exclusive: &[],
    support: Support::Implemented,
};

/// Bindings for the `nx monitor` group.
pub struct Monitor<'a, I> {
    transport: &'a Transport<I>,
}

impl<'a, I: Invoker> Monitor<'a, I> {
    pub(crate) fn new(transport: &'a Transport<I>) -> Self {
        Self { transport }
    }

    /// Mirrors: `nx monitor status [--format json|text]`
    pub fn status(&self, format: MonitorFormat) -> Result<Output> {
        STATUS.call(self.transport, &CommandArgs::new().format(format.as_str()))
    }

    /// Mirrors: `nx monitor jobs [--engine <name>] [--format json|text]`
    pub fn jobs(&self, engine: Option<&str>, format: MonitorFormat) -> Result<Output> {
        let args = CommandArgs::new()
            .value_opt("engine", engine)
            .format(format.as_str());
        JOBS.call(self.transport, &args)
    }

    /// Mirrors: `nx monitor job --id <job_id> [--format json|text]`
    pub fn job(&self, job_id: &str, format: MonitorFormat) -> Result<Output> {
        let args = CommandArgs::new().positional(job_id).format(format.as_str());
        JOB.call(self.transport, &args)
    }

    /// Mirrors: `nx monitor engines [--format json|text]`
    pub fn engines(&self, format: MonitorFormat) -> Result<Output> {
        ENGINES.call(self.transport, &CommandArgs::new().format(format.as_str()))
    }

    /// Mirrors: `nx monitor version [--format json|text]`
    pub fn version(&self, format: MonitorFormat) -> Result<Output> {
        VERSION.call(self.transport, &CommandArgs::new().format(format.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BindingError, ValidationError};
    use crate::transport::{CapturedOutput, OutputKind, RecordingInvoker};
    use serde_json::json;

    fn transport(stdout: &str) -> Transport<RecordingInvoker> {
        Transport::new(RecordingInvoker::new(CapturedOutput::success(stdout)))
    }

    fn last_args(transport: &Transport<RecordingInvoker>) -> Vec<String> {
        transport.invoker().last_args().unwrap().as_slice().to_vec()
    }

    #[test]
    fn test_status_json() {
        let t = transport(r#"{"status":"idle","engines":[]}"#);
        let output = Monitor::new(&t).status(MonitorFormat::Json).unwrap();
        assert_eq!(
            output.as_structured(),
            Some(&json!({"status": "idle", "engines": []}))
        );
        assert_eq!(last_args(&t), ["monitor", "status", "--format", "json"]);
    }

    #[test]
    fn test_status_text_omits_cli_default_format() {
        let t = transport("status: idle\n");
        let output = Monitor::new(&t).status(MonitorFormat::Text).unwrap();
        assert_eq!(output.kind(), OutputKind::Raw);
        assert_eq!(output.as_raw(), Some("status: idle\n"));
        assert_eq!(last_args(&t), ["monitor", "status"]);
    }

    #[test]
    fn test_binding_default_format_is_json() {
        assert_eq!(MonitorFormat::default(), MonitorFormat::Json);
    }

    #[test]
    fn test_jobs_engine_filter() {
        let t = transport("[]");
        Monitor::new(&t).jobs(Some("audio"), MonitorFormat::Json).unwrap();
        assert_eq!(
            last_args(&t),
            ["monitor", "jobs", "--engine", "audio", "--format", "json"]
        );

        Monitor::new(&t).jobs(None, MonitorFormat::Json).unwrap();
        assert_eq!(last_args(&t), ["monitor", "jobs", "--format", "json"]);
    }

    #[test]
    fn test_job_uses_id_flag() {
        let t = transport(r#"{"job_id":"j-7"}"#);
        Monitor::new(&t).job("j-7", MonitorFormat::Json).unwrap();
        assert_eq!(
            last_args(&t),
            ["monitor", "job", "--id", "j-7", "--format", "json"]
        );
    }

    #[test]
    fn test_job_requires_id_before_launch() {
        let t = transport("{}");
        let err = Monitor::new(&t).job("", MonitorFormat::Json).unwrap_err();
        assert!(matches!(
            err,
            BindingError::Validation(ValidationError::EmptyIdentifier { ref name }) if name == "job_id"
        ));
        assert_eq!(t.invoker().launches(), 0);
    }

    #[test]
    fn test_engines_and_version() {
        let t = transport(r#"{"version":"14a.0.0"}"#);
        let monitor = Monitor::new(&t);
        monitor.engines(MonitorFormat::Text).unwrap();
        assert_eq!(last_args(&t), ["monitor", "engines"]);
        monitor.version(MonitorFormat::Json).unwrap();
        assert_eq!(last_args(&t), ["monitor", "version", "--format", "json"]);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("text".parse::<MonitorFormat>(), Ok(MonitorFormat::Text));
        let err = "yaml".parse::<MonitorFormat>().unwrap_err();
        assert_eq!(err.to_string(), "invalid format: 'yaml'. Must be one of: json, text");
    }
}
