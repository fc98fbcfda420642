//! `nx batch`: batch introspection over materialized batch artifacts.
//!
//! `batch inspect *` is fully bound. The session-level `batch status`,
//! `batch session` and `batch jobs` commands are declared so they show up in
//! the registry, but fail with `NotImplemented` until their output contract
//! settles.

use super::{CommandArgs, CommandSpec, FlagSpec, FormatSpec, PositionalSpec, Support};
use crate::error::Result;
use crate::transport::{Invoker, Output, Transport};

cli_choice! {
    /// Output format for `batch inspect` commands (CLI default: json).
    #[derive(Default)]
    InspectFormat, "format" {
        #[default]
        Json => "json",
        Human => "human",
    }
}

cli_choice! {
    /// Job ordering for `batch inspect jobs`.
    #[derive(Default)]
    JobSort, "sort" {
        #[default]
        Execution => "execution",
        Dependency => "dependency",
        Id => "id",
    }
}

cli_choice! {
    /// Materialized job state filter.
    JobState, "filter-state" {
        Success => "success",
        Failed => "failed",
        Skipped => "skipped",
    }
}

cli_choice! {
    PolicyType, "policy-type" {
        Retry => "retry",
        Failure => "failure",
        Execution => "execution",
    }
}

cli_choice! {
    ArtifactType, "artifact-type" {
        Report => "report",
        Validation => "validation",
        Hash => "hash",
        Timeline => "timeline",
        Log => "log",
    }
}

cli_choice! {
    /// Output format for `batch inspect artifact`; raw content by default.
    #[derive(Default)]
    ArtifactFormat, "format" {
        #[default]
        Raw => "raw",
        Json => "json",
    }
}

const INSPECT_FORMAT: FormatSpec = FormatSpec {
    default: "json",
    accepted: InspectFormat::ACCEPTED,
};

const BATCH_ID: PositionalSpec = PositionalSpec::bare("batch_id");

pub static INSPECT_PLAN: CommandSpec = CommandSpec {
    path: &["batch", "inspect", "plan"],
    summary: "Display batch plan structure and DAG",
    positionals: &[BATCH_ID],
    flags: &[FlagSpec::switch("jobs-only"), FlagSpec::switch("dag-only")],
    format: INSPECT_FORMAT,
    exclusive: &[("jobs-only", "dag-only")],
    support: Support::Implemented,
};

pub static INSPECT_JOBS: CommandSpec = CommandSpec {
    path: &["batch", "inspect", "jobs"],
    summary: "List all jobs in batch with metadata",
    positionals: &[BATCH_ID],
    flags: &[
        FlagSpec::text("filter-type"),
        FlagSpec::choice("sort", Some("execution"), JobSort::ACCEPTED),
    ],
    format: INSPECT_FORMAT,
    exclusive: &[],
    support: Support::Implemented,
};

pub static INSPECT_STATUS: CommandSpec = CommandSpec {
    path: &["batch", "inspect", "status"],
    summary: "Show materialized execution state for all jobs",
    positionals: &[BATCH_ID],
    flags: &[
        FlagSpec::choice("filter-state", None, JobState::ACCEPTED),
        FlagSpec::switch("include-retries"),
    ],
    format: INSPECT_FORMAT,
    exclusive: &[],
    support: Support::Implemented,
};

pub static INSPECT_JOB: CommandSpec = CommandSpec {
    path: &["batch", "inspect", "job"],
    summary: "Detailed view of single job execution",
    positionals: &[BATCH_ID, PositionalSpec::bare("job_id")],
    flags: &[
        FlagSpec::switch("include-artifacts"),
        FlagSpec::switch("include-timeline"),
    ],
    format: INSPECT_FORMAT,
    exclusive: &[],
    support: Support::Implemented,
};

pub static INSPECT_POLICIES: CommandSpec = CommandSpec {
    path: &["batch", "inspect", "policies"],
    summary: "Show resolved policy decisions for batch",
    positionals: &[BATCH_ID],
    flags: &[
        FlagSpec::text("job-id"),
        FlagSpec::choice("policy-type", None, PolicyType::ACCEPTED),
    ],
    format: INSPECT_FORMAT,
    exclusive: &[],
    support: Support::Implemented,
};

pub static INSPECT_ARTIFACTS: CommandSpec = CommandSpec {
    path: &["batch", "inspect", "artifacts"],
    summary: "List all artifacts produced by batch execution",
    positionals: &[BATCH_ID],
    flags: &[
        FlagSpec::choice("artifact-type", None, ArtifactType::ACCEPTED),
        FlagSpec::text("job-id"),
    ],
    format: INSPECT_FORMAT,
    exclusive: &[],
    support: Support::Implemented,
};

pub static INSPECT_ARTIFACT: CommandSpec = CommandSpec {
    path: &["batch", "inspect", "artifact"],
    summary: "Display specific artifact content",
    positionals: &[BATCH_ID, PositionalSpec::bare("artifact_id")],
    flags: &[FlagSpec::count("max-size", 0)],
    format: FormatSpec {
        default: "raw",
        accepted: ArtifactFormat::ACCEPTED,
    },
    exclusive: &[],
    support: Support::Implemented,
};

pub static STATUS: CommandSpec = CommandSpec {
    path: &["batch", "status"],
    summary: "Batch execution status",
    positionals: &[],
    flags: &[],
    format: INSPECT_FORMAT,
    exclusive: &[],
    support: Support::Pending,
};

pub static SESSION: CommandSpec = CommandSpec {
    path: &["batch", "session"],
    summary: "Single batch session",
    positionals: &[PositionalSpec::bare("session_id")],
    flags: &[],
    format: INSPECT_FORMAT,
    exclusive: &[],
    support: Support::Pending,
};

pub static JOBS: CommandSpec = CommandSpec {
    path: &["batch", "jobs"],
    summary: "Jobs of a batch session",
    positionals: &[PositionalSpec::bare("session_id")],
    flags: &[],
    format: INSPECT_FORMAT,
    exclusive: &[],
    support: Support::Pending,
};

/// Options for `batch inspect plan`. `Default` matches the CLI defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOptions {
    pub format: InspectFormat,
    /// Show only the job list, without dependencies
    pub jobs_only: bool,
    /// Show only the dependency graph
    pub dag_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobsOptions {
    pub format: InspectFormat,
    pub filter_type: Option<String>,
    pub sort: JobSort,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusOptions {
    pub format: InspectFormat,
    pub filter_state: Option<JobState>,
    pub include_retries: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOptions {
    pub format: InspectFormat,
    pub include_artifacts: bool,
    pub include_timeline: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoliciesOptions {
    pub format: InspectFormat,
    pub job_id: Option<String>,
    pub policy_type: Option<PolicyType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactsOptions {
    pub format: InspectFormat,
    pub artifact_type: Option<ArtifactType>,
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactOptions {
    pub format: ArtifactFormat,
    /// Byte limit on returned content; 0 means unlimited
    pub max_size: u64,
}

/// Bindings for the `nx batch inspect` subgroup.
pub struct BatchInspect<'a, I> {
    transport: &'a Transport<I>,
}

impl<'a, I: Invoker> BatchInspect<'a, I> {
    pub(crate) fn new(transport: &'a Transport<I>) -> Self {
        Self { transport }
    }

    /// Mirrors: `nx batch inspect plan <batch_id> [--jobs-only|--dag-only] [--format json|human]`
    pub fn plan(&self, batch_id: &str, opts: &PlanOptions) -> Result<Output> {
        let args = CommandArgs::new()
            .positional(batch_id)
            .switch("jobs-only", opts.jobs_only)
            .switch("dag-only", opts.dag_only)
            .format(opts.format.as_str());
        INSPECT_PLAN.call(self.transport, &args)
    }

    /// Mirrors: `nx batch inspect jobs <batch_id> [--filter-type <t>] [--sort execution|dependency|id]`
    pub fn jobs(&self, batch_id: &str, opts: &JobsOptions) -> Result<Output> {
        let args = CommandArgs::new()
            .positional(batch_id)
            .value_opt("filter-type", opts.filter_type.as_deref())
            .value("sort", opts.sort.as_str())
            .format(opts.format.as_str());
        INSPECT_JOBS.call(self.transport, &args)
    }

    /// Mirrors: `nx batch inspect status <batch_id> [--filter-state <s>] [--include-retries]`
    pub fn status(&self, batch_id: &str, opts: &StatusOptions) -> Result<Output> {
        let args = CommandArgs::new()
            .positional(batch_id)
            .value_opt("filter-state", opts.filter_state.map(JobState::as_str))
            .switch("include-retries", opts.include_retries)
            .format(opts.format.as_str());
        INSPECT_STATUS.call(self.transport, &args)
    }

    /// Mirrors: `nx batch inspect job <batch_id> <job_id> [--include-artifacts] [--include-timeline]`
    pub fn job(&self, batch_id: &str, job_id: &str, opts: &JobOptions) -> Result<Output> {
        let args = CommandArgs::new()
            .positional(batch_id)
            .positional(job_id)
            .switch("include-artifacts", opts.include_artifacts)
            .switch("include-timeline", opts.include_timeline)
            .format(opts.format.as_str());
        INSPECT_JOB.call(self.transport, &args)
    }

    /// Mirrors: `nx batch inspect policies <batch_id> [--job-id <id>] [--policy-type <t>]`
    pub fn policies(&self, batch_id: &str, opts: &PoliciesOptions) -> Result<Output> {
        let args = CommandArgs::new()
            .positional(batch_id)
            .value_opt("job-id", opts.job_id.as_deref())
            .value_opt("policy-type", opts.policy_type.map(PolicyType::as_str))
            .format(opts.format.as_str());
        INSPECT_POLICIES.call(self.transport, &args)
    }

    /// Mirrors: `nx batch inspect artifacts <batch_id> [--artifact-type <t>] [--job-id <id>]`
    pub fn artifacts(&self, batch_id: &str, opts: &ArtifactsOptions) -> Result<Output> {
        let args = CommandArgs::new()
            .positional(batch_id)
            .value_opt("artifact-type", opts.artifact_type.map(ArtifactType::as_str))
            .value_opt("job-id", opts.job_id.as_deref())
            .format(opts.format.as_str());
        INSPECT_ARTIFACTS.call(self.transport, &args)
    }

    /// Mirrors: `nx batch inspect artifact <batch_id> <artifact_id> [--max-size <n>] [--format raw|json]`
    pub fn artifact(&self, batch_id: &str, artifact_id: &str, opts: &ArtifactOptions) -> Result<Output> {
        let args = CommandArgs::new()
            .positional(batch_id)
            .positional(artifact_id)
            .value("max-size", opts.max_size.to_string())
            .format(opts.format.as_str());
        INSPECT_ARTIFACT.call(self.transport, &args)
    }
}

/// Bindings for the session-level `nx batch` commands.
pub struct Batch<'a, I> {
    transport: &'a Transport<I>,
}

impl<'a, I: Invoker> Batch<'a, I> {
    pub(crate) fn new(transport: &'a Transport<I>) -> Self {
        Self { transport }
    }

    pub fn inspect(&self) -> BatchInspect<'a, I> {
        BatchInspect::new(self.transport)
    }

    /// Mirrors: `nx batch status` (not bound yet)
    pub fn status(&self) -> Result<Output> {
        STATUS.call(self.transport, &CommandArgs::new())
    }

    /// Mirrors: `nx batch session <session_id>` (not bound yet)
    pub fn session(&self, session_id: &str) -> Result<Output> {
        SESSION.call(self.transport, &CommandArgs::new().positional(session_id))
    }

    /// Mirrors: `nx batch jobs <session_id>` (not bound yet)
    pub fn jobs(&self, session_id: &str) -> Result<Output> {
        JOBS.call(self.transport, &CommandArgs::new().positional(session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandArgs;
    use crate::error::{BindingError, ValidationError};
    use crate::transport::{CapturedOutput, OutputKind, RecordingInvoker};

    fn transport(output: CapturedOutput) -> Transport<RecordingInvoker> {
        Transport::new(RecordingInvoker::new(output))
    }

    fn ok() -> Transport<RecordingInvoker> {
        transport(CapturedOutput::success(r#"{"plan_id":"b-1","jobs":[]}"#))
    }

    fn last_args(t: &Transport<RecordingInvoker>) -> Vec<String> {
        t.invoker().last_args().unwrap().as_slice().to_vec()
    }

    #[test]
    fn test_plan_defaults() {
        let t = ok();
        BatchInspect::new(&t)
            .plan("b-1", &PlanOptions::default())
            .unwrap();
        assert_eq!(
            last_args(&t),
            ["batch", "inspect", "plan", "b-1", "--format", "json"]
        );
    }

    #[test]
    fn test_plan_jobs_only() {
        let t = ok();
        let opts = PlanOptions {
            jobs_only: true,
            ..Default::default()
        };
        BatchInspect::new(&t).plan("b-1", &opts).unwrap();
        assert_eq!(
            last_args(&t),
            ["batch", "inspect", "plan", "b-1", "--jobs-only", "--format", "json"]
        );
    }

    #[test]
    fn test_plan_jobs_only_and_dag_only_rejected_before_launch() {
        let t = ok();
        let opts = PlanOptions {
            jobs_only: true,
            dag_only: true,
            ..Default::default()
        };
        let err = BatchInspect::new(&t).plan("b-1", &opts).unwrap_err();
        assert!(
            matches!(err, BindingError::Validation(ValidationError::MutuallyExclusive { .. })),
            "got {:?}",
            err
        );
        assert_eq!(t.invoker().launches(), 0, "no process may be spawned");
    }

    #[test]
    fn test_flag_like_batch_id_rejected_before_launch() {
        let t = ok();
        let opts = PlanOptions {
            jobs_only: true,
            ..Default::default()
        };
        let err = BatchInspect::new(&t).plan("--dag-only", &opts).unwrap_err();
        assert!(
            matches!(err, BindingError::Validation(ValidationError::FlagLikeValue { ref name, .. }) if name == "batch_id"),
            "got {:?}",
            err
        );
        assert_eq!(t.invoker().launches(), 0, "no process may be spawned");
    }

    #[test]
    fn test_flag_like_filter_type_rejected_before_launch() {
        let t = ok();
        let opts = JobsOptions {
            filter_type: Some("--sort".to_string()),
            ..Default::default()
        };
        let err = BatchInspect::new(&t).jobs("b-1", &opts).unwrap_err();
        assert!(
            matches!(err, BindingError::Validation(ValidationError::FlagLikeValue { ref name, .. }) if name == "filter-type"),
            "got {:?}",
            err
        );
        assert_eq!(t.invoker().launches(), 0);
    }

    #[test]
    fn test_plan_empty_batch_id_rejected_before_launch() {
        let t = ok();
        let err = BatchInspect::new(&t)
            .plan("", &PlanOptions::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid arguments: batch_id is required");
        assert_eq!(t.invoker().launches(), 0);
    }

    #[test]
    fn test_plan_human_is_raw_with_format_flag() {
        let t = transport(CapturedOutput::success("Plan b-1\n  (no jobs)\n"));
        let opts = PlanOptions {
            format: InspectFormat::Human,
            ..Default::default()
        };
        let output = BatchInspect::new(&t).plan("b-1", &opts).unwrap();
        assert_eq!(output.kind(), OutputKind::Raw);
        assert_eq!(
            last_args(&t),
            ["batch", "inspect", "plan", "b-1", "--format", "human"]
        );
    }

    #[test]
    fn test_batch_not_found_surfaces_exit_code_and_stderr() {
        let t = transport(CapturedOutput::failure(2, "batch not found\n"));
        let err = BatchInspect::new(&t)
            .plan("missing", &PlanOptions::default())
            .unwrap_err();
        match err {
            BindingError::Invocation { exit_code, stderr } => {
                assert_eq!(exit_code, 2);
                assert_eq!(stderr, "batch not found");
            }
            other => panic!("expected Invocation, got {:?}", other),
        }
    }

    #[test]
    fn test_jobs_sort_default_omitted() {
        let t = ok();
        let inspect = BatchInspect::new(&t);
        inspect.jobs("b-1", &JobsOptions::default()).unwrap();
        let omitted = last_args(&t);

        let explicit = JobsOptions {
            sort: JobSort::Execution,
            filter_type: Some(String::new()),
            ..Default::default()
        };
        inspect.jobs("b-1", &explicit).unwrap();
        assert_eq!(last_args(&t), omitted);
        assert_eq!(omitted, ["batch", "inspect", "jobs", "b-1", "--format", "json"]);
    }

    #[test]
    fn test_jobs_with_filter_and_sort() {
        let t = ok();
        let opts = JobsOptions {
            filter_type: Some("audio".to_string()),
            sort: JobSort::Dependency,
            ..Default::default()
        };
        BatchInspect::new(&t).jobs("b-1", &opts).unwrap();
        assert_eq!(
            last_args(&t),
            [
                "batch", "inspect", "jobs", "b-1", "--filter-type", "audio", "--sort",
                "dependency", "--format", "json"
            ]
        );
    }

    #[test]
    fn test_sort_outside_closed_set_rejected() {
        let err = "random".parse::<JobSort>().unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidChoice { ref value, ref accepted, .. }
                if value == "random" && accepted == &["execution", "dependency", "id"]
        ));

        let t = ok();
        let call = CommandArgs::new().positional("b-1").value("sort", "random");
        let err = INSPECT_JOBS.call(&t, &call).unwrap_err();
        assert!(err.to_string().contains("'random'"));
        assert_eq!(t.invoker().launches(), 0);
    }

    #[test]
    fn test_status_filters() {
        let t = ok();
        let opts = StatusOptions {
            filter_state: Some(JobState::Failed),
            include_retries: true,
            ..Default::default()
        };
        BatchInspect::new(&t).status("b-1", &opts).unwrap();
        assert_eq!(
            last_args(&t),
            [
                "batch", "inspect", "status", "b-1", "--filter-state", "failed",
                "--include-retries", "--format", "json"
            ]
        );
    }

    #[test]
    fn test_job_requires_both_identifiers() {
        let t = ok();
        let inspect = BatchInspect::new(&t);
        let err = inspect.job("b-1", "", &JobOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "invalid arguments: job_id is required");

        let opts = JobOptions {
            include_timeline: true,
            ..Default::default()
        };
        inspect.job("b-1", "j-3", &opts).unwrap();
        assert_eq!(
            last_args(&t),
            ["batch", "inspect", "job", "b-1", "j-3", "--include-timeline", "--format", "json"]
        );
    }

    #[test]
    fn test_policies_and_artifacts() {
        let t = ok();
        let inspect = BatchInspect::new(&t);
        let opts = PoliciesOptions {
            job_id: Some("j-1".to_string()),
            policy_type: Some(PolicyType::Retry),
            ..Default::default()
        };
        inspect.policies("b-1", &opts).unwrap();
        assert_eq!(
            last_args(&t),
            [
                "batch", "inspect", "policies", "b-1", "--job-id", "j-1", "--policy-type",
                "retry", "--format", "json"
            ]
        );

        let opts = ArtifactsOptions {
            artifact_type: Some(ArtifactType::Hash),
            ..Default::default()
        };
        inspect.artifacts("b-1", &opts).unwrap();
        assert_eq!(
            last_args(&t),
            ["batch", "inspect", "artifacts", "b-1", "--artifact-type", "hash", "--format", "json"]
        );
    }

    #[test]
    fn test_artifact_is_raw_by_default() {
        let t = transport(CapturedOutput::success("sha256  abc123  out.wav\n"));
        let inspect = BatchInspect::new(&t);
        let output = inspect
            .artifact("b-1", "a-9", &ArtifactOptions::default())
            .unwrap();
        assert_eq!(output.as_raw(), Some("sha256  abc123  out.wav\n"));
        assert_eq!(last_args(&t), ["batch", "inspect", "artifact", "b-1", "a-9"]);

        let opts = ArtifactOptions {
            max_size: 1024,
            ..Default::default()
        };
        inspect.artifact("b-1", "a-9", &opts).unwrap();
        assert_eq!(
            last_args(&t),
            ["batch", "inspect", "artifact", "b-1", "a-9", "--max-size", "1024"]
        );
    }

    #[test]
    fn test_pending_batch_commands_fail_fast() {
        let t = ok();
        let batch = Batch::new(&t);
        assert!(matches!(batch.status(), Err(BindingError::NotImplemented(ref n)) if n == "batch status"));
        assert!(matches!(batch.session("s-1"), Err(BindingError::NotImplemented(_))));
        assert!(matches!(batch.jobs("s-1"), Err(BindingError::NotImplemented(_))));
        assert_eq!(t.invoker().launches(), 0);
    }
}
