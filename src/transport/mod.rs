//! Invocation transport. Turns an argument vector into a parsed result or
//! a typed failure.
//!
//! Structured output is requested centrally: `invoke_structured` always
//! appends the structured-output flag, so no command mirror has to remember
//! it. Nothing is retried; every failure reaches the caller unchanged.

pub mod args;
pub mod invoker;
pub mod recording;

use serde_json::Value;

use crate::error::{BindingError, Result};

pub use args::ArgVector;
pub use invoker::{CapturedOutput, DEFAULT_PROGRAM, Invoker, SubprocessInvoker};
pub use recording::RecordingInvoker;

/// Flag appended by `invoke_structured` unless configured otherwise.
pub const DEFAULT_STRUCTURED_FLAG: [&str; 2] = ["--format", "json"];

/// Which invocation a command's output calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// JSON on stdout, parsed
    Structured,
    /// Human text on stdout, returned verbatim
    Raw,
}

/// Result of one successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Structured(Value),
    Raw(String),
}

impl Output {
    pub fn kind(&self) -> OutputKind {
        match self {
            Output::Structured(_) => OutputKind::Structured,
            Output::Raw(_) => OutputKind::Raw,
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Output::Structured(v) => Some(v),
            Output::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Output::Raw(s) => Some(s),
            Output::Structured(_) => None,
        }
    }

    /// Canonical text used for golden comparison.
    ///
    /// Structured values are written in compact form with keys in the order
    /// they were produced and numbers exactly as parsed. Raw text is
    /// returned as-is.
    pub fn to_golden_text(&self) -> String {
        match self {
            Output::Structured(v) => v.to_string(),
            Output::Raw(s) => s.clone(),
        }
    }
}

/// Runs argument vectors through an [`Invoker`] and maps the outcome.
#[derive(Debug, Clone)]
pub struct Transport<I = SubprocessInvoker> {
    invoker: I,
    structured_flag: Vec<String>,
}

impl Default for Transport<SubprocessInvoker> {
    fn default() -> Self {
        Self::new(SubprocessInvoker::default())
    }
}

impl<I: Invoker> Transport<I> {
    pub fn new(invoker: I) -> Self {
        Self {
            invoker,
            structured_flag: DEFAULT_STRUCTURED_FLAG.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the flag appended by `invoke_structured`.
    pub fn with_structured_flag(mut self, flag: Vec<String>) -> Self {
        self.structured_flag = flag;
        self
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    pub fn structured_flag(&self) -> &[String] {
        &self.structured_flag
    }

    /// Run `args` with the structured-output flag appended and parse stdout
    /// as JSON.
    pub fn invoke_structured(&self, args: ArgVector) -> Result<Value> {
        let args = args.appended(&self.structured_flag);
        let captured = self.run(&args)?;

        // from_slice rejects invalid UTF-8 instead of substituting it
        serde_json::from_slice(&captured.stdout).map_err(|e| {
            tracing::warn!(args = %args, error = %e, "nx produced invalid JSON");
            BindingError::OutputParse(e.to_string())
        })
    }

    /// Run `args` as given and return stdout verbatim.
    ///
    /// Stdout that is not valid UTF-8 is an `OutputParse` failure; no byte
    /// is ever replaced.
    pub fn invoke_raw(&self, args: ArgVector) -> Result<String> {
        let captured = self.run(&args)?;
        String::from_utf8(captured.stdout).map_err(|e| {
            tracing::warn!(args = %args, error = %e, "nx produced non-UTF-8 text");
            BindingError::OutputParse(format!("stdout is not valid UTF-8: {}", e.utf8_error()))
        })
    }

    pub fn invoke(&self, args: ArgVector, kind: OutputKind) -> Result<Output> {
        match kind {
            OutputKind::Structured => self.invoke_structured(args).map(Output::Structured),
            OutputKind::Raw => self.invoke_raw(args).map(Output::Raw),
        }
    }

    fn run(&self, args: &ArgVector) -> Result<CapturedOutput> {
        let captured = self.invoker.execute(args)?;
        if !captured.succeeded() {
            return Err(BindingError::Invocation {
                exit_code: captured.exit_code,
                stderr: captured.stderr.trim().to_string(),
            });
        }
        Ok(captured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(parts: &[&str]) -> ArgVector {
        parts.iter().copied().collect()
    }

    #[test]
    fn test_structured_appends_format_flag() {
        let transport = Transport::new(RecordingInvoker::new(CapturedOutput::success(
            r#"{"status":"idle"}"#,
        )));
        let value = transport
            .invoke_structured(args(&["monitor", "status"]))
            .unwrap();
        assert_eq!(value, json!({"status": "idle"}));
        assert_eq!(
            transport.invoker().last_args().unwrap().as_slice(),
            ["monitor", "status", "--format", "json"]
        );
    }

    #[test]
    fn test_raw_does_not_append_flag() {
        let transport = Transport::new(RecordingInvoker::new(CapturedOutput::success(
            "  status: idle\n",
        )));
        let text = transport.invoke_raw(args(&["monitor", "status"])).unwrap();
        assert_eq!(text, "  status: idle\n", "raw stdout must be verbatim");
        assert_eq!(
            transport.invoker().last_args().unwrap().as_slice(),
            ["monitor", "status"]
        );
    }

    #[test]
    fn test_nonzero_exit_is_invocation_failure_with_trimmed_stderr() {
        let transport = Transport::new(RecordingInvoker::new(CapturedOutput::failure(
            2,
            "\n  batch not found  \n",
        )));
        let err = transport
            .invoke_structured(args(&["batch", "inspect", "plan", "missing"]))
            .unwrap_err();
        assert!(
            matches!(err, BindingError::Invocation { exit_code: 2, ref stderr } if stderr == "batch not found"),
            "got {:?}",
            err
        );
    }

    #[test]
    fn test_raw_nonzero_exit_is_invocation_failure() {
        let transport =
            Transport::new(RecordingInvoker::new(CapturedOutput::failure(1, "usage error")));
        let err = transport.invoke_raw(args(&["monitor", "bogus"])).unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
    }

    #[test]
    fn test_invalid_json_is_output_parse_failure() {
        let transport = Transport::new(RecordingInvoker::new(CapturedOutput::success(
            r#"{"status": "idle""#,
        )));
        let err = transport
            .invoke_structured(args(&["monitor", "status"]))
            .unwrap_err();
        assert!(matches!(err, BindingError::OutputParse(_)), "got {:?}", err);
        assert_eq!(err.exit_code(), None);
    }

    #[test]
    fn test_text_on_success_is_not_silently_accepted() {
        let transport = Transport::new(RecordingInvoker::new(CapturedOutput::success(
            "nx monitor: request accepted\n",
        )));
        let result = transport.invoke_structured(args(&["monitor", "status"]));
        assert!(matches!(result, Err(BindingError::OutputParse(_))));
    }

    #[test]
    fn test_custom_structured_flag() {
        let transport = Transport::new(RecordingInvoker::new(CapturedOutput::success("[]")))
            .with_structured_flag(vec!["--json".to_string()]);
        transport.invoke_structured(args(&["monitor", "jobs"])).unwrap();
        assert_eq!(
            transport.invoker().last_args().unwrap().as_slice(),
            ["monitor", "jobs", "--json"]
        );
    }

    #[test]
    fn test_golden_text_keeps_key_order_and_numbers() {
        let transport = Transport::new(RecordingInvoker::new(CapturedOutput::success(
            "{ \"zeta\": 1.50, \"alpha\": [3, \"x\"], \"mid\": {\"b\": true, \"a\": null} }\n",
        )));
        let output = transport
            .invoke(args(&["monitor", "status"]), OutputKind::Structured)
            .unwrap();
        assert_eq!(
            output.to_golden_text(),
            r#"{"zeta":1.50,"alpha":[3,"x"],"mid":{"b":true,"a":null}}"#
        );
        assert_eq!(output.kind(), OutputKind::Structured);
    }

    #[test]
    fn test_each_call_launches_exactly_once() {
        let transport = Transport::new(RecordingInvoker::new(CapturedOutput::success("{}")));
        transport.invoke_structured(args(&["monitor", "status"])).unwrap();
        transport.invoke_raw(args(&["monitor", "version"])).unwrap();
        assert_eq!(transport.invoker().launches(), 2);
    }

    #[test]
    fn test_invalid_utf8_in_json_is_output_parse_failure() {
        let transport = Transport::new(RecordingInvoker::new(CapturedOutput::success(
            b"{\"a\":\"\xff\"}".to_vec(),
        )));
        let err = transport
            .invoke_structured(args(&["monitor", "status"]))
            .unwrap_err();
        assert!(matches!(err, BindingError::OutputParse(_)), "got {:?}", err);
    }

    #[test]
    fn test_invalid_utf8_raw_text_is_rejected_not_replaced() {
        let transport = Transport::new(RecordingInvoker::new(CapturedOutput::success(
            b"a\xffb".to_vec(),
        )));
        let err = transport
            .invoke_raw(args(&["batch", "inspect", "artifact", "b-1", "a-1"]))
            .unwrap_err();
        assert!(
            matches!(err, BindingError::OutputParse(ref msg) if msg.contains("UTF-8")),
            "got {:?}",
            err
        );
    }
}
