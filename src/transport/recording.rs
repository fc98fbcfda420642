//! Scripted invoker that never launches a process.
//!
//! Records every argument vector it is asked to run, which makes it the
//! launch counter for "no process was spawned" assertions.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::Result;
use crate::transport::args::ArgVector;
use crate::transport::invoker::{CapturedOutput, Invoker};

/// Invoker returning scripted outputs and recording each call.
#[derive(Debug)]
pub struct RecordingInvoker {
    queued: Mutex<VecDeque<CapturedOutput>>,
    fallback: CapturedOutput,
    calls: Mutex<Vec<ArgVector>>,
}

impl RecordingInvoker {
    /// Every call returns `output`.
    pub fn new(output: CapturedOutput) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: output,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Calls return `outputs` in order, then an empty success.
    pub fn with_sequence(outputs: impl IntoIterator<Item = CapturedOutput>) -> Self {
        Self {
            queued: Mutex::new(outputs.into_iter().collect()),
            fallback: CapturedOutput::success(""),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Number of times a launch was requested.
    pub fn launches(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn calls(&self) -> Vec<ArgVector> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last_args(&self) -> Option<ArgVector> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

impl Invoker for RecordingInvoker {
    fn execute(&self, args: &ArgVector) -> Result<CapturedOutput> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(args.clone());

        let next = self
            .queued
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}
