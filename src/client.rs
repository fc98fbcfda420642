//! Entry point for calling `nx` through the binding.

use std::path::PathBuf;

use crate::command::batch::{Batch, BatchInspect};
use crate::command::monitor::Monitor;
use crate::command::{self, CommandArgs, CommandSpec};
use crate::config::BindingConfig;
use crate::error::{Result, ValidationError};
use crate::transport::{Invoker, Output, SubprocessInvoker, Transport};

/// Typed and dynamic access to every mirrored `nx` command.
///
/// ```no_run
/// use nx_bind::{Client, MonitorFormat};
///
/// let client = Client::resolve()?;
/// let status = client.monitor().status(MonitorFormat::Json)?;
/// println!("{}", status.to_golden_text());
/// # Ok::<(), nx_bind::BindingError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Client<I = SubprocessInvoker> {
    transport: Transport<I>,
}

impl Default for Client<SubprocessInvoker> {
    fn default() -> Self {
        Self::with_transport(Transport::default())
    }
}

impl Client<SubprocessInvoker> {
    /// Client launching `program` (a bare name or a path).
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self::with_transport(Transport::new(SubprocessInvoker::new(program)))
    }

    /// Client launching the `nx-cli` found by the anchored resolver.
    pub fn resolve() -> Result<Self> {
        let program = crate::resolver::Resolver::from_anchor().resolve()?;
        Ok(Self::with_program(program))
    }

    pub fn from_config(config: &BindingConfig) -> Result<Self> {
        Ok(Self::with_transport(config.transport()?))
    }
}

impl<I: Invoker> Client<I> {
    pub fn new(invoker: I) -> Self {
        Self::with_transport(Transport::new(invoker))
    }

    pub fn with_transport(transport: Transport<I>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Transport<I> {
        &self.transport
    }

    pub fn monitor(&self) -> Monitor<'_, I> {
        Monitor::new(&self.transport)
    }

    pub fn batch(&self) -> Batch<'_, I> {
        Batch::new(&self.transport)
    }

    pub fn batch_inspect(&self) -> BatchInspect<'_, I> {
        BatchInspect::new(&self.transport)
    }

    /// Call any registered command by path, e.g. `"batch inspect jobs"`.
    pub fn call(&self, name: &str, args: &CommandArgs) -> Result<Output> {
        self.spec(name)?.call(&self.transport, args)
    }

    fn spec(&self, name: &str) -> Result<&'static CommandSpec> {
        command::find(name).ok_or_else(|| ValidationError::UnknownCommand(name.to_string()).into())
    }
}
