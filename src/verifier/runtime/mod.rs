//! Execution runtime for submitted programs.
//!
//! A loaded submission is reached only through the [`Executable`] trait. The
//! [`SandboxConfig`] carries the limits every execution runs under, including
//! the worker process used to probe for timeouts.

mod script;

pub use script::{ScriptFunction, ScriptRuntime};

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::script::{ScriptError, Value};
use crate::DEFAULT_TIMEOUT_SECONDS;

/// Sandbox infrastructure failures, as opposed to failures of the program
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The probe worker could not be started
    #[error("failed to spawn worker '{program}': {source}")]
    Spawn {
        /// Worker program
        program: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// Talking to the probe worker failed
    #[error("worker i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The probe request could not be encoded or decoded
    #[error("malformed probe request: {0}")]
    Encode(#[from] serde_json::Error),

    /// The execution thread could not be started
    #[error("failed to start execution thread: {0}")]
    ThreadSpawn(std::io::Error),

    /// The execution thread died without reporting
    #[error("execution thread panicked")]
    CallThreadLost,
}

/// Program launched to probe a call for timeouts
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerCommand {
    /// Executable path
    pub program: PathBuf,
    /// Arguments selecting worker mode
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// Flag that puts the `runcheck` binary into worker mode
    pub const PROBE_FLAG: &'static str = "--probe";

    /// Run `program --probe`
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec![Self::PROBE_FLAG.to_string()],
        }
    }

    /// The running executable in worker mode
    #[must_use]
    pub fn current_exe() -> Self {
        let program = std::env::current_exe().unwrap_or_else(|e| {
            warn!(error = %e, "cannot locate current executable, falling back to PATH lookup");
            PathBuf::from(env!("CARGO_PKG_NAME"))
        });
        Self::new(program)
    }
}

/// Configuration for runtime sandboxing
#[derive(Clone, Debug)]
pub struct SandboxConfig {
    /// Wall-clock budget per call in milliseconds
    pub timeout_ms: u64,
    /// Deepest allowed chain of script function calls
    pub max_call_depth: usize,
    /// Stack size of the execution thread in bytes
    pub max_stack_bytes: usize,
    /// Worker used for the timeout probe
    pub worker: WorkerCommand,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_SECONDS * 1000,
            max_call_depth: 1000,
            max_stack_bytes: 256 * 1024 * 1024,
            worker: WorkerCommand::current_exe(),
        }
    }
}

impl SandboxConfig {
    /// Environment variable naming the worker program
    pub const WORKER_ENV: &'static str = "RUNCHECK_WORKER";
    /// Environment variable overriding the budget in milliseconds
    pub const TIMEOUT_ENV: &'static str = "RUNCHECK_TIMEOUT_MS";

    /// Defaults with operator overrides from the environment applied
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(program) = std::env::var_os(Self::WORKER_ENV) {
            config.worker = WorkerCommand::new(program);
        }
        if let Ok(raw) = std::env::var(Self::TIMEOUT_ENV) {
            match raw.trim().parse() {
                Ok(ms) => config.timeout_ms = ms,
                Err(e) => warn!(value = %raw, error = %e, "ignoring invalid {}", Self::TIMEOUT_ENV),
            }
        }
        config
    }

    /// Budget as a duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A loaded function that can be called with script values
pub trait Executable {
    /// Call the function
    ///
    /// # Errors
    /// Returns the exception the call raised
    fn call(&mut self, args: &[Value]) -> Result<Value, ScriptError>;

    /// Name of the loaded function
    fn name(&self) -> &str;
}
