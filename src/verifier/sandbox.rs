//! Execution sandbox.
//!
//! A call is first probed in a separate worker process that is killed once
//! the budget runs out, so a program that never returns cannot hold up the
//! host. The measured call then runs in-process on a dedicated thread with a
//! large stack. Script values never leave that thread; jobs hand back plain
//! data.

use std::io::Read;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::runtime::{Executable, SandboxConfig, SandboxError, ScriptRuntime};
use crate::script::ast::Module;
use crate::script::{parse, Limits, ScriptError, Value};

/// Everything a worker needs to repeat a call on its own
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProbeRequest {
    /// Program text
    pub source: String,
    /// Function to call
    pub function_name: String,
    /// Raw test arguments
    pub args: Vec<serde_json::Value>,
    /// Wrap top-level array arguments in cursors
    pub linked_list_mode: bool,
    /// Deepest allowed chain of script function calls
    pub max_call_depth: usize,
}

/// What the probe observed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The worker exited within the budget
    Finished,
    /// The worker was killed at the deadline
    TimedOut,
}

/// Outcome of the measured call
#[derive(Debug)]
pub enum Execution {
    /// The function returned
    Completed {
        /// Return value
        output: Value,
        /// Arguments after the call
        args: Vec<Value>,
    },
    /// The call was interrupted
    TimedOut,
    /// The program raised an exception
    Raised(ScriptError),
}

/// Build fresh script arguments from raw test arguments
#[must_use]
pub fn build_arguments(raw: &[serde_json::Value], linked_list_mode: bool) -> Vec<Value> {
    raw.iter()
        .map(|arg| Value::from_argument(arg, linked_list_mode))
        .collect()
}

/// Runs submitted functions under a [`SandboxConfig`]
#[derive(Clone, Debug)]
pub struct Sandbox {
    config: Arc<SandboxConfig>,
}

impl Sandbox {
    /// Create a sandbox
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Repeat the call in a worker process and report whether it outlived
    /// the budget
    ///
    /// # Errors
    /// Returns an error when the worker cannot be started or fed
    pub async fn probe(&self, request: &ProbeRequest) -> Result<ProbeOutcome, SandboxError> {
        let worker = &self.config.worker;
        let payload = serde_json::to_vec(request)?;
        let mut child = Command::new(&worker.program)
            .args(&worker.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                program: worker.program.display().to_string(),
                source,
            })?;
        let stdin = child.stdin.take();

        let run = async {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&payload).await?;
                stdin.shutdown().await?;
            }
            child.wait().await
        };
        let waited = tokio::time::timeout(self.config.timeout(), run).await;
        match waited {
            Ok(status) => {
                let status = status?;
                debug!(%status, "probe worker exited");
                Ok(ProbeOutcome::Finished)
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill probe worker");
                }
                Ok(ProbeOutcome::TimedOut)
            }
        }
    }

    /// Load `module` and call `function_name` with fresh arguments on the
    /// current thread
    ///
    /// With `enforce_timeout` the call is interrupted once the budget has
    /// passed.
    #[must_use]
    pub fn execute(
        &self,
        module: &Module,
        function_name: &str,
        raw_args: &[serde_json::Value],
        linked_list_mode: bool,
        enforce_timeout: bool,
    ) -> Execution {
        let limits = Limits {
            max_call_depth: self.config.max_call_depth,
            deadline: enforce_timeout.then(|| Instant::now() + self.config.timeout()),
        };
        let args = build_arguments(raw_args, linked_list_mode);
        let result = ScriptRuntime::new(limits)
            .load(module, function_name)
            .and_then(|mut function| function.call(&args));
        match result {
            Ok(output) => Execution::Completed { output, args },
            Err(err) if err.is_cancellation() => Execution::TimedOut,
            Err(err) => Execution::Raised(err),
        }
    }

    /// Run `job` on a fresh thread with the configured stack size
    ///
    /// # Errors
    /// Returns an error when the thread cannot start or dies before
    /// reporting
    pub async fn on_call_thread<F, R>(&self, job: F) -> Result<R, SandboxError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        std::thread::Builder::new()
            .name("runcheck-call".to_string())
            .stack_size(self.config.max_stack_bytes)
            .spawn(move || {
                if tx.send(job()).is_err() {
                    warn!("call result receiver dropped");
                }
            })
            .map_err(SandboxError::ThreadSpawn)?;
        rx.await.map_err(|_| SandboxError::CallThreadLost)
    }
}

/// Worker side of [`Sandbox::probe`]: read a request and perform the call
///
/// The outcome is discarded; only the time it takes matters to the parent.
///
/// # Errors
/// Returns an error when the request cannot be read or the call thread dies
pub fn serve_probe<R: Read>(reader: R, max_stack_bytes: usize) -> Result<(), SandboxError> {
    let request: ProbeRequest = serde_json::from_reader(reader)?;
    let handle = std::thread::Builder::new()
        .name("runcheck-probe".to_string())
        .stack_size(max_stack_bytes)
        .spawn(move || run_probe(&request))
        .map_err(SandboxError::ThreadSpawn)?;
    handle.join().map_err(|_| SandboxError::CallThreadLost)
}

fn run_probe(request: &ProbeRequest) {
    let Ok(module) = parse(&request.source) else {
        return;
    };
    let limits = Limits {
        max_call_depth: request.max_call_depth,
        deadline: None,
    };
    let args = build_arguments(&request.args, request.linked_list_mode);
    if let Ok(mut function) = ScriptRuntime::new(limits).load(&module, &request.function_name) {
        let _outcome = function.call(&args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::runtime::WorkerCommand;
    use serde_json::json;

    fn sandbox(timeout_ms: u64) -> Sandbox {
        Sandbox::new(SandboxConfig {
            timeout_ms,
            ..SandboxConfig::default()
        })
    }

    fn request(source: &str) -> ProbeRequest {
        ProbeRequest {
            source: source.to_string(),
            function_name: "f".to_string(),
            args: vec![],
            linked_list_mode: false,
            max_call_depth: 1000,
        }
    }

    #[test]
    fn test_build_arguments() {
        let args = build_arguments(&[json!([1, 2]), json!(3)], true);
        assert!(matches!(args[0], Value::Cursor(_)));
        assert_eq!(args[1], Value::Int(3));
        let args = build_arguments(&[json!([1, 2])], false);
        assert!(matches!(args[0], Value::List(_)));
    }

    #[test]
    fn test_execute_completed_with_mutation() {
        let module = parse("def f(xs):\n    xs.append(4)\n    return len(xs)\n").unwrap();
        let execution = sandbox(3000).execute(&module, "f", &[json!([1, 2, 3])], false, true);
        match execution {
            Execution::Completed { output, args } => {
                assert_eq!(output, Value::Int(4));
                assert_eq!(args[0].repr(), "[1, 2, 3, 4]");
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn test_execute_raised() {
        let module = parse("def f():\n    return 1 // 0\n").unwrap();
        let Execution::Raised(err) = sandbox(3000).execute(&module, "f", &[], false, true) else {
            panic!("expected an exception");
        };
        assert_eq!(err.describe(), "Line 2. ZeroDivisionError: integer division or modulo by zero");
    }

    #[test]
    fn test_execute_interrupted_by_deadline() {
        let module = parse("def f():\n    while True:\n        pass\n").unwrap();
        let execution = sandbox(50).execute(&module, "f", &[], false, true);
        assert!(matches!(execution, Execution::TimedOut));
    }

    #[test]
    fn test_keyboard_interrupt_is_timeout() {
        let module = parse("def f():\n    raise KeyboardInterrupt\n").unwrap();
        let execution = sandbox(3000).execute(&module, "f", &[], false, false);
        assert!(matches!(execution, Execution::TimedOut));
    }

    #[test]
    fn test_on_call_thread_deep_recursion() {
        let sandbox = sandbox(3000);
        let worker = sandbox.clone();
        let output = tokio_test::block_on(sandbox.on_call_thread(move || {
            let module = parse("def f(n):\n    if n == 0:\n        return 0\n    return 1 + f(n - 1)\n")
                .unwrap();
            match worker.execute(&module, "f", &[json!(900)], false, true) {
                Execution::Completed { output, .. } => output.repr(),
                other => format!("{other:?}"),
            }
        }))
        .unwrap();
        assert_eq!(output, "900");
    }

    #[test]
    fn test_on_call_thread_panic_is_reported() {
        let result = tokio_test::block_on(sandbox(3000).on_call_thread(|| -> u8 {
            panic!("boom");
        }));
        assert!(matches!(result, Err(SandboxError::CallThreadLost)));
    }

    #[test]
    fn test_probe_spawn_failure() {
        let sandbox = Sandbox::new(SandboxConfig {
            worker: WorkerCommand::new("/nonexistent/runcheck-worker"),
            ..SandboxConfig::default()
        });
        let result = tokio_test::block_on(sandbox.probe(&request("def f():\n    pass\n")));
        assert!(matches!(result, Err(SandboxError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_kills_slow_worker() {
        let sandbox = Sandbox::new(SandboxConfig {
            timeout_ms: 100,
            worker: WorkerCommand {
                program: "sleep".into(),
                args: vec!["5".to_string()],
            },
            ..SandboxConfig::default()
        });
        let started = Instant::now();
        let outcome = sandbox.probe(&request("")).await;
        assert!(matches!(outcome, Ok(ProbeOutcome::TimedOut)));
        assert!(started.elapsed() < std::time::Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_fast_worker_finishes() {
        let sandbox = Sandbox::new(SandboxConfig {
            worker: WorkerCommand {
                program: "cat".into(),
                args: vec![],
            },
            ..SandboxConfig::default()
        });
        let outcome = sandbox.probe(&request("def f():\n    pass\n")).await;
        assert!(matches!(outcome, Ok(ProbeOutcome::Finished)));
    }

    #[test]
    fn test_serve_probe_runs_request() {
        let payload = serde_json::to_vec(&request("def f():\n    return 1\n")).unwrap();
        assert!(serve_probe(payload.as_slice(), 64 * 1024 * 1024).is_ok());
        let broken = serve_probe(b"not json".as_slice(), 64 * 1024 * 1024);
        assert!(matches!(broken, Err(SandboxError::Encode(_))));
    }
}
