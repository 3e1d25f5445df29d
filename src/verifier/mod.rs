//! Verifier implementation.
//!
//! Each test case of a submission goes through the same pipeline:
//!
//! 1. parse the source ([`crate::script::parse`]), a failure is a syntax error;
//! 2. resolve the target function and check its arity ([`check_specification`]);
//! 3. probe the call in a killable worker process when timeouts are enforced;
//! 4. run the measured call on a dedicated thread and judge the outcome
//!    ([`oracle`]).
//!
//! Tests run sequentially and independently; one test's failure never affects
//! another's verdict.

pub mod oracle;
pub mod runtime;
mod sandbox;
mod spec_check;

pub use runtime::{Executable, SandboxConfig, SandboxError, ScriptFunction, ScriptRuntime, WorkerCommand};
pub use sandbox::{build_arguments, serve_probe, Execution, ProbeOutcome, ProbeRequest, Sandbox};
pub use spec_check::{check_specification, ResolvedSpec, SpecificationError};

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::script::ast::Module;
use crate::script::{parse, ParseError};
use crate::types::{Diagnostics, Submission, SubmissionError, TestCase, TestResult};
use oracle::Expectation;

/// Verifier configuration
#[derive(Clone, Debug, Default)]
pub struct VerifierConfig {
    /// Limits and worker for every execution
    pub sandbox: SandboxConfig,
}

impl VerifierConfig {
    /// Defaults with operator overrides from the environment applied
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            sandbox: SandboxConfig::from_env(),
        }
    }
}

/// Runs submissions against their test cases
#[derive(Clone, Debug)]
pub struct Verifier {
    sandbox: Sandbox,
}

impl Verifier {
    /// Create a verifier
    #[must_use]
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            sandbox: Sandbox::new(config.sandbox),
        }
    }

    /// Active sandbox configuration
    #[must_use]
    pub fn sandbox_config(&self) -> &SandboxConfig {
        self.sandbox.config()
    }

    /// Run every test of `submission`, returning one verdict per test in order
    ///
    /// # Errors
    /// Returns an error when the submission as a whole is malformed; no test
    /// runs in that case
    pub async fn run_tests(&self, submission: &Submission) -> Result<Vec<TestResult>, SubmissionError> {
        submission.validate()?;

        let parsed = self.parse_source(&submission.source).await;
        if let Err(e) = &parsed {
            debug!(line = e.line, message = %e, "source does not parse");
        }

        let mut results = Vec::with_capacity(submission.tests.len());
        for (index, test) in submission.tests.iter().enumerate() {
            let result = match &parsed {
                Ok(module) => self.run_one(submission, module, test).await,
                Err(e) => TestResult::SyntaxError { error: e.describe() },
            };
            debug!(index, verdict = result.kind(), "test finished");
            results.push(result);
        }

        info!(tests = results.len(), summary = %VerifierStats::from_results(&results), "submission verified");
        Ok(results)
    }

    /// Parse on the call thread, whose stack bounds how deeply nested a
    /// program may be
    async fn parse_source(&self, source: &str) -> Result<Arc<Module>, ParseError> {
        let text = source.to_string();
        match self.sandbox.on_call_thread(move || parse(&text).map(Arc::new)).await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "parse thread unavailable, parsing inline");
                parse(source).map(Arc::new)
            }
        }
    }

    async fn run_one(&self, submission: &Submission, module: &Arc<Module>, test: &TestCase) -> TestResult {
        let requested = test
            .function_name
            .as_deref()
            .or(submission.function_name.as_deref());
        let spec = match check_specification(
            module,
            test.input_args.len(),
            requested,
            submission.restricted_mode,
        ) {
            Ok(spec) => spec,
            Err(e) => {
                debug!(error = %e, "specification check failed");
                return TestResult::SpecificationError { error: e.describe() };
            }
        };
        let linked = submission.linked_list_mode;
        let diagnostics = oracle::diagnostics(&spec, test, linked);

        if submission.enforce_timeout {
            let request = ProbeRequest {
                source: submission.source.clone(),
                function_name: spec.function_name.clone(),
                args: test.input_args.clone(),
                linked_list_mode: linked,
                max_call_depth: self.sandbox.config().max_call_depth,
            };
            match self.sandbox.probe(&request).await {
                Ok(ProbeOutcome::TimedOut) => {
                    debug!(function = %spec.function_name, "probe exceeded the time budget");
                    return TestResult::Timeout { diagnostics };
                }
                Ok(ProbeOutcome::Finished) => {}
                Err(e) => warn!(error = %e, "timeout probe unavailable, running the call unprobed"),
            }
        }

        self.measured_call(submission, module, test, &spec, diagnostics).await
    }

    async fn measured_call(
        &self,
        submission: &Submission,
        module: &Arc<Module>,
        test: &TestCase,
        spec: &ResolvedSpec,
        diagnostics: Diagnostics,
    ) -> TestResult {
        let sandbox = self.sandbox.clone();
        let module = Arc::clone(module);
        let function_name = spec.function_name.clone();
        let test = test.clone();
        let linked = submission.linked_list_mode;
        let enforce_timeout = submission.enforce_timeout;
        let thread_diagnostics = diagnostics.clone();

        let outcome = self
            .sandbox
            .on_call_thread(move || {
                let execution =
                    sandbox.execute(&module, &function_name, &test.input_args, linked, enforce_timeout);
                let expectation = Expectation::from_test(&test, linked);
                oracle::judge_execution(execution, &expectation, thread_diagnostics)
            })
            .await;

        outcome.unwrap_or_else(|e| {
            error!(error = %e, function = %spec.function_name, "execution thread failed");
            TestResult::RuntimeError {
                error: format!("Line 0. InternalError: {e}"),
                diagnostics,
            }
        })
    }
}

/// Verdict counts for a batch of results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VerifierStats {
    /// Parse failures
    pub syntax_errors: usize,
    /// Missing or mismatched target functions
    pub specification_errors: usize,
    /// Uncaught exceptions
    pub runtime_errors: usize,
    /// Calls that exceeded the budget
    pub timeouts: usize,
    /// Wrong results
    pub failures: usize,
    /// Passing tests
    pub successes: usize,
}

impl VerifierStats {
    /// Tally `results` by verdict
    #[must_use]
    pub fn from_results(results: &[TestResult]) -> Self {
        let mut stats = Self::default();
        for result in results {
            let counter = match result {
                TestResult::SyntaxError { .. } => &mut stats.syntax_errors,
                TestResult::SpecificationError { .. } => &mut stats.specification_errors,
                TestResult::RuntimeError { .. } => &mut stats.runtime_errors,
                TestResult::Timeout { .. } => &mut stats.timeouts,
                TestResult::Fail { .. } => &mut stats.failures,
                TestResult::Success => &mut stats.successes,
            };
            *counter += 1;
        }
        stats
    }

    /// Number of results tallied
    #[must_use]
    pub const fn total(&self) -> usize {
        self.syntax_errors
            + self.specification_errors
            + self.runtime_errors
            + self.timeouts
            + self.failures
            + self.successes
    }
}

impl fmt::Display for VerifierStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "success={} fail={} timeout={} runtime_error={} specification_error={} syntax_error={}",
            self.successes,
            self.failures,
            self.timeouts,
            self.runtime_errors,
            self.specification_errors,
            self.syntax_errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn verifier() -> Verifier {
        Verifier::new(VerifierConfig::default())
    }

    fn run(submission: &Submission) -> Vec<TestResult> {
        tokio_test::block_on(verifier().run_tests(submission)).unwrap()
    }

    #[test]
    fn test_success_and_fail() {
        let submission = Submission::new(
            "def add(a, b):\n    return a + b\n",
            vec![
                TestCase::new(vec![json!(1), json!(2)]).returns(json!(3)),
                TestCase::new(vec![json!(1), json!(2)]).returns(json!(4)),
            ],
        )
        .enforce_timeout(false);
        let results = run(&submission);
        assert_eq!(results[0], TestResult::Success);
        let TestResult::Fail { diagnostics, output, .. } = &results[1] else {
            panic!("expected a failure, got {:?}", results[1]);
        };
        assert_eq!(output, "3");
        assert_eq!(diagnostics.arg_names, vec!["a", "b"]);
        assert_eq!(diagnostics.function_name, "add");
    }

    #[test]
    fn test_syntax_error_for_every_test() {
        let submission = Submission::new(
            "def f(:\n    pass\n",
            vec![TestCase::new(vec![]), TestCase::new(vec![json!(1)])],
        );
        let results = run(&submission);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.kind() == "syntax_error"));
        assert!(results[0].error().unwrap().starts_with("Line 1. SyntaxError: "));
    }

    #[test]
    fn test_invalid_submission_is_rejected() {
        let submission = Submission::new(
            "def f(a):\n    pass\n",
            vec![TestCase::new(vec![json!(1)]).mutates(vec![])],
        );
        let err = tokio_test::block_on(verifier().run_tests(&submission)).unwrap_err();
        assert!(matches!(err, SubmissionError::OutputArgsLength { index: 0, .. }));
    }

    #[test]
    fn test_per_test_function_override() {
        let submission = Submission::new(
            "def double(x):\n    return 2 * x\n\ndef square(x):\n    return x * x\n",
            vec![
                TestCase::new(vec![json!(3)]).returns(json!(6)),
                TestCase::new(vec![json!(3)]).returns(json!(9)).calling("square"),
            ],
        )
        .enforce_timeout(false);
        assert_eq!(run(&submission), vec![TestResult::Success, TestResult::Success]);
    }

    #[test]
    fn test_specification_error() {
        let submission = Submission::new("def f(a):\n    pass\n", vec![TestCase::new(vec![])]);
        let results = run(&submission);
        assert_eq!(
            results,
            vec![TestResult::SpecificationError {
                error: "Line 1. Function 'f' accepts 0 arguments, but was given 1".to_string()
            }]
        );
    }

    #[test]
    fn test_deadline_without_worker() {
        let verifier = Verifier::new(VerifierConfig {
            sandbox: SandboxConfig {
                timeout_ms: 100,
                worker: WorkerCommand::new("/nonexistent/runcheck-worker"),
                ..SandboxConfig::default()
            },
        });
        let submission = Submission::new(
            "def spin():\n    while True:\n        pass\n",
            vec![TestCase::new(vec![])],
        );
        let results = tokio_test::block_on(verifier.run_tests(&submission)).unwrap();
        assert_eq!(results[0].kind(), "timeout");
    }

    #[test]
    fn test_stats() {
        let results = vec![
            TestResult::Success,
            TestResult::Success,
            TestResult::SyntaxError {
                error: String::new(),
            },
        ];
        let stats = VerifierStats::from_results(&results);
        assert_eq!(stats.successes, 2);
        assert_eq!(stats.syntax_errors, 1);
        assert_eq!(stats.total(), 3);
        assert!(stats.to_string().starts_with("success=2 fail=0"));
    }
}
