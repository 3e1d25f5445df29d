//! Outcome oracle: compares what a call produced with what the test expects.

use crate::script::Value;
use crate::types::{Diagnostics, TestCase, TestResult};

use super::sandbox::{build_arguments, Execution};
use super::spec_check::ResolvedSpec;

/// A test's expectations as script values
#[derive(Debug, Default)]
pub struct Expectation {
    /// Expected return value, `None` when unchecked
    pub output: Option<Value>,
    /// Expected argument values after the call; `None` entries are unchecked
    pub output_args: Option<Vec<Option<Value>>>,
}

impl Expectation {
    /// Convert a test's expected values
    ///
    /// Output arguments go through the same linked-list transform as the
    /// inputs, so cursors are compared with cursors.
    #[must_use]
    pub fn from_test(test: &TestCase, linked_list_mode: bool) -> Self {
        Self {
            output: test.expected_output().map(Value::from_json),
            output_args: test.output_args.as_ref().map(|args| {
                args.iter()
                    .map(|arg| (!arg.is_null()).then(|| Value::from_argument(arg, linked_list_mode)))
                    .collect()
            }),
        }
    }
}

/// Context reported alongside a verdict
#[must_use]
pub fn diagnostics(spec: &ResolvedSpec, test: &TestCase, linked_list_mode: bool) -> Diagnostics {
    Diagnostics {
        function_name: spec.function_name.clone(),
        arg_names: spec.arg_names.clone(),
        input_args: reprs(&build_arguments(&test.input_args, linked_list_mode)),
        expected_output: test
            .expected_output()
            .map_or_else(|| Value::None.repr(), |value| Value::from_json(value).repr()),
        expected_output_args: test
            .output_args
            .as_ref()
            .map(|args| reprs(&build_arguments(args, linked_list_mode))),
    }
}

/// Classify the outcome of a measured call
#[must_use]
pub fn judge_execution(
    execution: Execution,
    expectation: &Expectation,
    diagnostics: Diagnostics,
) -> TestResult {
    match execution {
        Execution::Completed { output, args } => judge(expectation, &output, &args, diagnostics),
        Execution::TimedOut => TestResult::Timeout { diagnostics },
        Execution::Raised(err) => TestResult::RuntimeError {
            error: err.describe(),
            diagnostics,
        },
    }
}

/// Compare a finished call against the expectation
///
/// The return value is checked first, then each specified output argument in
/// order.
#[must_use]
pub fn judge(
    expectation: &Expectation,
    output: &Value,
    args: &[Value],
    diagnostics: Diagnostics,
) -> TestResult {
    let output_matches = satisfies(expectation.output.as_ref(), output);
    let args_match = match &expectation.output_args {
        Some(expected) => expected
            .iter()
            .zip(args)
            .all(|(expected, actual)| satisfies(expected.as_ref(), actual)),
        None => true,
    };

    if output_matches && args_match {
        TestResult::Success
    } else {
        TestResult::Fail {
            diagnostics,
            output: output.repr(),
            output_args: reprs(args),
        }
    }
}

fn satisfies(expected: Option<&Value>, actual: &Value) -> bool {
    !matches!(expected, Some(expected) if expected != actual)
}

fn reprs(values: &[Value]) -> Vec<String> {
    values.iter().map(Value::repr).collect()
}
