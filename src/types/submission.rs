//! Submissions and their test cases.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A program submitted for verification together with its tests
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Program text
    pub source: String,
    /// Test cases, run in order
    #[serde(default)]
    pub tests: Vec<TestCase>,
    /// Target function; the first top-level `def` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// Wrap top-level array arguments in cursors
    #[serde(default)]
    pub linked_list_mode: bool,
    /// Disallow imports and require the `when_run` entry point
    #[serde(default)]
    pub restricted_mode: bool,
    /// Bound every call by the wall-clock budget
    #[serde(default = "default_true")]
    pub enforce_timeout: bool,
}

const fn default_true() -> bool {
    true
}

impl Submission {
    /// Submission with default flags
    #[must_use]
    pub fn new(source: impl Into<String>, tests: Vec<TestCase>) -> Self {
        Self {
            source: source.into(),
            tests,
            function_name: None,
            linked_list_mode: false,
            restricted_mode: false,
            enforce_timeout: true,
        }
    }

    /// Select the target function by name
    #[must_use]
    pub fn with_function(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    /// Toggle linked-list mode
    #[must_use]
    pub const fn linked_list(mut self, enabled: bool) -> Self {
        self.linked_list_mode = enabled;
        self
    }

    /// Toggle restricted mode
    #[must_use]
    pub const fn restricted(mut self, enabled: bool) -> Self {
        self.restricted_mode = enabled;
        self
    }

    /// Toggle the wall-clock budget
    #[must_use]
    pub const fn enforce_timeout(mut self, enabled: bool) -> Self {
        self.enforce_timeout = enabled;
        self
    }

    /// Check the preconditions that apply to the submission as a whole
    ///
    /// # Errors
    /// Returns the first test whose `output_args` length differs from its
    /// `input_args` length
    pub fn validate(&self) -> Result<(), SubmissionError> {
        for (index, test) in self.tests.iter().enumerate() {
            if let Some(outputs) = &test.output_args {
                if outputs.len() != test.input_args.len() {
                    return Err(SubmissionError::OutputArgsLength {
                        index,
                        inputs: test.input_args.len(),
                        outputs: outputs.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// One call of the target function and what it should produce
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Arguments, in parameter order
    #[serde(default)]
    pub input_args: Vec<serde_json::Value>,
    /// Expected argument values after the call; `null` entries are unchecked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_args: Option<Vec<serde_json::Value>>,
    /// Expected return value; `null` or absent is unchecked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Per-test override of the target function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
}

impl TestCase {
    /// Test calling the target with `input_args`, checking nothing
    #[must_use]
    pub fn new(input_args: Vec<serde_json::Value>) -> Self {
        Self {
            input_args,
            ..Self::default()
        }
    }

    /// Expect this return value
    #[must_use]
    pub fn returns(mut self, output: serde_json::Value) -> Self {
        self.output = Some(output);
        self
    }

    /// Expect these argument values after the call
    #[must_use]
    pub fn mutates(mut self, output_args: Vec<serde_json::Value>) -> Self {
        self.output_args = Some(output_args);
        self
    }

    /// Call this function instead of the submission's target
    #[must_use]
    pub fn calling(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    /// Expected return value, with JSON `null` treated as unchecked
    #[must_use]
    pub fn expected_output(&self) -> Option<&serde_json::Value> {
        self.output.as_ref().filter(|value| !value.is_null())
    }
}

/// A submission that cannot be run at all
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SubmissionError {
    /// `output_args` and `input_args` differ in length
    #[error("test {index}: output_args has {outputs} entries but input_args has {inputs}")]
    OutputArgsLength {
        /// Position of the offending test
        index: usize,
        /// Number of input arguments
        inputs: usize,
        /// Number of expected output arguments
        outputs: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_from_json() {
        let submission: Submission =
            serde_json::from_str(r#"{"source": "def f(): pass", "tests": [{"input_args": []}]}"#)
                .unwrap();
        assert!(submission.enforce_timeout);
        assert!(!submission.linked_list_mode);
        assert!(!submission.restricted_mode);
        assert!(submission.function_name.is_none());
        assert_eq!(submission.tests, vec![TestCase::new(vec![])]);
    }

    #[test]
    fn test_missing_tests_is_empty() {
        let submission: Submission = serde_json::from_str(r#"{"source": ""}"#).unwrap();
        assert!(submission.tests.is_empty());
        assert!(submission.validate().is_ok());
    }

    #[test]
    fn test_validate_output_args_length() {
        let submission = Submission::new(
            "def f(a, b): pass",
            vec![
                TestCase::new(vec![json!(1), json!(2)]).mutates(vec![json!(null), json!(2)]),
                TestCase::new(vec![json!(1), json!(2)]).mutates(vec![json!(1)]),
            ],
        );
        assert_eq!(
            submission.validate(),
            Err(SubmissionError::OutputArgsLength {
                index: 1,
                inputs: 2,
                outputs: 1
            })
        );
    }

    #[test]
    fn test_null_output_is_unchecked() {
        let test: TestCase =
            serde_json::from_value(json!({"input_args": [1], "output": null})).unwrap();
        assert!(test.expected_output().is_none());
        assert_eq!(
            TestCase::new(vec![]).returns(json!(0)).expected_output(),
            Some(&json!(0))
        );
    }

    #[test]
    fn test_builder_flags() {
        let submission = Submission::new("", vec![])
            .with_function("main")
            .linked_list(true)
            .restricted(true)
            .enforce_timeout(false);
        assert_eq!(submission.function_name.as_deref(), Some("main"));
        assert!(submission.linked_list_mode);
        assert!(submission.restricted_mode);
        assert!(!submission.enforce_timeout);
    }
}
