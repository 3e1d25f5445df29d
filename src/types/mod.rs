//! Core data types for submissions and verdicts.

mod result;
mod submission;

pub use result::{Diagnostics, TestResult};
pub use submission::{Submission, SubmissionError, TestCase};
