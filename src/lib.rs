//! # runcheck
//!
//! Automated verification of submitted programs against behavioural test
//! cases.
//!
//! ## Architecture
//!
//! A submission is a program plus an ordered list of test cases. Every test
//! case passes through the same pipeline:
//! - **Specification Validator**: the program must parse and define the
//!   target function with the right number of parameters
//! - **Execution Sandbox**: the call is probed for timeouts in a killable
//!   worker process, then run in-process against fresh arguments
//! - **Outcome Oracle**: the return value and argument mutations are compared
//!   with the expected ones
//!
//! Each test yields exactly one [`TestResult`]: `syntax_error`,
//! `specification_error`, `runtime_error`, `timeout`, `fail` or `success`.
//!
//! Submissions are written in a small indentation-structured scripting
//! language ([`script`]). In linked-list mode, list arguments are handed to
//! the program as [`Cursor`] values.

#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rust_2018_idioms
)]
#![warn(missing_docs)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

pub mod cursor;
pub mod script;
pub mod types;
pub mod verifier;

pub use cursor::{Cursor, CursorError};
pub use types::{Diagnostics, Submission, SubmissionError, TestCase, TestResult};
pub use verifier::{SandboxConfig, Verifier, VerifierConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wall-clock budget for one call, in seconds
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 3;

/// Function every restricted-mode submission must define
pub const RESTRICTED_ENTRY_POINT: &str = "when_run";
