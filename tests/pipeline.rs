//! End-to-end verification of submissions through the public API, using the
//! real `runcheck --probe` worker.

use std::time::{Duration, Instant};

use serde_json::json;

use runcheck::verifier::WorkerCommand;
use runcheck::{SandboxConfig, Submission, TestCase, TestResult, Verifier, VerifierConfig};

fn verifier_with_timeout(timeout_ms: u64) -> Verifier {
    Verifier::new(VerifierConfig {
        sandbox: SandboxConfig {
            timeout_ms,
            worker: WorkerCommand::new(env!("CARGO_BIN_EXE_runcheck")),
            ..SandboxConfig::default()
        },
    })
}

fn run(submission: &Submission) -> Vec<TestResult> {
    tokio_test::block_on(verifier_with_timeout(3000).run_tests(submission)).unwrap()
}

fn kinds(results: &[TestResult]) -> Vec<&'static str> {
    results.iter().map(TestResult::kind).collect()
}

#[test]
fn test_increment_scenario() {
    let submission = Submission::new(
        "def f(x):\n    return x + 1\n",
        vec![
            TestCase::new(vec![json!(1)]).returns(json!(2)),
            TestCase::new(vec![json!(1)]).returns(json!(3)),
        ],
    );
    let results = run(&submission);
    assert_eq!(kinds(&results), vec!["success", "fail"]);
    assert_eq!(
        serde_json::to_value(&results[1]).unwrap(),
        json!({
            "type": "fail",
            "function_name": "f",
            "arg_names": ["x"],
            "input_args": ["1"],
            "expected_output": "3",
            "output": "2",
            "output_args": ["1"],
        })
    );
}

#[test]
fn test_trailing_syntax_error() {
    let submission = Submission::new(
        "def f(x):\n    return x + 1\n\nx = (1,\n",
        vec![TestCase::new(vec![json!(1)]), TestCase::new(vec![json!(2)])],
    );
    let results = run(&submission);
    assert_eq!(kinds(&results), vec!["syntax_error", "syntax_error"]);
    assert!(results[0].error().unwrap().starts_with("Line 4. SyntaxError: "));
}

#[test]
fn test_undefined_name_is_runtime_error() {
    let submission = Submission::new(
        "def f(x):\n    y = x * 2\n    return undefined_helper(y)\n",
        vec![TestCase::new(vec![json!(1)])],
    );
    let results = run(&submission);
    assert_eq!(
        results[0].error(),
        Some("Line 3. NameError: name 'undefined_helper' is not defined")
    );
    let diagnostics = results[0].diagnostics().unwrap();
    assert_eq!(diagnostics.expected_output, "None");
}

#[test]
fn test_module_level_error_is_runtime_error() {
    let submission = Submission::new(
        "def f():\n    return 1\n\nfoo()\n",
        vec![TestCase::new(vec![])],
    );
    let results = run(&submission);
    assert_eq!(
        results[0].error(),
        Some("Line 4. NameError: name 'foo' is not defined")
    );
}

#[test]
fn test_infinite_loop_times_out_within_budget() {
    let submission = Submission::new(
        "def f(x):\n    while True:\n        x += 1\n",
        vec![TestCase::new(vec![json!(0)]), TestCase::new(vec![json!(1)])],
    );
    let started = Instant::now();
    let results = tokio_test::block_on(verifier_with_timeout(500).run_tests(&submission)).unwrap();
    assert_eq!(kinds(&results), vec!["timeout", "timeout"]);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(results[0].diagnostics().unwrap().arg_names, vec!["x"]);
}

#[test]
fn test_module_level_infinite_loop_times_out() {
    let submission = Submission::new(
        "def f(x):\n    return x\n\nwhile True:\n    pass\n",
        vec![TestCase::new(vec![json!(1)]).returns(json!(1))],
    );
    let started = Instant::now();
    let results = tokio_test::block_on(verifier_with_timeout(500).run_tests(&submission)).unwrap();
    assert_eq!(kinds(&results), vec!["timeout"]);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(results[0].diagnostics().unwrap().function_name, "f");
}

#[test]
fn test_deeply_nested_source_is_a_syntax_error() {
    let depth = 100_000;
    let parens = Submission::new(
        format!("def f():\n    return {}1{}\n", "(".repeat(depth), ")".repeat(depth)),
        vec![TestCase::new(vec![]), TestCase::new(vec![])],
    );
    let results = run(&parens);
    assert_eq!(kinds(&results), vec!["syntax_error", "syntax_error"]);
    assert_eq!(
        results[0].error(),
        Some("Line 2. SyntaxError: too many nested parentheses")
    );

    let negations = Submission::new(
        format!("def f():\n    return {}1\n", "-".repeat(depth)),
        vec![TestCase::new(vec![])],
    );
    assert_eq!(
        run(&negations)[0].error(),
        Some("Line 2. SyntaxError: too many nested expressions")
    );
}

#[test]
fn test_cyclic_list_comparison_is_a_runtime_error() {
    let source = "\
def same(flag):
    a = []
    a.append(a)
    b = []
    b.append(b)
    if flag:
        return a == b
    return a < b
";
    let submission = Submission::new(
        source,
        vec![
            TestCase::new(vec![json!(true)]),
            TestCase::new(vec![json!(false)]),
            TestCase::new(vec![json!(1), json!(2)]),
        ],
    );
    let results = run(&submission);
    assert_eq!(
        kinds(&results),
        vec!["runtime_error", "runtime_error", "specification_error"]
    );
    assert_eq!(
        results[0].error(),
        Some("Line 7. RecursionError: maximum recursion depth exceeded in comparison")
    );
    assert_eq!(
        results[1].error(),
        Some("Line 8. RecursionError: maximum recursion depth exceeded in comparison")
    );
}

#[test]
fn test_unenforced_timeout_runs_to_completion() {
    let submission = Submission::new(
        "def f(n):\n    total = 0\n    for i in range(n):\n        total += i\n    return total\n",
        vec![TestCase::new(vec![json!(100_000)]).returns(json!(4_999_950_000_i64))],
    )
    .enforce_timeout(false);
    assert_eq!(run(&submission), vec![TestResult::Success]);
}

#[test]
fn test_two_functions_resolve_to_first() {
    let submission = Submission::new(
        "def first(a, b):\n    return a * b\n\ndef second(a):\n    return a\n",
        vec![TestCase::new(vec![json!(3), json!(4)]).returns(json!(12))],
    );
    assert_eq!(run(&submission), vec![TestResult::Success]);
}

#[test]
fn test_empty_test_list() {
    let submission = Submission::new("def f():\n    pass\n", vec![]);
    assert!(run(&submission).is_empty());
}

#[test]
fn test_results_follow_test_order() {
    let submission = Submission::new(
        "def f(x):\n    return 10 // x\n",
        vec![
            TestCase::new(vec![json!(2)]).returns(json!(5)),
            TestCase::new(vec![json!(0)]),
            TestCase::new(vec![json!(5)]).returns(json!(3)),
            TestCase::new(vec![]),
            TestCase::new(vec![json!(1)]).returns(json!(10)),
        ],
    );
    let results = run(&submission);
    assert_eq!(
        kinds(&results),
        vec!["success", "runtime_error", "fail", "specification_error", "success"]
    );
    assert_eq!(
        results[1].error(),
        Some("Line 2. ZeroDivisionError: integer division or modulo by zero")
    );
}

#[test]
fn test_mutation_checks() {
    let source = "def bump(xs, n):\n    for i in range(len(xs)):\n        xs[i] += n\n";
    let submission = Submission::new(
        source,
        vec![
            TestCase::new(vec![json!([1, 2]), json!(1)]).mutates(vec![json!([2, 3]), json!(null)]),
            TestCase::new(vec![json!([1, 2]), json!(1)]).mutates(vec![json!([1, 2]), json!(null)]),
        ],
    );
    let results = run(&submission);
    assert_eq!(results[0], TestResult::Success);
    let TestResult::Fail {
        diagnostics,
        output,
        output_args,
    } = &results[1]
    else {
        panic!("expected a failure, got {:?}", results[1]);
    };
    assert_eq!(output, "None");
    assert_eq!(output_args, &vec!["[2, 3]".to_string(), "1".to_string()]);
    assert_eq!(diagnostics.input_args, vec!["[1, 2]", "1"]);
    assert_eq!(
        diagnostics.expected_output_args,
        Some(vec!["[1, 2]".to_string(), "None".to_string()])
    );
}

#[test]
fn test_deep_recursion() {
    let source = "def depth(n):\n    if n == 0:\n        return 0\n    return 1 + depth(n - 1)\n";
    let submission = Submission::new(
        source,
        vec![
            TestCase::new(vec![json!(500)]).returns(json!(500)),
            TestCase::new(vec![json!(5000)]),
        ],
    );
    let results = run(&submission);
    assert_eq!(results[0], TestResult::Success);
    let error = results[1].error().unwrap();
    assert!(error.ends_with("RecursionError: maximum recursion depth exceeded"), "{error}");
}

#[test]
fn test_linked_list_mode() {
    let source = "\
def zero_negatives(node):
    while True:
        if node.get_value() < 0:
            node.set_value(0)
        if not node.has_next():
            break
        node.go_next()
";
    let submission = Submission::new(
        source,
        vec![
            TestCase::new(vec![json!([3, -1, 4, -5])]).mutates(vec![json!([3, 0, 4, 0])]),
            TestCase::new(vec![json!([-2])]).mutates(vec![json!([-2])]),
        ],
    )
    .linked_list(true);
    let results = run(&submission);
    assert_eq!(results[0], TestResult::Success);
    assert_eq!(kinds(&results), vec!["success", "fail"]);
}

#[test]
fn test_linked_list_errors_carry_call_line() {
    let submission = Submission::new(
        "def f(node):\n    node.go_next()\n    node.set_value(100)\n",
        vec![
            TestCase::new(vec![json!([1])]),
            TestCase::new(vec![json!([1, 2])]),
        ],
    )
    .linked_list(true);
    let results = run(&submission);
    assert_eq!(kinds(&results), vec!["runtime_error", "runtime_error"]);
    assert!(results[0].error().unwrap().starts_with("Line 2. CursorError: "));
    assert!(results[1].error().unwrap().starts_with("Line 3. CursorError: "));
}

#[test]
fn test_restricted_mode() {
    let tests = vec![TestCase::new(vec![json!(2)]).returns(json!(4))];
    let ok = Submission::new("def when_run(n):\n    return n * 2\n", tests.clone()).restricted(true);
    assert_eq!(run(&ok), vec![TestResult::Success]);

    let nested_import = Submission::new(
        "def when_run(n):\n    if n:\n        import math\n    return n * 2\n",
        tests.clone(),
    )
    .restricted(true);
    assert_eq!(
        run(&nested_import),
        vec![TestResult::SpecificationError {
            error: "Line 3. 'import' statement not allowed".to_string()
        }]
    );

    let wrong_name = Submission::new("def solve(n):\n    return n * 2\n", tests)
        .restricted(true)
        .with_function("solve");
    assert_eq!(
        run(&wrong_name),
        vec![TestResult::SpecificationError {
            error: "Line 0. Function 'when_run' not found".to_string()
        }]
    );
}

#[test]
fn test_unknown_import_outside_restricted_mode() {
    let submission = Submission::new(
        "import os\ndef f():\n    return 1\n",
        vec![TestCase::new(vec![])],
    );
    let results = run(&submission);
    assert_eq!(results[0].error(), Some("Line 1. ImportError: No module named 'os'"));
}

#[test]
fn test_math_import() {
    let submission = Submission::new(
        "import math\n\ndef hyp(a, b):\n    return math.sqrt(a * a + b * b)\n",
        vec![TestCase::new(vec![json!(3), json!(4)]).returns(json!(5))],
    );
    assert_eq!(run(&submission), vec![TestResult::Success]);
}

#[test]
fn test_submission_json_interface() {
    let submission: Submission = serde_json::from_value(json!({
        "source": "def greet(name):\n    return 'hi ' + name\n",
        "tests": [
            {"input_args": ["bob"], "output": "hi bob"},
            {"input_args": ["amy"], "output": null},
            {"input_args": ["x", "y"]},
        ],
        "enforce_timeout": false,
    }))
    .unwrap();
    let results = run(&submission);
    assert_eq!(kinds(&results), vec!["success", "success", "specification_error"]);
    assert_eq!(
        serde_json::to_value(&results[2]).unwrap(),
        json!({
            "type": "specification_error",
            "error": "Line 1. Function 'greet' accepts 2 arguments, but was given 1",
        })
    );
}
