/*!
Unit testing library for the Gallery engine.

Tests are written as small statement scripts (see `gallery::script`)
    together with the expected result of running them.
There are five kinds of test:

- **Show tests**: the script runs without errors or warnings
    and the output of its `show` statements is the expected string.
    Lines of output are joined with newlines.

- **Equality tests**: two scripts run without errors and produce the same `show` output.
    This is how order independence of equations is tested.

- **Failure tests**: the first diagnostic of the script is an error of the expected kind.

- **Recoverable failure tests**: the script produces an error of the expected kind,
    the engine carries on, and the `show` output is the expected string.

- **Warning tests**: the script produces a warning of the expected kind and no errors.

After every test the engine's internal invariants are checked.

## The test suite macro

The preferred way to write a suite of tests is the [`test_suite`] macro:

```
use gallery::Kind;
use gallery_testing::*;

test_suite![
    show_tests(
        (simple, "x 2 =; show x;", "x=2"),
    ),
    failure_tests(
        (nonlinear, "x y * 1 =;", Kind::Nonlinear),
    ),
];
```
*/

use gallery::{script, Class, Engine, Error, Kind, Options};

/// Option passed to a test runner.
pub enum TestOption {
    /// Overrides the number of significant digits kept on division.
    Precision(u32),
    /// Overrides the soft cap on live equations.
    MaxEquations(usize),
    /// Turns on strict scopes.
    StrictScopes,
    /// Arbitrary modification of the options before the engine is built.
    Custom(fn(&mut Options)),
}

/// Builds an engine with the provided test options applied.
pub fn build_engine(test_options: &[TestOption]) -> Engine {
    let mut options = Options::default();
    for option in test_options {
        match option {
            TestOption::Precision(digits) => options.precision_digits = *digits,
            TestOption::MaxEquations(n) => options.max_equations = *n,
            TestOption::StrictScopes => options.strict_scopes = true,
            TestOption::Custom(f) => f(&mut options),
        }
    }
    Engine::new(options)
}

fn execute(input: &str, options: &[TestOption]) -> (String, Vec<Error>) {
    let mut engine = build_engine(options);
    let output = script::run(&mut engine, input);
    if let Err(message) = engine.check_invariants() {
        panic!("engine invariants broken after running the script: {message}");
    }
    (output.join("\n"), engine.take_diagnostics())
}

fn print_diagnostics(diagnostics: &[Error]) {
    for diagnostic in diagnostics {
        println!("{diagnostic}");
    }
}

/// Run a show test.
///
/// The test passes if the script produces no diagnostics and the expected output.
pub fn run_show_test(input: &str, want: &str, options: &[TestOption]) {
    let (got, diagnostics) = execute(input, options);
    if !diagnostics.is_empty() {
        print_diagnostics(&diagnostics);
        panic!("expected no diagnostics, got {}", diagnostics.len());
    }
    similar_asserts::assert_eq!(got: got, want: want.to_string());
}

/// Run an equality test.
///
/// The test passes if both scripts run without errors and produce the same output.
pub fn run_equality_test(lhs: &str, rhs: &str, options: &[TestOption]) {
    let (output_1, diagnostics_1) = execute(lhs, options);
    let (output_2, diagnostics_2) = execute(rhs, options);
    for diagnostics in [&diagnostics_1, &diagnostics_2] {
        if diagnostics.iter().any(|d| d.class() != Class::Limit) {
            print_diagnostics(diagnostics);
            panic!("expected no errors");
        }
    }
    similar_asserts::assert_eq!(lhs: output_1, rhs: output_2);
}

/// Run a failure test.
///
/// The test passes if the first error the script produces has the expected kind.
pub fn run_failure_test(input: &str, kind: Kind, options: &[TestOption]) {
    let (output, diagnostics) = execute(input, options);
    match diagnostics.iter().find(|d| d.class() != Class::Limit) {
        None => {
            println!("Script succeeded with output:");
            println!("{output}");
            panic!("expected an error of kind {kind:?}");
        }
        Some(err) => {
            if err.kind != kind {
                print_diagnostics(&diagnostics);
                panic!("expected an error of kind {kind:?}, got {:?}", err.kind);
            }
        }
    }
}

/// Run a recoverable failure test.
///
/// The test passes if the script produces exactly one error, of the expected kind,
///     and the expected output.
pub fn run_recoverable_failure_test(input: &str, kind: Kind, want: &str, options: &[TestOption]) {
    let (got, diagnostics) = execute(input, options);
    let kinds: Vec<Kind> = diagnostics
        .iter()
        .filter(|d| d.class() != Class::Limit)
        .map(|d| d.kind)
        .collect();
    if kinds != vec![kind] {
        print_diagnostics(&diagnostics);
        panic!("expected one error of kind {kind:?}, got {kinds:?}");
    }
    similar_asserts::assert_eq!(got: got, want: want.to_string());
}

/// Run a warning test.
///
/// The test passes if the script produces a warning of the expected kind and no errors.
pub fn run_warning_test(input: &str, kind: Kind, options: &[TestOption]) {
    let (_, diagnostics) = execute(input, options);
    if diagnostics.iter().any(|d| d.class() != Class::Limit) {
        print_diagnostics(&diagnostics);
        panic!("expected no errors");
    }
    if !diagnostics.iter().any(|d| d.kind == kind) {
        print_diagnostics(&diagnostics);
        panic!("expected a warning of kind {kind:?}");
    }
}

/// Macro to generate a suite of unit tests.
///
/// The general use of this macro looks like this:
/// ```
/// # use gallery::Kind;
/// # use gallery_testing::*;
/// test_suite![
///     options(TestOption::Precision(5), TestOption::MaxEquations(1)),
///     show_tests(
///         (show_test_name, "input", "expected output"),
///     ),
///     equality_tests(
///         (equality_test_name, "input 1", "input 2"),
///     ),
///     failure_tests(
///         (failure_test_name, "1 0 /;", Kind::DivByZero),
///     ),
///     recoverable_failure_tests(
///         (recoverable_failure_test_name, "x 1 =; x 2 =; show x;", Kind::Inconsistent, "x=1"),
///     ),
///     warning_tests(
///         (warning_test_name, "x y + 1 =; x z - 1 =;", Kind::EquationsOverflow),
///     ),
/// ];
/// ```
///
/// The options argument is optional; every other argument may be given or omitted.
#[macro_export]
macro_rules! test_suite {
    ( options $options: tt, show_tests ( $( ($name: ident, $input: expr, $want: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let options: Vec<gallery_testing::TestOption> = vec! $options;
                gallery_testing::run_show_test($input, $want, &options);
            }
        )*
    );
    ( options $options: tt, equality_tests ( $( ($name: ident, $lhs: expr, $rhs: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let options: Vec<gallery_testing::TestOption> = vec! $options;
                gallery_testing::run_equality_test($lhs, $rhs, &options);
            }
        )*
    );
    ( options $options: tt, failure_tests ( $( ($name: ident, $input: expr, $kind: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let options: Vec<gallery_testing::TestOption> = vec! $options;
                gallery_testing::run_failure_test($input, $kind, &options);
            }
        )*
    );
    ( options $options: tt, recoverable_failure_tests ( $( ($name: ident, $input: expr, $kind: expr, $want: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let options: Vec<gallery_testing::TestOption> = vec! $options;
                gallery_testing::run_recoverable_failure_test($input, $kind, $want, &options);
            }
        )*
    );
    ( options $options: tt, warning_tests ( $( ($name: ident, $input: expr, $kind: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let options: Vec<gallery_testing::TestOption> = vec! $options;
                gallery_testing::run_warning_test($input, $kind, &options);
            }
        )*
    );
    ( options $options: tt, $test_kind: ident $test_cases: tt $(,)? ) => (
        compile_error!("Invalid keyword: test_suite! only accepts the following keywords: `options`, `show_tests`, `equality_tests`, `failure_tests`, `recoverable_failure_tests`, `warning_tests`");
    );
    ( options $options: tt, $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        $(
            gallery_testing::test_suite![options $options, $test_kind $test_cases,];
        )+
    );
    ( $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        gallery_testing::test_suite![options (), $( $test_kind $test_cases, )+ ];
    );
}
