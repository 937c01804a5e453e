//! End-to-end tests that drive the engine through statement scripts.

use gallery::Kind;
use gallery_testing::*;

test_suite![
    show_tests(
        (simple_solve, "x y + 3 =; x y - 1 =; show x y;", "x=2\ny=1"),
        (
            dependent_then_resolved,
            "a 2 b * =; show a b; b 5 =; show a b;",
            "a=unknown numeric\nb=0.5a\na=10\nb=5"
        ),
        (
            pair_interpolation,
            "pair A B C; (0,0) := A; (10,0) := B; 0.5 A B [] := C; show C; C xpart := c; C ypart := d; show c d;",
            "C=(5,0)\nc=5\nd=0"
        ),
        (
            capsule_survival,
            "v u 1 + =; begingroup save k; k 2 u * =; u 3 =; endgroup; show u v k; showdependencies;",
            "u=3\nv=4\nk=unknown numeric"
        ),
        (
            saved_variable_is_restored,
            "u 5 =; begingroup save u; u 3 =; show u; endgroup; show u;",
            "u=3\nu=5"
        ),
        (empty_equation, "0 0 =; x x =; showdependencies; show x;", "x=unknown numeric"),
        (single_variable_is_known, "3 x * 6 =; show x;", "x=2"),
        (equal_subscripts, "x[2] 3 =; show x[4/2] x2;", "x[2]=3\nx[2]=3"),
        (dimensions, "x 1in =; y 2.54cm =; show x y;", "x=72\ny=72"),
        (
            whatever_intersection,
            "pair z; z whatever (1,1) * =; z whatever (1,-1) * (2,0) + =; show z;",
            "z=(1,1)"
        ),
        (
            make_pair,
            "pair p; p a b mkpair =; a 1 =; b 2 =; show p;",
            "p=(1,2)"
        ),
        (
            assignment_uses_old_value,
            "x 1 =; x 1 + := x; show x;",
            "x=2"
        ),
        (
            dependencies_survive_groups,
            "begingroup save k; a 0.5 k * 1 + =; b 0.5 k * 2 + =; endgroup; b 3 =; show a;",
            "a=2"
        ),
    ),
    equality_tests(
        (
            known_value_round_trip,
            "x 4 =; x 4 =; show x; showdependencies;",
            "x 4 =; show x; showdependencies;"
        ),
        (
            order_independence,
            "x y + 3 =; x y - 1 =; z x y + =; show x y z;",
            "z x y + =; x y - 1 =; x y + 3 =; show x y z;"
        ),
        (
            order_independence_with_pairs,
            "pair A B; A (1,2) =; B A (3,4) + =; show A B;",
            "pair A B; B A (3,4) + =; A (1,2) =; show A B;"
        ),
    ),
    failure_tests(
        (nonlinear, "x y * 1 =;", Kind::Nonlinear),
        (division_by_zero, "1 0 /;", Kind::DivByZero),
        (division_by_unknown, "1 x / 2 =;", Kind::Nonlinear),
        (pair_in_numeric_context, "pair A; A 1 +;", Kind::TypeMismatch),
        (pair_times_pair, "(1,2) (3,4) *;", Kind::TypeMismatch),
        (unbalanced_group, "endgroup;", Kind::UnbalancedGroup),
        (unclosed_figure, "beginfig 1; x 1 =;", Kind::UnbalancedGroup),
        (bad_unit, "3zz;", Kind::Syntax),
        (huge_literal, "1e2000000000;", Kind::Syntax),
        (product_out_of_range, "1e1000 1e1000 *;", Kind::Overflow),
    ),
    recoverable_failure_tests(
        (inconsistency, "x 1 =; x 2 =; show x;", Kind::Inconsistent, "x=1"),
        (nonlinear_rejection, "x y * 1 =; x 3 =; show x;", Kind::Nonlinear, "x=3"),
        (
            rest_of_statement_is_skipped,
            "1 0 / x 1 =; x 2 =; show x;",
            Kind::DivByZero,
            "x=2"
        ),
        (
            overflow_rejection,
            "x 1e1000 1e1000 * =; x 3 =; show x;",
            Kind::Overflow,
            "x=3"
        ),
    ),
    warning_tests((precision_loss, "x 0.5 =; x 0.5000000009 =;", Kind::PrecisionLoss)),
];

mod strict_scopes {
    use super::*;

    test_suite![
        options(TestOption::StrictScopes),
        show_tests((
            saved_names_are_visible,
            "begingroup save x; x 2 =; show x; endgroup;",
            "x=2"
        )),
        failure_tests((
            outer_name_in_group,
            "x 1 =; begingroup x 2 =; endgroup;",
            Kind::UndefinedVariable
        )),
    ];
}

mod limits {
    use super::*;

    test_suite![
        options(TestOption::MaxEquations(1)),
        warning_tests((equations_overflow, "a b =; c d =;", Kind::EquationsOverflow)),
    ];
}
