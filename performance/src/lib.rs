use gallery::{script, Engine};
use gallery_core::Decimal;
use leq::{Polynomial, VarId};
use rand::Rng;

/// Runs a script in a fresh engine and panics if it produced any diagnostic.
pub fn run_script(input: &str) -> Vec<String> {
    let mut engine = Engine::default();
    let output = script::run(&mut engine, input);
    if let Some(err) = engine.diagnostics().first() {
        panic!("benchmark script failed: {err}");
    }
    output
}

/// Generates the chain `x[i] = x[i+1] + 1` for `i` in `0..n`.
///
/// Every equation leaves the chain dependent on its last variable;
///     pinning that variable then makes every other variable known in one cascade.
pub fn chain(n: usize) -> Vec<Polynomial> {
    (0..n)
        .map(|i| {
            let mut p = Polynomial::constant(Decimal::ONE);
            p.set_coefficient(VarId(i as u32 + 1), Decimal::MINUS_ONE);
            p.set_coefficient(VarId(i as u32 + 2), Decimal::ONE);
            p
        })
        .collect()
}

/// Generates a random sparse linear system.
///
/// Each equation mentions `terms` distinct variables out of `num_variables`
///     with small non-zero integer coefficients.
pub fn random_system(
    rng: &mut rand::prelude::StdRng,
    num_equations: usize,
    num_variables: u32,
    terms: usize,
) -> Vec<Polynomial> {
    let small = |rng: &mut rand::prelude::StdRng| {
        let c: i64 = rng.gen_range(1..10);
        if rng.gen_bool(0.5) {
            -c
        } else {
            c
        }
    };
    let mut system = Vec::with_capacity(num_equations);
    for _ in 0..num_equations {
        let mut p = Polynomial::constant(Decimal::from_integer(small(rng)));
        while p.terms().count() < terms.min(num_variables as usize) {
            let id = VarId(rng.gen_range(1..=num_variables));
            p.set_coefficient(id, Decimal::from_integer(small(rng)));
        }
        system.push(p);
    }
    system
}

/// Generates a script that intersects `n` pairs of lines with `whatever`.
pub fn intersections_script(n: usize) -> String {
    let mut s = String::from("pair z;\n");
    for i in 0..n {
        s.push_str(&format!(
            "z[{i}] whatever ({i},1) * =;\n\
             z[{i}] whatever (1,-1) * ({i},0) + =;\n"
        ));
    }
    s
}
