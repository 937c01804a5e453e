use criterion::{criterion_group, criterion_main, Criterion};
use leq::Solver;
use rand::SeedableRng;

pub fn random_systems_bench(c: &mut Criterion) {
    let mut rng = rand::prelude::StdRng::seed_from_u64(43);
    let mut group = c.benchmark_group("random-systems");
    for (num_equations, num_variables, terms) in [(50, 60, 3), (200, 250, 4)] {
        let system = performance::random_system(&mut rng, num_equations, num_variables, terms);
        group.bench_function(format!("random_system_{num_equations}x{num_variables}"), |b| {
            b.iter(|| {
                let mut solver = Solver::default();
                for p in &system {
                    // random systems may contain inconsistent equations
                    let _ = solver.add_equation(p.clone());
                }
                solver
            })
        });
    }
}

criterion_group!(benches, random_systems_bench);
criterion_main!(benches);
