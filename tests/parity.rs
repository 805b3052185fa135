use rand::SeedableRng;

use torus_life::kernel::reference;
use torus_life::{ExecutionSession, Grid, HostBackend, ParallelKernel, Transition};

fn random_grid(rows: usize, cols: usize, density: f64, seed: u64) -> Grid {
    let mut grid = Grid::new(rows, cols).unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    grid.seed_random_with_density(&mut rng, density);
    grid
}

fn run_parity_case(rows: usize, cols: usize, density: f64, steps: u64, seed: u64, threads: usize) {
    let initial = random_grid(rows, cols, density, seed);
    let mut parallel = ParallelKernel::with_threads(threads).unwrap();
    let mut session =
        ExecutionSession::new(HostBackend::with_threads(threads).unwrap(), rows, cols).unwrap();

    let mut expected = initial.clone();
    let mut par = initial.clone();
    let mut dev = initial;
    for step in 0..steps {
        expected = reference::next_generation(&expected).unwrap();
        par = parallel.next_generation(&par).unwrap();
        dev = session.next_generation(&dev).unwrap();
        assert_eq!(
            par, expected,
            "parallel mismatch at step {step} for {rows}x{cols} density {density} seed {seed}"
        );
        assert_eq!(
            dev, expected,
            "accelerator mismatch at step {step} for {rows}x{cols} density {density} seed {seed}"
        );
    }
}

#[test]
fn parity_sparse_mid_dense() {
    run_parity_case(96, 96, 0.10, 6, 0xA1, 4);
    run_parity_case(96, 96, 0.42, 6, 0xB2, 4);
    run_parity_case(96, 96, 0.83, 4, 0xC3, 4);
}

#[test]
fn parity_multiple_seeds() {
    for seed in [11u64, 22, 33, 44] {
        run_parity_case(72, 40, 0.35, 7, seed, 3);
    }
}

#[test]
fn parity_degenerate_shapes() {
    for (rows, cols) in [(1, 1), (1, 2), (2, 1), (2, 2), (1, 17), (17, 1), (2, 9), (3, 3)] {
        for seed in 0..8u64 {
            run_parity_case(rows, cols, 0.5, 3, seed, 2);
        }
    }
}

#[test]
fn parity_large_board_uses_pool() {
    // Over the parallel kernel's serial cutoff.
    run_parity_case(320, 300, 0.42, 3, 0x5EED_1234_ABCD_EF01, 8);
}

#[test]
fn parity_independent_of_thread_count() {
    let initial = random_grid(400, 333, 0.5, 0xDEAD_BEEF);
    let mut outputs = Vec::new();
    for threads in [1, 2, 3, 7] {
        let mut kernel = ParallelKernel::with_threads(threads).unwrap();
        let mut grid = initial.clone();
        for _ in 0..4 {
            grid = kernel.next_generation(&grid).unwrap();
        }
        outputs.push(grid);
    }
    assert!(outputs.windows(2).all(|w| w[0] == w[1]));
}
