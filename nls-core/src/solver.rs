use std::time::Instant;

use log::{debug, info, warn};
use num_complex::Complex64;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{NlsError, Result};
use crate::grid::{Dimension, Grid};
use crate::params::{Coefficients, slot};
use crate::solution::Solution;

/// Default number of steps between two finiteness checks of the field.
pub const DEFAULT_CHECK_INTERVAL: usize = 100;

/// Field size above which node loops go through rayon.
#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 1000;

// ---- Finite-difference stencils ----

/// Central difference weights for the first and second derivative.
///
/// The approximation order is the number of stencil points (3, 5 or 7).
#[derive(Clone, Debug, PartialEq)]
pub struct Stencil {
    first: Vec<f64>,
    second: Vec<f64>,
}

impl Stencil {
    pub fn new(order: usize) -> Result<Stencil> {
        let (first, second): (&[f64], &[f64]) = match order {
            3 => (&[-0.5, 0.0, 0.5], &[1.0, -2.0, 1.0]),
            5 => (
                &[1.0 / 12.0, -2.0 / 3.0, 0.0, 2.0 / 3.0, -1.0 / 12.0],
                &[-1.0 / 12.0, 4.0 / 3.0, -5.0 / 2.0, 4.0 / 3.0, -1.0 / 12.0],
            ),
            7 => (
                &[-1.0 / 60.0, 3.0 / 20.0, -3.0 / 4.0, 0.0, 3.0 / 4.0, -3.0 / 20.0, 1.0 / 60.0],
                &[
                    1.0 / 90.0,
                    -3.0 / 20.0,
                    3.0 / 2.0,
                    -49.0 / 18.0,
                    3.0 / 2.0,
                    -3.0 / 20.0,
                    1.0 / 90.0,
                ],
            ),
            _ => {
                return Err(NlsError::Configuration(format!(
                    "unsupported approximation order {order} (expected 3, 5 or 7)"
                )));
            }
        };
        Ok(Stencil { first: first.to_vec(), second: second.to_vec() })
    }

    pub fn order(&self) -> usize {
        self.second.len()
    }

    pub fn half_width(&self) -> usize {
        self.second.len() / 2
    }
}

// ---- Spatial operators ----

/// Discrete Laplacian on one kind of grid.
pub trait Laplacian: Send + Sync {
    fn dimension(&self) -> Dimension;

    /// Laplacian of `psi` at node `index`.
    fn at(&self, psi: &[Complex64], index: usize) -> Complex64;

    fn apply(&self, psi: &[Complex64], out: &mut [Complex64]) {
        for_each_node(out, |i| self.at(psi, i));
    }
}

/// `ψ'' + ψ'/r` on radial nodes `r_i = i·dx`.
///
/// The field is mirrored across the axis and vanishes past the last node.
/// On the axis itself the operator reduces to `2ψ''`.
#[derive(Clone, Debug)]
pub struct RadialLaplacian {
    stencil: Stencil,
    num_nodes: usize,
    dx: f64,
}

impl RadialLaplacian {
    pub fn new(stencil: Stencil, grid: &Grid) -> Self {
        RadialLaplacian { stencil, num_nodes: grid.num_nodes(), dx: grid.dx() }
    }

    fn value(&self, psi: &[Complex64], j: isize) -> Complex64 {
        let j = j.unsigned_abs();
        if j < self.num_nodes { psi[j] } else { Complex64::new(0.0, 0.0) }
    }
}

impl Laplacian for RadialLaplacian {
    fn dimension(&self) -> Dimension {
        Dimension::OneD
    }

    fn at(&self, psi: &[Complex64], index: usize) -> Complex64 {
        let h = self.stencil.half_width() as isize;
        let mut d1 = Complex64::new(0.0, 0.0);
        let mut d2 = Complex64::new(0.0, 0.0);
        for (k, (&w1, &w2)) in self.stencil.first.iter().zip(&self.stencil.second).enumerate() {
            let v = self.value(psi, index as isize + k as isize - h);
            d1 += v * w1;
            d2 += v * w2;
        }

        let dx2 = self.dx * self.dx;
        if index == 0 {
            d2 * (2.0 / dx2)
        } else {
            // r = index·dx, so ψ'/r = d1 / (dx · index·dx)
            d2 / dx2 + d1 / (dx2 * index as f64)
        }
    }
}

/// `∂xx + ∂yy` on a square row-major mesh with zero values outside.
#[derive(Clone, Debug)]
pub struct CartesianLaplacian {
    stencil: Stencil,
    num_nodes: usize,
    dx: f64,
}

impl CartesianLaplacian {
    pub fn new(stencil: Stencil, grid: &Grid) -> Self {
        CartesianLaplacian { stencil, num_nodes: grid.num_nodes(), dx: grid.dx() }
    }

    fn value(&self, psi: &[Complex64], x: isize, y: isize) -> Complex64 {
        let n = self.num_nodes as isize;
        if x < 0 || y < 0 || x >= n || y >= n {
            return Complex64::new(0.0, 0.0);
        }
        psi[(y * n + x) as usize]
    }
}

impl Laplacian for CartesianLaplacian {
    fn dimension(&self) -> Dimension {
        Dimension::TwoD
    }

    fn at(&self, psi: &[Complex64], index: usize) -> Complex64 {
        let n = self.num_nodes;
        let (x, y) = ((index % n) as isize, (index / n) as isize);
        let h = self.stencil.half_width() as isize;

        let mut acc = Complex64::new(0.0, 0.0);
        for (k, &w) in self.stencil.second.iter().enumerate() {
            let offset = k as isize - h;
            acc += (self.value(psi, x + offset, y) + self.value(psi, x, y + offset)) * w;
        }
        acc / (self.dx * self.dx)
    }
}

// ---- Right-hand side ----

/// Coefficients of `∂tψ = f(ψ)` unpacked from the coefficient vector.
#[derive(Clone, Copy, Debug)]
struct Rhs {
    inv_time: f64,
    laplacian: f64,
    gain: f64,
    damping: f64,
    nonlinearity: f64,
    coupling: f64,
    coeffs: Coefficients,
}

impl Rhs {
    fn new(c: &Coefficients) -> Self {
        Rhs {
            inv_time: 1.0 / c.get(slot::TIME),
            laplacian: c.get(slot::LAPLACIAN),
            gain: c.get(slot::GAIN),
            damping: c.get(slot::DAMPING),
            nonlinearity: c.get(slot::NONLINEARITY),
            coupling: c.get(slot::RESERVOIR_COUPLING),
            coeffs: *c,
        }
    }

    /// `c0·∂tψ = i·c1·∇²ψ − i·(c4·|ψ|² + c5·n)·ψ + (c2·n − c3)·ψ`
    fn at(&self, psi: Complex64, lap: Complex64, pump: f64) -> Complex64 {
        let u = psi.norm_sqr();
        let n = self.coeffs.reservoir_density(pump, u);
        let conservative = lap * self.laplacian - psi * (self.nonlinearity * u + self.coupling * n);
        (Complex64::i() * conservative + psi * (self.gain * n - self.damping)) * self.inv_time
    }
}

#[cfg(feature = "parallel")]
fn for_each_node<F>(out: &mut [Complex64], f: F)
where
    F: Fn(usize) -> Complex64 + Sync + Send,
{
    if out.len() >= PARALLEL_THRESHOLD {
        out.par_iter_mut().enumerate().for_each(|(i, v)| *v = f(i));
    } else {
        out.iter_mut().enumerate().for_each(|(i, v)| *v = f(i));
    }
}

#[cfg(not(feature = "parallel"))]
fn for_each_node<F>(out: &mut [Complex64], f: F)
where
    F: Fn(usize) -> Complex64,
{
    out.iter_mut().enumerate().for_each(|(i, v)| *v = f(i));
}

// ---- Integrators ----

/// Advances a [`Solution`] in time.
pub trait Integrator: Send {
    fn name(&self) -> &'static str;

    /// Perform `num_iters` steps without measuring time.
    ///
    /// On error the solution keeps the field it had before the call.
    fn advance(&mut self, solution: &mut Solution, num_iters: usize) -> Result<()>;

    /// Perform `num_iters` steps (the solution's budget when `None`) and
    /// accumulate the wall-clock cost into the solution.
    fn solve(&mut self, solution: &mut Solution, num_iters: Option<usize>) -> Result<()> {
        let num_iters = num_iters.unwrap_or(solution.number_of_iterations());

        let start = Instant::now();
        let result = self.advance(solution, num_iters);
        solution.add_elapsed_time(start.elapsed().as_secs_f64());
        result?;

        info!(
            "{}: {} iterations done, t = {:.6}, elapsed {:.3} s",
            self.name(),
            num_iters,
            solution.time(),
            solution.elapsed_time()
        );
        Ok(())
    }
}

/// Classical RK4 in time over a finite-difference Laplacian in space.
pub struct Engine<L> {
    grid: Grid,
    laplacian: L,
    check_interval: usize,
    lap: Vec<Complex64>,
    stage: Vec<Complex64>,
    k: [Vec<Complex64>; 4],
}

/// Engine for axially symmetric problems.
pub type Solver1D = Engine<RadialLaplacian>;

/// Engine for the square Cartesian mesh.
pub type Solver2D = Engine<CartesianLaplacian>;

impl Engine<RadialLaplacian> {
    pub fn new(solution: &Solution) -> Result<Self> {
        let grid = *solution.grid();
        let stencil = Stencil::new(solution.approximation_order())?;
        Engine::with_laplacian(grid, RadialLaplacian::new(stencil, &grid))
    }
}

impl Engine<CartesianLaplacian> {
    pub fn new(solution: &Solution) -> Result<Self> {
        let grid = *solution.grid();
        let stencil = Stencil::new(solution.approximation_order())?;
        Engine::with_laplacian(grid, CartesianLaplacian::new(stencil, &grid))
    }
}

impl<L: Laplacian> Engine<L> {
    pub fn with_laplacian(grid: Grid, laplacian: L) -> Result<Self> {
        if grid.dimension() != laplacian.dimension() {
            return Err(NlsError::Configuration(format!(
                "{} operator cannot run on a {} grid",
                laplacian.dimension().as_str(),
                grid.dimension().as_str()
            )));
        }

        let n = grid.field_len();
        let zeros = vec![Complex64::new(0.0, 0.0); n];
        Ok(Engine {
            grid,
            laplacian,
            check_interval: DEFAULT_CHECK_INTERVAL,
            lap: zeros.clone(),
            stage: zeros.clone(),
            k: [zeros.clone(), zeros.clone(), zeros.clone(), zeros],
        })
    }

    /// Check the field for non-finite values every `interval` steps.
    pub fn with_check_interval(mut self, interval: usize) -> Self {
        self.check_interval = interval.max(1);
        self
    }

    pub fn check_interval(&self) -> usize {
        self.check_interval
    }

    /// Evaluate `f(psi)` into `self.k[slot]`.
    fn evaluate(&mut self, rhs: &Rhs, pump: &[f64], psi: &[Complex64], slot: usize) {
        self.laplacian.apply(psi, &mut self.lap);
        let lap = &self.lap;
        for_each_node(&mut self.k[slot], |i| rhs.at(psi[i], lap[i], pump[i]));
    }

    fn fill_stage(&mut self, psi: &[Complex64], from: usize, scale: f64) {
        for ((s, &p), &k) in self.stage.iter_mut().zip(psi).zip(&self.k[from]) {
            *s = p + k * scale;
        }
    }

    fn rk4_step(&mut self, rhs: &Rhs, pump: &[f64], psi: &mut [Complex64], dt: f64) {
        self.evaluate(rhs, pump, psi, 0);

        self.fill_stage(psi, 0, dt / 2.0);
        let stage = std::mem::take(&mut self.stage);
        self.evaluate(rhs, pump, &stage, 1);
        self.stage = stage;

        self.fill_stage(psi, 1, dt / 2.0);
        let stage = std::mem::take(&mut self.stage);
        self.evaluate(rhs, pump, &stage, 2);
        self.stage = stage;

        self.fill_stage(psi, 2, dt);
        let stage = std::mem::take(&mut self.stage);
        self.evaluate(rhs, pump, &stage, 3);
        self.stage = stage;

        let [k1, k2, k3, k4] = &self.k;
        for (i, p) in psi.iter_mut().enumerate() {
            *p += (k1[i] + (k2[i] + k3[i]) * 2.0 + k4[i]) * (dt / 6.0);
        }
    }
}

fn first_non_finite(psi: &[Complex64]) -> Option<usize> {
    psi.iter().position(|v| !v.re.is_finite() || !v.im.is_finite())
}

impl<L: Laplacian> Integrator for Engine<L> {
    fn name(&self) -> &'static str {
        match self.grid.dimension() {
            Dimension::OneD => "Solver1D",
            Dimension::TwoD => "Solver2D",
        }
    }

    fn advance(&mut self, solution: &mut Solution, num_iters: usize) -> Result<()> {
        if solution.grid() != &self.grid {
            return Err(NlsError::Configuration(
                "solution grid differs from the grid this solver was built for".into(),
            ));
        }
        if num_iters == 0 {
            return Ok(());
        }

        let rhs = Rhs::new(solution.coefficients());
        let pump = solution.pumping_sample();
        let dt = solution.time_step();
        let start = solution.iterations_done();
        let mut psi = solution.solution().to_vec();

        for step in 1..=num_iters {
            self.rk4_step(&rhs, &pump, &mut psi, dt);

            if step % self.check_interval == 0 || step == num_iters {
                let iteration = start + step as u64;
                if let Some(node) = first_non_finite(&psi) {
                    warn!(
                        "{}: field diverged at node {} by iteration {}",
                        self.name(),
                        node,
                        iteration
                    );
                    return Err(NlsError::NumericalDivergence { iteration });
                }
                debug!("{}: iteration {} finite", self.name(), iteration);
            }
        }

        solution.commit_step(psi, num_iters as u64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PhysicalParameters;
    use crate::pumping::Pumping;
    use approx::assert_abs_diff_eq;

    fn params() -> PhysicalParameters {
        PhysicalParameters { r: 0.05, gamma: 0.566, g: 1.0e-3, tilde_g: 0.011, gamma_r: 10.0 }
    }

    fn solution(dimension: Dimension, n: usize, order: usize, dt: f64) -> Solution {
        let grid = Grid::new(0.1, n, dimension).unwrap();
        let field = vec![Complex64::new(0.1, 0.0); grid.field_len()];
        let pumping = Pumping::gaussian(3.0, 0.0, 6.84931506849);
        Solution::new(grid, dt, order, 20, pumping, params(), field).unwrap()
    }

    #[test]
    fn stencil_orders() {
        for order in [3, 5, 7] {
            let s = Stencil::new(order).unwrap();
            assert_eq!(s.order(), order);
            assert_abs_diff_eq!(s.second.iter().sum::<f64>(), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(s.first.iter().sum::<f64>(), 0.0, epsilon = 1e-12);
        }
        assert!(matches!(Stencil::new(4), Err(NlsError::Configuration(_))));
    }

    #[test]
    fn radial_laplacian_of_r_squared_is_four() {
        let n = 30;
        let grid = Grid::new(0.1, n, Dimension::OneD).unwrap();
        let psi: Vec<Complex64> =
            grid.coordinates().iter().map(|r| Complex64::new(r * r, 0.0)).collect();

        for order in [3, 5, 7] {
            let stencil = Stencil::new(order).unwrap();
            let h = stencil.half_width();
            let op = RadialLaplacian::new(stencil, &grid);

            // away from the outer edge the stencil is exact for quadratics
            for i in 0..n - h {
                assert_abs_diff_eq!(op.at(&psi, i).re, 4.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn cartesian_laplacian_of_paraboloid_is_four() {
        let n = 12;
        let dx = 0.1;
        let grid = Grid::new(dx, n, Dimension::TwoD).unwrap();
        let psi: Vec<Complex64> = (0..n * n)
            .map(|i| {
                let (x, y) = ((i % n) as f64 * dx, (i / n) as f64 * dx);
                Complex64::new(x * x + y * y, 0.0)
            })
            .collect();

        for order in [3, 5, 7] {
            let stencil = Stencil::new(order).unwrap();
            let h = stencil.half_width();
            let op = CartesianLaplacian::new(stencil, &grid);

            for y in h..n - h {
                for x in h..n - h {
                    assert_abs_diff_eq!(op.at(&psi, y * n + x).re, 4.0, epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn engine_refuses_other_dimension() {
        let s = solution(Dimension::TwoD, 5, 3, 1e-3);
        let grid = *s.grid();
        let op = RadialLaplacian::new(Stencil::new(3).unwrap(), &grid);
        assert!(Engine::with_laplacian(grid, op).is_err());
    }

    #[test]
    fn zero_iterations_leave_field_alone() {
        let mut s = solution(Dimension::OneD, 50, 5, 1e-3);
        let before = s.solution().to_vec();
        let mut solver = Solver1D::new(&s).unwrap();
        solver.solve(&mut s, Some(0)).unwrap();
        assert_eq!(s.solution(), before.as_slice());
        assert_eq!(s.iterations_done(), 0);
    }

    #[test]
    fn solve_uses_budget_by_default() {
        let mut s = solution(Dimension::TwoD, 8, 3, 1e-3);
        let mut solver = Solver2D::new(&s).unwrap();
        solver.solve(&mut s, None).unwrap();
        assert_eq!(s.iterations_done(), 20);
        assert!(s.elapsed_time() >= 0.0);
        assert_ne!(s.solution(), s.initial_solution());
    }

    #[test]
    fn vanishing_reservoir_denominator_reports_divergence() {
        let mut s = solution(Dimension::OneD, 8, 5, 1e-3);
        let before = s.solution().to_vec();

        // c12 = -c13·|u0|² zeroes the denominator on every node
        let mut record = s.to_record();
        let mut raw: Vec<f64> = record.coefficients.into();
        raw[slot::RESERVOIR_DAMPING] = -(raw[slot::RESERVOIR_INTERACTION] * before[0].norm_sqr());
        record.coefficients = Coefficients::try_from(raw).unwrap();
        s.apply_record(record).unwrap();
        assert!(s.profiles().is_err());

        let mut solver = Solver1D::new(&s).unwrap();
        match solver.solve(&mut s, Some(5)) {
            Err(NlsError::NumericalDivergence { iteration }) => assert_eq!(iteration, 5),
            other => panic!("expected divergence, got {other:?}"),
        }
        assert_eq!(s.solution(), before.as_slice());
        assert_eq!(s.iterations_done(), 0);
    }

    #[test]
    fn unstable_step_reports_divergence() {
        let mut s = solution(Dimension::OneD, 40, 5, 10.0);
        let before = s.solution().to_vec();
        let mut solver = Solver1D::new(&s).unwrap().with_check_interval(10);

        let err = solver.solve(&mut s, Some(500)).unwrap_err();
        match err {
            NlsError::NumericalDivergence { iteration } => {
                assert!(iteration <= 500 && iteration % 10 == 0)
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(s.solution(), before.as_slice());
        assert_eq!(s.iterations_done(), 0);
    }
}
