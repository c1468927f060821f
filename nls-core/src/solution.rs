use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{NlsError, Result};
use crate::grid::{Dimension, Grid};
use crate::params::{Coefficients, PhysicalParameters};
use crate::pumping::Pumping;

/// State of one simulation: grid, coefficients, pumping, fields and run metadata.
#[derive(Clone, Debug)]
pub struct Solution {
    grid: Grid,
    dt: f64,
    order: usize,
    num_iters: usize,
    t0: f64,
    coeffs: Coefficients,
    originals: PhysicalParameters,
    pumping: Pumping,
    init_solution: Vec<Complex64>,
    solution: Vec<Complex64>,
    elapsed_time: f64,
    iterations: u64,
    description: String,
    label: String,
}

impl Solution {
    pub fn new(
        grid: Grid,
        dt: f64,
        order: usize,
        num_iters: usize,
        pumping: Pumping,
        originals: PhysicalParameters,
        init_solution: Vec<Complex64>,
    ) -> Result<Solution> {
        grid.check_field(init_solution.len())?;

        Ok(Solution {
            grid,
            dt,
            order,
            num_iters,
            t0: 0.0,
            coeffs: Coefficients::derive(&originals),
            originals,
            pumping,
            solution: init_solution.clone(),
            init_solution,
            elapsed_time: 0.0,
            iterations: 0,
            description: String::new(),
            label: String::new(),
        })
    }

    pub fn with_initial_time(mut self, t0: f64) -> Self {
        self.t0 = t0;
        self
    }

    // ---- Accessors ----

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn time_step(&self) -> f64 {
        self.dt
    }

    pub fn spatial_step(&self) -> f64 {
        self.grid.dx()
    }

    pub fn approximation_order(&self) -> usize {
        self.order
    }

    pub fn number_of_nodes(&self) -> usize {
        self.grid.num_nodes()
    }

    pub fn number_of_iterations(&self) -> usize {
        self.num_iters
    }

    /// Steps performed by every solve so far.
    pub fn iterations_done(&self) -> u64 {
        self.iterations
    }

    /// Simulated time reached by the current field.
    pub fn time(&self) -> f64 {
        self.t0 + self.iterations as f64 * self.dt
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.coeffs
    }

    pub fn original_params(&self) -> &PhysicalParameters {
        &self.originals
    }

    pub fn pumping(&self) -> &Pumping {
        &self.pumping
    }

    /// In-place access to the pumping profile, e.g. to sweep its power.
    pub fn pumping_mut(&mut self) -> &mut Pumping {
        &mut self.pumping
    }

    /// Pump intensity over the grid, recomputed from the current profile.
    pub fn pumping_sample(&self) -> Vec<f64> {
        self.grid.sample(&self.pumping)
    }

    pub fn initial_solution(&self) -> &[Complex64] {
        &self.init_solution
    }

    pub fn solution(&self) -> &[Complex64] {
        &self.solution
    }

    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_time
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    // ---- Mutators ----

    pub fn set_number_of_iterations(&mut self, num_iters: usize) {
        self.num_iters = num_iters;
    }

    pub fn set_pumping(&mut self, pumping: Pumping) {
        self.pumping = pumping;
    }

    /// Re-seed the run: the new field becomes both the initial and the current field.
    pub fn set_initial_solution(&mut self, field: Vec<Complex64>) -> Result<()> {
        self.grid.check_field(field.len())?;
        self.solution = field.clone();
        self.init_solution = field;
        Ok(())
    }

    pub fn set_solution(&mut self, field: Vec<Complex64>) -> Result<()> {
        self.grid.check_field(field.len())?;
        self.solution = field;
        Ok(())
    }

    pub fn set_elapsed_time(&mut self, seconds: f64) {
        self.elapsed_time = seconds;
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Replace the current field with a copy of the initial one.
    pub fn reset(&mut self) {
        self.solution.clone_from(&self.init_solution);
        self.iterations = 0;
    }

    pub(crate) fn commit_step(&mut self, field: Vec<Complex64>, steps: u64) {
        self.solution = field;
        self.iterations += steps;
    }

    pub(crate) fn add_elapsed_time(&mut self, seconds: f64) {
        self.elapsed_time += seconds;
    }

    // ---- Derived quantities ----

    /// Pumping, condensate density and reservoir density over the grid.
    pub fn profiles(&self) -> Result<Profiles> {
        let pumping = self.pumping_sample();
        let condensate_density: Vec<f64> = self.solution.iter().map(|psi| psi.norm_sqr()).collect();

        let mut reservoir_density = Vec::with_capacity(pumping.len());
        for (node, (&p, &u)) in pumping.iter().zip(&condensate_density).enumerate() {
            if self.coeffs.reservoir_denominator(u) == 0.0 {
                return Err(NlsError::DegenerateReservoir { node });
            }
            reservoir_density.push(self.coeffs.reservoir_density(p, u));
        }

        Ok(Profiles {
            dimension: self.grid.dimension(),
            coordinates: self.grid.coordinates(),
            pumping,
            condensate_density,
            reservoir_density,
        })
    }

    pub fn report(&self) -> String {
        format!(
            "Elapsed in {} seconds with {} iteration on {} grid nodes.",
            self.elapsed_time,
            self.num_iters,
            self.grid.num_nodes()
        )
    }

    // ---- Persistence ----

    pub fn to_record(&self) -> SolutionRecord {
        SolutionRecord {
            description: self.description.clone(),
            label: self.label.clone(),
            coefficients: self.coeffs,
            elapsed_time: self.elapsed_time,
            original_params: self.originals,
            pumping_sample: self.pumping_sample(),
            field: self.solution.clone(),
        }
    }

    /// Write the record as JSON. Fails with `NonFiniteRecord` before writing
    /// anything when a value has no JSON form.
    pub fn store<W: Write>(&self, writer: W) -> Result<()> {
        let record = self.to_record();
        record.check_finite()?;
        serde_json::to_writer(writer, &record)?;
        Ok(())
    }

    /// Like [`Solution::store`]; the file is not created when the check fails.
    pub fn store_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let record = self.to_record();
        record.check_finite()?;
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, &record)?;
        writer.flush()?;
        Ok(())
    }

    /// Overlay a stored record onto this solution.
    ///
    /// The record must come from a model with the same grid. The stored pumping
    /// sample is informational; the pumping profile is kept.
    pub fn restore<R: Read>(&mut self, reader: R) -> Result<&mut Self> {
        let record: SolutionRecord = serde_json::from_reader(reader)?;
        self.apply_record(record)?;
        Ok(self)
    }

    pub fn restore_from_path(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        self.restore(BufReader::new(File::open(path)?))
    }

    pub fn apply_record(&mut self, record: SolutionRecord) -> Result<()> {
        self.grid.check_field(record.field.len())?;

        self.description = record.description;
        self.label = record.label;
        self.coeffs = record.coefficients;
        self.elapsed_time = record.elapsed_time;
        self.originals = record.original_params;
        self.solution = record.field;
        Ok(())
    }
}

/// On-disk form of a [`Solution`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolutionRecord {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub label: String,
    pub coefficients: Coefficients,
    pub elapsed_time: f64,
    pub original_params: PhysicalParameters,
    pub pumping_sample: Vec<f64>,
    pub field: Vec<Complex64>,
}

impl SolutionRecord {
    /// serde_json writes NaN and infinities as `null`, which cannot be read back.
    pub fn check_finite(&self) -> Result<()> {
        let p = &self.original_params;
        all_finite("coefficients", self.coefficients.as_slice().iter().copied())?;
        all_finite("elapsed_time", [self.elapsed_time])?;
        all_finite("original_params", [p.r, p.gamma, p.g, p.tilde_g, p.gamma_r])?;
        all_finite("pumping_sample", self.pumping_sample.iter().copied())?;
        match self.field.iter().position(|v| !v.is_finite()) {
            Some(index) => Err(NlsError::NonFiniteRecord { what: "field", index }),
            None => Ok(()),
        }
    }
}

fn all_finite(what: &'static str, values: impl IntoIterator<Item = f64>) -> Result<()> {
    match values.into_iter().position(|v| !v.is_finite()) {
        Some(index) => Err(NlsError::NonFiniteRecord { what, index }),
        None => Ok(()),
    }
}

/// Fields derived from a solution, ready to be plotted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Profiles {
    pub dimension: Dimension,
    /// Radial nodes (1D) or the mesh axis (2D).
    pub coordinates: Vec<f64>,
    pub pumping: Vec<f64>,
    pub condensate_density: Vec<f64>,
    pub reservoir_density: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::slot;
    use approx::assert_relative_eq;

    fn params() -> PhysicalParameters {
        PhysicalParameters { r: 0.05, gamma: 0.566, g: 1.0e-3, tilde_g: 0.011, gamma_r: 10.0 }
    }

    fn solution_1d(n: usize) -> Solution {
        let grid = Grid::new(0.1, n, Dimension::OneD).unwrap();
        let field = (0..n).map(|i| Complex64::new(0.1, 0.01 * i as f64)).collect();
        let pumping = Pumping::gaussian(3.0, 0.0, 6.84931506849);
        Solution::new(grid, 1e-3, 5, 10, pumping, params(), field).unwrap()
    }

    #[test]
    fn rejects_mismatched_initial_field() {
        let grid = Grid::new(0.1, 4, Dimension::TwoD).unwrap();
        let field = vec![Complex64::new(0.1, 0.0); 4];
        let err = Solution::new(grid, 1e-3, 3, 1, Pumping::default(), params(), field);
        assert!(matches!(err, Err(NlsError::ShapeMismatch { expected: 16, found: 4 })));
    }

    #[test]
    fn pumping_sample_tracks_profile_changes() {
        let mut s = solution_1d(8);
        let before = s.pumping_sample();
        s.pumping_mut().set_power(6.0);
        let after = s.pumping_sample();
        assert_relative_eq!(after[0], 2.0 * before[0]);
    }

    #[test]
    fn profiles_follow_reservoir_relation() {
        let s = solution_1d(6);
        let profiles = s.profiles().unwrap();
        let c = s.coefficients();

        for i in 0..6 {
            let u = s.solution()[i].norm_sqr();
            let p = profiles.pumping[i];
            assert_relative_eq!(profiles.condensate_density[i], u);
            let denominator =
                c.get(slot::RESERVOIR_DAMPING) + c.get(slot::RESERVOIR_INTERACTION) * u;
            let expected = c.get(slot::PUMPING) * p / denominator;
            assert_relative_eq!(profiles.reservoir_density[i], expected);
        }
    }

    #[test]
    fn zero_reservoir_denominator_is_reported() {
        let mut s = solution_1d(3);
        let mut raw: Vec<f64> = (*s.coefficients()).into();
        raw[slot::RESERVOIR_DAMPING] = 0.0;
        s.coeffs = Coefficients::try_from(raw).unwrap();
        s.set_solution(vec![Complex64::new(0.0, 0.0); 3]).unwrap();

        assert!(matches!(s.profiles(), Err(NlsError::DegenerateReservoir { node: 0 })));
    }

    #[test]
    fn reseeding_replaces_both_fields() {
        let mut s = solution_1d(4);
        let field = vec![Complex64::new(0.5, -0.5); 4];
        s.set_initial_solution(field.clone()).unwrap();
        assert_eq!(s.initial_solution(), field.as_slice());
        assert_eq!(s.solution(), field.as_slice());
        assert!(s.set_solution(vec![Complex64::new(0.0, 0.0); 5]).is_err());
    }

    #[test]
    fn store_then_restore_round_trips() {
        let mut s = solution_1d(5);
        s.set_elapsed_time(12.5);
        s.set_label("run-a");

        let mut buffer = Vec::new();
        s.store(&mut buffer).unwrap();

        let mut fresh = solution_1d(5);
        fresh.set_solution(vec![Complex64::new(0.0, 0.0); 5]).unwrap();
        fresh.restore(buffer.as_slice()).unwrap();

        assert_eq!(fresh.coefficients(), s.coefficients());
        assert_eq!(fresh.elapsed_time(), 12.5);
        assert_eq!(fresh.original_params(), s.original_params());
        assert_eq!(fresh.label(), "run-a");
        for (a, b) in fresh.solution().iter().zip(s.solution()) {
            assert_relative_eq!(a.re, b.re);
            assert_relative_eq!(a.im, b.im);
        }
    }

    #[test]
    fn zero_rate_record_is_refused_before_writing() {
        let grid = Grid::new(0.1, 4, Dimension::OneD).unwrap();
        let originals = PhysicalParameters { g: 0.0, ..params() };
        let field = vec![Complex64::new(0.1, 0.0); 4];
        let s = Solution::new(grid, 1e-3, 5, 10, Pumping::default(), originals, field).unwrap();
        assert!(!s.coefficients().get(slot::RESERVOIR_INTERACTION).is_finite());

        let mut buffer = Vec::new();
        let err = s.store(&mut buffer).unwrap_err();
        assert!(matches!(
            err,
            NlsError::NonFiniteRecord { what: "coefficients", index: slot::RESERVOIR_INTERACTION }
        ));
        assert!(buffer.is_empty());
    }

    #[test]
    fn every_stored_record_restores() {
        let s = solution_1d(4);
        let mut buffer = Vec::new();
        s.store(&mut buffer).unwrap();
        let mut target = solution_1d(4);
        assert!(target.restore(buffer.as_slice()).is_ok());
    }

    #[test]
    fn restore_defaults_missing_text_fields() {
        let s = solution_1d(2);
        let mut value = serde_json::to_value(s.to_record()).unwrap();
        let object = value.as_object_mut().unwrap();
        object.remove("description");
        object.remove("label");

        let mut target = solution_1d(2);
        target.set_description("stale");
        target.restore(value.to_string().as_bytes()).unwrap();
        assert_eq!(target.description(), "");
        assert_eq!(target.label(), "");
    }

    #[test]
    fn report_mentions_budget_and_nodes() {
        let s = solution_1d(7);
        assert_eq!(s.report(), "Elapsed in 0 seconds with 10 iteration on 7 grid nodes.");
    }
}
