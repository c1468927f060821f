//! Driven-dissipative exciton-polariton condensate with an adiabatically
//! eliminated exciton reservoir.
//!
//! A [`Problem`] turns a [`ScenarioConfig`] into a [`Model`]: a [`Solution`]
//! (grid, coefficients, pumping, fields, run metadata) together with the
//! integrator that advances it. Solving mutates the solution in place.
//!
//! ```no_run
//! use nls_core::{ModelKind, PhysicalParameters, Problem, Pumping, ScenarioConfig};
//!
//! let originals =
//!     PhysicalParameters { r: 0.05, gamma: 0.566, g: 1.0e-3, tilde_g: 0.011, gamma_r: 10.0 };
//! let mut config = ScenarioConfig::new(ModelKind::TwoD, originals);
//! config.pumping = Some(Pumping::gaussian(3.0, 0.0, 6.84931506849));
//!
//! let mut model = Problem::model(config)?;
//! let solution = model.solve(None)?;
//! println!("{}", solution.report());
//! # Ok::<(), nls_core::NlsError>(())
//! ```

pub mod error;
pub mod grid;
pub mod params;
pub mod problem;
pub mod pumping;
pub mod solution;
pub mod solver;
pub mod sweep;

pub use error::{NlsError, Result};
pub use grid::{Dimension, Grid};
pub use params::{
    COEFFICIENT_COUNT, Coefficients, PartialParameters, PhysicalParameters, REFERENCE_TIME,
};
pub use problem::{Defaults, InitialCondition, Model, ModelKind, Problem, ScenarioConfig};
pub use pumping::{GaussianPumping, Pumping};
pub use solution::{Profiles, Solution, SolutionRecord};
pub use solver::{Integrator, Solver1D, Solver2D, Stencil};
pub use sweep::{Animation, FrameSink, SweepKind};
