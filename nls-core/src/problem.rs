//! Scenario factory: typed configuration with per-model defaults.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use log::info;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{NlsError, Result};
use crate::grid::{Dimension, Grid};
use crate::params::{PartialParameters, PhysicalParameters};
use crate::pumping::Pumping;
use crate::solution::Solution;
use crate::solver::{DEFAULT_CHECK_INTERVAL, Integrator, Solver1D, Solver2D};

/// Which model to build. `"default"` reads as `"1d"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelKind {
    #[default]
    OneD,
    TwoD,
}

impl ModelKind {
    pub fn dimension(self) -> Dimension {
        match self {
            ModelKind::OneD => Dimension::OneD,
            ModelKind::TwoD => Dimension::TwoD,
        }
    }
}

impl From<Dimension> for ModelKind {
    fn from(d: Dimension) -> Self {
        match d {
            Dimension::OneD => ModelKind::OneD,
            Dimension::TwoD => ModelKind::TwoD,
        }
    }
}

impl FromStr for ModelKind {
    type Err = NlsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1d" | "default" => Ok(ModelKind::OneD),
            "2d" => Ok(ModelKind::TwoD),
            other => Err(NlsError::Configuration(format!("unknown model `{other}`"))),
        }
    }
}

impl TryFrom<String> for ModelKind {
    type Error = NlsError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ModelKind> for String {
    fn from(k: ModelKind) -> Self {
        k.to_string()
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dimension().as_str())
    }
}

/// Initial condensate field: a real or complex constant broadcast over the grid,
/// or an explicit field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitialCondition {
    Real(f64),
    Complex(Complex64),
    Field(Vec<Complex64>),
}

impl InitialCondition {
    fn into_field(self, grid: &Grid) -> Result<Vec<Complex64>> {
        match self {
            InitialCondition::Real(v) => Ok(vec![Complex64::new(v, 0.0); grid.field_len()]),
            InitialCondition::Complex(c) => Ok(vec![c; grid.field_len()]),
            InitialCondition::Field(field) => {
                grid.check_field(field.len())?;
                Ok(field)
            }
        }
    }
}

/// Scenario description. Absent fields take the defaults of the chosen model.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// When absent, inferred from an explicit `u0` field and `num_nodes`, else 1D.
    pub model: Option<ModelKind>,
    pub dx: Option<f64>,
    pub dt: Option<f64>,
    /// Simulated time of the initial field.
    pub t0: Option<f64>,
    pub u0: Option<InitialCondition>,
    pub order: Option<usize>,
    pub pumping: Option<Pumping>,
    pub num_nodes: Option<usize>,
    pub num_iters: Option<usize>,
    pub check_interval: Option<usize>,
    pub original_params: PartialParameters,
    pub description: Option<String>,
    pub label: Option<String>,
}

impl ScenarioConfig {
    pub fn new(model: ModelKind, original_params: PhysicalParameters) -> Self {
        ScenarioConfig {
            model: Some(model),
            original_params: original_params.into(),
            ..Default::default()
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    fn resolve_kind(&self) -> Result<ModelKind> {
        if let Some(kind) = self.model {
            return Ok(kind);
        }
        match (&self.u0, self.num_nodes) {
            (Some(InitialCondition::Field(field)), Some(n)) => {
                let grid = Grid::infer(self.dx.unwrap_or(DEFAULT_DX), n, field.len(), None)?;
                Ok(grid.dimension().into())
            }
            _ => Ok(ModelKind::OneD),
        }
    }
}

const DEFAULT_DX: f64 = 1.0e-1;

/// Per-model defaults applied to absent configuration fields.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Defaults {
    pub dx: f64,
    pub dt: f64,
    pub t0: f64,
    pub u0: f64,
    pub order: usize,
    pub num_nodes: usize,
    pub num_iters: usize,
}

impl Defaults {
    pub fn for_kind(kind: ModelKind) -> Defaults {
        match kind {
            ModelKind::OneD => Defaults {
                dx: DEFAULT_DX,
                dt: 1.0e-3,
                t0: 0.0,
                u0: 1.0e-1,
                order: 5,
                num_nodes: 1000,
                num_iters: 100_000,
            },
            ModelKind::TwoD => Defaults {
                dx: DEFAULT_DX,
                dt: 1.0e-3,
                t0: 0.0,
                u0: 1.0e-1,
                order: 3,
                num_nodes: 40,
                num_iters: 1000,
            },
        }
    }
}

/// Builds models from scenario configurations.
pub struct Problem;

impl Problem {
    pub fn model(config: ScenarioConfig) -> Result<Model> {
        let kind = config.resolve_kind()?;
        let d = Defaults::for_kind(kind);

        let originals = PhysicalParameters::try_from(config.original_params)?;
        let dx = config.dx.unwrap_or(d.dx);
        let dt = config.dt.unwrap_or(d.dt);
        let t0 = config.t0.unwrap_or(d.t0);
        let order = config.order.unwrap_or(d.order);
        let num_nodes = config.num_nodes.unwrap_or(d.num_nodes);
        let num_iters = config.num_iters.unwrap_or(d.num_iters);
        let pumping = config.pumping.unwrap_or_default();
        let check_interval = config.check_interval.unwrap_or(DEFAULT_CHECK_INTERVAL);

        let grid = Grid::new(dx, num_nodes, kind.dimension())?;
        let u0 = config.u0.unwrap_or(InitialCondition::Real(d.u0)).into_field(&grid)?;

        info!("model {kind}: dt {dt}, dx {dx}, order {order}, num_nodes {num_nodes}");
        info!("num_iters {num_iters}, pumping {pumping:?}, originals {originals:?}");

        let mut solution = Solution::new(grid, dt, order, num_iters, pumping, originals, u0)?
            .with_initial_time(t0);
        if let Some(description) = config.description {
            solution.set_description(description);
        }
        if let Some(label) = config.label {
            solution.set_label(label);
        }

        let solver: Box<dyn Integrator> = match kind {
            ModelKind::OneD => {
                Box::new(Solver1D::new(&solution)?.with_check_interval(check_interval))
            }
            ModelKind::TwoD => {
                Box::new(Solver2D::new(&solution)?.with_check_interval(check_interval))
            }
        };

        Ok(Model { kind, solution, solver })
    }
}

/// A solution paired with the solver that advances it.
pub struct Model {
    kind: ModelKind,
    solution: Solution,
    solver: Box<dyn Integrator>,
}

impl Model {
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Advance by `num_iters` steps (the solution's budget when `None`).
    pub fn solve(&mut self, num_iters: Option<usize>) -> Result<&mut Solution> {
        self.solver.solve(&mut self.solution, num_iters)?;
        Ok(&mut self.solution)
    }

    /// Like [`Model::solve`] but without touching the elapsed time.
    pub fn advance(&mut self, num_iters: usize) -> Result<&mut Solution> {
        self.solver.advance(&mut self.solution, num_iters)?;
        Ok(&mut self.solution)
    }

    pub fn solution(&self) -> &Solution {
        &self.solution
    }

    pub fn solution_mut(&mut self) -> &mut Solution {
        &mut self.solution
    }

    pub fn into_solution(self) -> Solution {
        self.solution
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("kind", &self.kind)
            .field("solver", &self.solver.name())
            .field("num_nodes", &self.solution.number_of_nodes())
            .field("iterations", &self.solution.iterations_done())
            .finish()
    }
}
