use serde::{Deserialize, Serialize};

/// Gaussian pumping spot centered at `(x0, 0)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianPumping {
    pub power: f64,
    #[serde(default)]
    pub x0: f64,
    /// Spatial variance of the spot.
    pub variation: f64,
}

impl GaussianPumping {
    pub fn new(power: f64, x0: f64, variation: f64) -> Self {
        GaussianPumping { power, x0, variation }
    }

    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        let dx = x - self.x0;
        self.power * (-(dx * dx + y * y) / (2.0 * self.variation)).exp()
    }
}

impl Default for GaussianPumping {
    fn default() -> Self {
        GaussianPumping { power: 1.0, x0: 0.0, variation: 1.0 }
    }
}

/// External pump intensity as a function of position.
///
/// Profiles compose additively: `a + b` evaluates to `a(x, y) + b(x, y)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pumping {
    Gaussian(GaussianPumping),
    Sum { sources: Vec<Pumping> },
}

impl Pumping {
    pub fn gaussian(power: f64, x0: f64, variation: f64) -> Self {
        Pumping::Gaussian(GaussianPumping::new(power, x0, variation))
    }

    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        match self {
            Pumping::Gaussian(g) => g.evaluate(x, y),
            Pumping::Sum { sources } => sources.iter().map(|s| s.evaluate(x, y)).sum(),
        }
    }

    /// Intensity at radius `r` of an axially symmetric problem.
    pub fn evaluate_radial(&self, r: f64) -> f64 {
        self.evaluate(r, 0.0)
    }

    pub fn evaluate_line(&self, r: &[f64]) -> Vec<f64> {
        r.iter().map(|&r| self.evaluate_radial(r)).collect()
    }

    /// Evaluate over meshed coordinates `xs[i], ys[i]`; both slices have the same length.
    pub fn evaluate_mesh(&self, xs: &[f64], ys: &[f64]) -> Vec<f64> {
        xs.iter().zip(ys).map(|(&x, &y)| self.evaluate(x, y)).collect()
    }

    /// Peak power; for a composite, the power of its first source.
    pub fn power(&self) -> f64 {
        match self {
            Pumping::Gaussian(g) => g.power,
            Pumping::Sum { sources } => sources.first().map(Pumping::power).unwrap_or(0.0),
        }
    }

    /// Set the peak power of every source.
    pub fn set_power(&mut self, power: f64) {
        match self {
            Pumping::Gaussian(g) => g.power = power,
            Pumping::Sum { sources } => sources.iter_mut().for_each(|s| s.set_power(power)),
        }
    }

    fn into_sources(self) -> Vec<Pumping> {
        match self {
            Pumping::Sum { sources } => sources,
            single => vec![single],
        }
    }
}

impl Default for Pumping {
    fn default() -> Self {
        Pumping::Gaussian(GaussianPumping::default())
    }
}

impl std::ops::Add for Pumping {
    type Output = Pumping;

    fn add(self, rhs: Pumping) -> Pumping {
        let mut sources = self.into_sources();
        sources.extend(rhs.into_sources());
        Pumping::Sum { sources }
    }
}
