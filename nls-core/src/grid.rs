use serde::{Deserialize, Serialize};

use crate::error::{NlsError, Result};
use crate::pumping::Pumping;

/// Spatial dimensionality of a model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    /// Axially symmetric problem on the radial half-line.
    OneD,
    /// Square Cartesian mesh.
    TwoD,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::OneD => "1d",
            Dimension::TwoD => "2d",
        }
    }
}

/// Uniform spatial discretization.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid {
    dx: f64,
    num_nodes: usize,
    dimension: Dimension,
}

impl Grid {
    /// Fails when a square mesh of `num_nodes` per axis would not fit in `usize`.
    pub fn new(dx: f64, num_nodes: usize, dimension: Dimension) -> Result<Grid> {
        if dimension == Dimension::TwoD && square(num_nodes).is_none() {
            return Err(NlsError::Configuration(format!(
                "{num_nodes} nodes per axis overflow a square mesh"
            )));
        }
        Ok(Grid { dx, num_nodes, dimension })
    }

    /// Pick the dimension that matches a field of length `field_len`.
    ///
    /// When both readings fit (`num_nodes` of 0 or 1) the `hint` wins, then 1D.
    pub fn infer(
        dx: f64,
        num_nodes: usize,
        field_len: usize,
        hint: Option<Dimension>,
    ) -> Result<Grid> {
        let one = field_len == num_nodes;
        let two = square(num_nodes) == Some(field_len);

        let dimension = match (one, two, hint) {
            (true, true, Some(d)) => d,
            (true, true, None) | (true, false, _) => Dimension::OneD,
            (false, true, _) => Dimension::TwoD,
            (false, false, _) => {
                let expected = match hint {
                    Some(Dimension::TwoD) => square(num_nodes).unwrap_or(usize::MAX),
                    _ => num_nodes,
                };
                return Err(NlsError::ShapeMismatch { expected, found: field_len });
            }
        };

        Grid::new(dx, num_nodes, dimension)
    }

    pub fn dx(&self) -> f64 {
        self.dx
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Number of values in a field living on this grid.
    pub fn field_len(&self) -> usize {
        match self.dimension {
            Dimension::OneD => self.num_nodes,
            // checked in `Grid::new`
            Dimension::TwoD => self.num_nodes * self.num_nodes,
        }
    }

    pub fn check_field(&self, len: usize) -> Result<()> {
        if len != self.field_len() {
            return Err(NlsError::ShapeMismatch { expected: self.field_len(), found: len });
        }
        Ok(())
    }

    /// Radial nodes `i·dx` in 1D, the shared axis of the square mesh in 2D.
    pub fn coordinates(&self) -> Vec<f64> {
        let n = self.num_nodes;
        match self.dimension {
            Dimension::OneD => (0..n).map(|i| i as f64 * self.dx).collect(),
            Dimension::TwoD => {
                let right = n as f64 * self.dx / 2.0;
                linspace(-right, right, n)
            }
        }
    }

    /// Meshed coordinates `(X, Y)` in field layout (row-major, x fastest).
    ///
    /// In 1D `X` holds the radial nodes and `Y` is zero.
    pub fn mesh(&self) -> (Vec<f64>, Vec<f64>) {
        let axis = self.coordinates();
        match self.dimension {
            Dimension::OneD => {
                let ys = vec![0.0; axis.len()];
                (axis, ys)
            }
            Dimension::TwoD => {
                let n = self.num_nodes;
                let mut xs = Vec::with_capacity(n * n);
                let mut ys = Vec::with_capacity(n * n);
                for &y in &axis {
                    for &x in &axis {
                        xs.push(x);
                        ys.push(y);
                    }
                }
                (xs, ys)
            }
        }
    }

    /// Pump intensity at every node, in field layout.
    pub fn sample(&self, pumping: &Pumping) -> Vec<f64> {
        match self.dimension {
            Dimension::OneD => pumping.evaluate_line(&self.coordinates()),
            Dimension::TwoD => {
                let (xs, ys) = self.mesh();
                pumping.evaluate_mesh(&xs, &ys)
            }
        }
    }
}

fn square(n: usize) -> Option<usize> {
    n.checked_mul(n)
}

fn linspace(left: f64, right: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![left],
        _ => {
            let step = (right - left) / (n - 1) as f64;
            (0..n).map(|i| left + i as f64 * step).collect()
        }
    }
}
