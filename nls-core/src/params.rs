use serde::{Deserialize, Serialize};

use crate::error::{NlsError, Result};

/// Reference time scale in seconds used to make rates dimensionless.
pub const REFERENCE_TIME: f64 = 1.0;

/// Number of slots in the coefficient vector. Unused slots stay zero.
pub const COEFFICIENT_COUNT: usize = 23;

/// Slot indices of the coefficient vector.
pub mod slot {
    // condensate equation
    pub const TIME: usize = 0;
    pub const LAPLACIAN: usize = 1;
    pub const GAIN: usize = 2;
    pub const DAMPING: usize = 3;
    pub const NONLINEARITY: usize = 4;
    pub const RESERVOIR_COUPLING: usize = 5;

    // reservoir equation
    pub const RESERVOIR_TIME: usize = 10;
    pub const PUMPING: usize = 11;
    pub const RESERVOIR_DAMPING: usize = 12;
    pub const RESERVOIR_INTERACTION: usize = 13;
    pub const RESERVOIR_DIFFUSION: usize = 14;
}

/// Physical constants of the polariton system.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicalParameters {
    /// Stimulated scattering rate.
    #[serde(rename = "R")]
    pub r: f64,
    /// Polariton decay rate.
    pub gamma: f64,
    /// Reservoir-exciton interaction.
    pub g: f64,
    /// Condensate interaction strength.
    pub tilde_g: f64,
    /// Reservoir decay rate.
    #[serde(rename = "gamma_R")]
    pub gamma_r: f64,
}

/// Physical constants as they arrive from a configuration file; any of them may be absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialParameters {
    #[serde(rename = "R", default)]
    pub r: Option<f64>,
    #[serde(default)]
    pub gamma: Option<f64>,
    #[serde(default)]
    pub g: Option<f64>,
    #[serde(default)]
    pub tilde_g: Option<f64>,
    #[serde(rename = "gamma_R", default)]
    pub gamma_r: Option<f64>,
}

impl TryFrom<PartialParameters> for PhysicalParameters {
    type Error = NlsError;

    fn try_from(p: PartialParameters) -> Result<Self> {
        Ok(PhysicalParameters {
            r: p.r.ok_or(NlsError::MissingParameter("R"))?,
            gamma: p.gamma.ok_or(NlsError::MissingParameter("gamma"))?,
            g: p.g.ok_or(NlsError::MissingParameter("g"))?,
            tilde_g: p.tilde_g.ok_or(NlsError::MissingParameter("tilde_g"))?,
            gamma_r: p.gamma_r.ok_or(NlsError::MissingParameter("gamma_R"))?,
        })
    }
}

impl From<PhysicalParameters> for PartialParameters {
    fn from(p: PhysicalParameters) -> Self {
        PartialParameters {
            r: Some(p.r),
            gamma: Some(p.gamma),
            g: Some(p.g),
            tilde_g: Some(p.tilde_g),
            gamma_r: Some(p.gamma_r),
        }
    }
}

/// Dimensionless coefficients of the condensate and reservoir equations.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Coefficients([f64; COEFFICIENT_COUNT]);

impl Coefficients {
    /// Derive the coefficients from physical constants.
    ///
    /// Zero `tilde_g`, `gamma_R` or `g` are not rejected; they produce
    /// non-finite slots and keeping them away is up to the caller.
    pub fn derive(p: &PhysicalParameters) -> Coefficients {
        let t0 = REFERENCE_TIME;
        let mut c = [0.0; COEFFICIENT_COUNT];

        c[slot::TIME] = 1.0;
        c[slot::LAPLACIAN] = 1.0;
        c[slot::GAIN] = p.r / (4.0 * p.tilde_g);
        c[slot::DAMPING] = p.gamma * t0 / 2.0;
        c[slot::NONLINEARITY] = 1.0;
        c[slot::RESERVOIR_COUPLING] = 1.0;

        c[slot::RESERVOIR_TIME] = 0.0;
        c[slot::PUMPING] = 2.0 * p.tilde_g * t0 / p.gamma_r;
        c[slot::RESERVOIR_DAMPING] = 1.0;
        c[slot::RESERVOIR_INTERACTION] = p.r / (p.gamma_r * p.g);
        c[slot::RESERVOIR_DIFFUSION] = 0.0;

        Coefficients(c)
    }

    pub fn get(&self, index: usize) -> f64 {
        self.0[index]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Reservoir density `c11·p / (c12 + c13·u)` for pumping `p` and condensate density `u`.
    pub fn reservoir_density(&self, p: f64, u: f64) -> f64 {
        self.0[slot::PUMPING] * p / self.reservoir_denominator(u)
    }

    pub fn reservoir_denominator(&self, u: f64) -> f64 {
        self.0[slot::RESERVOIR_DAMPING] + self.0[slot::RESERVOIR_INTERACTION] * u
    }
}

impl TryFrom<Vec<f64>> for Coefficients {
    type Error = NlsError;

    fn try_from(v: Vec<f64>) -> Result<Self> {
        let n = v.len();
        let array: [f64; COEFFICIENT_COUNT] = v.try_into().map_err(|_| {
            NlsError::Configuration(format!(
                "expected {COEFFICIENT_COUNT} coefficients, got {n}"
            ))
        })?;
        Ok(Coefficients(array))
    }
}

impl From<Coefficients> for Vec<f64> {
    fn from(c: Coefficients) -> Self {
        c.0.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference() -> PhysicalParameters {
        PhysicalParameters {
            r: 0.05,
            gamma: 0.566,
            g: 1.0e-3,
            tilde_g: 0.011,
            gamma_r: 10.0,
        }
    }

    #[test]
    fn derives_reference_coefficients() {
        let c = Coefficients::derive(&reference());

        assert_relative_eq!(c.get(slot::GAIN), 0.05 / (4.0 * 0.011));
        assert_relative_eq!(c.get(slot::GAIN), 1.13636, epsilon = 1e-5);
        assert_relative_eq!(c.get(slot::DAMPING), 0.283, epsilon = 1e-12);
        assert_relative_eq!(c.get(slot::PUMPING), 0.0022, epsilon = 1e-12);
        assert_relative_eq!(c.get(slot::RESERVOIR_INTERACTION), 5.0, epsilon = 1e-12);
        assert_eq!(c.get(slot::TIME), 1.0);
        assert_eq!(c.get(slot::RESERVOIR_TIME), 0.0);
        assert_eq!(c.get(slot::RESERVOIR_DIFFUSION), 0.0);
    }

    #[test]
    fn reserved_slots_stay_zero() {
        let c = Coefficients::derive(&reference());
        for i in (6..10).chain(15..COEFFICIENT_COUNT) {
            assert_eq!(c.get(i), 0.0, "slot {i}");
        }
    }

    #[test]
    fn derive_is_deterministic() {
        let p = reference();
        assert_eq!(Coefficients::derive(&p), Coefficients::derive(&p));
        assert_eq!(p, reference());
    }

    #[test]
    fn missing_parameter_is_named() {
        let mut partial = PartialParameters::from(reference());
        partial.tilde_g = None;

        let err = PhysicalParameters::try_from(partial).unwrap_err();
        assert!(matches!(err, NlsError::MissingParameter("tilde_g")));
    }

    #[test]
    fn parameters_use_original_key_names() {
        let json = r#"{"R": 0.05, "gamma": 0.566, "g": 0.001, "tilde_g": 0.011, "gamma_R": 10}"#;
        let p: PhysicalParameters = serde_json::from_str(json).unwrap();
        assert_eq!(p, reference());
    }

    #[test]
    fn rejects_short_coefficient_vector() {
        assert!(Coefficients::try_from(vec![1.0; 5]).is_err());
    }

    #[test]
    fn reservoir_density_matches_relation() {
        let c = Coefficients::derive(&reference());
        assert_relative_eq!(
            c.reservoir_density(3.0, 0.2),
            0.0022 * 3.0 / (1.0 + 5.0 * 0.2),
            epsilon = 1e-12
        );
    }
}
