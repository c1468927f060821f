use clap::ValueEnum;
use nls_core::Dimension;
use num_complex::Complex64;
use rand::Rng;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum IcType {
    /// Keep the broadcast `u0`.
    Flat,
    /// Independent uniform noise on every node.
    WhiteNoise,
    /// White noise smoothed by a box blur.
    SmoothNoise,
}

impl IcType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IcType::Flat => "flat",
            IcType::WhiteNoise => "white_noise",
            IcType::SmoothNoise => "smooth_noise",
        }
    }
}

/// Add a complex perturbation of the given amplitude to `field`.
///
/// `n` is the number of nodes per axis; 2D fields are row-major.
pub fn perturb<R: Rng>(
    rng: &mut R,
    field: &mut [Complex64],
    n: usize,
    dimension: Dimension,
    ic: IcType,
    amplitude: f64,
) {
    if ic == IcType::Flat || amplitude == 0.0 {
        return;
    }

    let mut noise: Vec<Complex64> = (0..field.len())
        .map(|_| Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect();

    if ic == IcType::SmoothNoise {
        noise = box_blur(&noise, n, dimension, 2);
    }

    // rescale so the largest kick equals the amplitude
    let mx = noise.iter().map(|v| v.norm()).fold(0.0f64, f64::max);
    if mx > 0.0 {
        for (f, v) in field.iter_mut().zip(&noise) {
            *f += *v * (amplitude / mx);
        }
    }
}

fn box_blur(src: &[Complex64], n: usize, dimension: Dimension, passes: usize) -> Vec<Complex64> {
    let mut cur = src.to_vec();
    let mut tmp = vec![Complex64::new(0.0, 0.0); src.len()];
    let rows = match dimension {
        Dimension::OneD => 1,
        Dimension::TwoD => n,
    };

    for _ in 0..passes {
        for y in 0..rows {
            for x in 0..n {
                let mut sum = Complex64::new(0.0, 0.0);
                let mut cnt = 0.0;
                for yy in y.saturating_sub(1)..=(y + 1).min(rows - 1) {
                    for xx in x.saturating_sub(1)..=(x + 1).min(n - 1) {
                        sum += cur[yy * n + xx];
                        cnt += 1.0;
                    }
                }
                tmp[y * n + x] = sum / cnt;
            }
        }
        std::mem::swap(&mut cur, &mut tmp);
    }
    cur
}
