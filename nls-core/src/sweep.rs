//! Frame-by-frame scenarios: advance the model or change its pumping, then hand
//! the derived profiles to a sink that renders or records them.

use std::time::Instant;

use log::info;

use crate::error::Result;
use crate::problem::Model;
use crate::pumping::Pumping;
use crate::solution::Profiles;

/// Peak power of each spot in a radius sweep.
pub const RADIUS_SWEEP_POWER: f64 = 3.0;
/// Variance of each spot in a radius sweep.
pub const RADIUS_SWEEP_VARIATION: f64 = 6.84931506849;

/// Receives one frame per sweep step.
pub trait FrameSink {
    fn grab_frame(&mut self, frame: usize, profiles: &Profiles) -> Result<()>;
}

impl FrameSink for Vec<Profiles> {
    fn grab_frame(&mut self, _frame: usize, profiles: &Profiles) -> Result<()> {
        self.push(profiles.clone());
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SweepKind {
    /// Solve `step` more iterations per frame.
    IterationIncrease { step: usize },
    /// Two symmetric Gaussian spots at `±frame·step`, full solve per frame.
    PumpingRadiusIncrease { step: f64 },
    /// Pumping power `frame·step`, full solve per frame.
    PumpingPowerIncrease { step: f64 },
}

impl SweepKind {
    fn step_label(&self) -> String {
        match self {
            SweepKind::IterationIncrease { step } => step.to_string(),
            SweepKind::PumpingRadiusIncrease { step }
            | SweepKind::PumpingPowerIncrease { step } => step.to_string(),
        }
    }
}

/// Runs a [`SweepKind`] over `frames + 1` frames.
#[derive(Clone, Debug)]
pub struct Animation {
    kind: SweepKind,
    frames: usize,
    elapsed_time: f64,
}

impl Animation {
    pub fn new(kind: SweepKind, frames: usize) -> Self {
        Animation { kind, frames, elapsed_time: 0.0 }
    }

    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_time
    }

    pub fn animate(&mut self, model: &mut Model, sink: &mut dyn FrameSink) -> Result<()> {
        let start = Instant::now();
        let result = self.run_frames(model, sink);
        self.elapsed_time += start.elapsed().as_secs_f64();
        result
    }

    fn run_frames(&self, model: &mut Model, sink: &mut dyn FrameSink) -> Result<()> {
        for frame in 0..=self.frames {
            match self.kind {
                SweepKind::IterationIncrease { step } => {
                    let solution = model.solve(Some(step))?;
                    let field = solution.solution().to_vec();
                    solution.set_initial_solution(field)?;
                }
                SweepKind::PumpingRadiusIncrease { step } => {
                    let origin = frame as f64 * step;
                    let spot =
                        |x0| Pumping::gaussian(RADIUS_SWEEP_POWER, x0, RADIUS_SWEEP_VARIATION);
                    let pumping = spot(origin) + spot(-origin);
                    model.solution_mut().set_pumping(pumping);
                    let solution = model.solve(None)?;
                    let field = solution.solution().to_vec();
                    solution.set_initial_solution(field)?;
                }
                SweepKind::PumpingPowerIncrease { step } => {
                    model.solution_mut().pumping_mut().set_power(frame as f64 * step);
                    model.solve(None)?;
                }
            }

            sink.grab_frame(frame, &model.solution().profiles()?)?;
            info!("frame {}/{} grabbed", frame, self.frames);
        }
        Ok(())
    }

    pub fn report(&self) -> String {
        format!(
            "Elapsed in {} seconds with {} frames and {} step.",
            self.elapsed_time,
            self.frames,
            self.kind.step_label()
        )
    }
}
