use nls_core::{Model, ModelKind, PhysicalParameters, Problem, Pumping, ScenarioConfig};
use wasm_bindgen::prelude::*;

const POWER: f64 = 3.0;
const VARIATION: f64 = 6.84931506849;

#[wasm_bindgen]
pub struct Simulation {
    inner: Model,
}

#[wasm_bindgen]
impl Simulation {
    /// `model` is "1d", "2d" or "default".
    #[wasm_bindgen(constructor)]
    pub fn new(model: &str, num_nodes: usize) -> Result<Simulation, JsValue> {
        let kind: ModelKind = model.parse().map_err(to_js)?;
        let originals =
            PhysicalParameters { r: 0.05, gamma: 0.566, g: 1.0e-3, tilde_g: 0.011, gamma_r: 10.0 };
        let mut config = ScenarioConfig::new(kind, originals);
        config.num_nodes = Some(num_nodes);
        config.pumping = Some(Pumping::gaussian(POWER, 0.0, VARIATION));
        let inner = Problem::model(config).map_err(to_js)?;
        Ok(Simulation { inner })
    }

    pub fn n(&self) -> usize {
        self.inner.solution().number_of_nodes()
    }

    pub fn iterations(&self) -> f64 {
        self.inner.solution().iterations_done() as f64
    }

    pub fn time(&self) -> f64 {
        self.inner.solution().time()
    }

    pub fn set_pumping_power(&mut self, power: f64) {
        self.inner.solution_mut().pumping_mut().set_power(power);
    }

    /// Two symmetric spots at `±x0`.
    pub fn set_pumping_origin(&mut self, x0: f64) {
        let power = self.inner.solution().pumping().power();
        let pumping =
            Pumping::gaussian(power, x0, VARIATION) + Pumping::gaussian(power, -x0, VARIATION);
        self.inner.solution_mut().set_pumping(pumping);
    }

    /// Start over from the initial field.
    pub fn reset(&mut self) {
        self.inner.solution_mut().reset();
    }

    // Copy-based JS access
    pub fn get_density(&self) -> Vec<f32> {
        self.inner.solution().solution().iter().map(|v| v.norm_sqr() as f32).collect()
    }

    pub fn get_reservoir(&self) -> Result<Vec<f32>, JsValue> {
        let profiles = self.inner.solution().profiles().map_err(to_js)?;
        Ok(profiles.reservoir_density.iter().map(|&v| v as f32).collect())
    }

    pub fn get_pumping(&self) -> Vec<f32> {
        self.inner.solution().pumping_sample().iter().map(|&v| v as f32).collect()
    }

    // Step + timing (performance.now, Instant is unavailable on wasm32)
    pub fn step(&mut self, num_iters: usize) -> Result<StepInfo, JsValue> {
        let t0 = now_ms();
        let solution = self.inner.advance(num_iters).map_err(to_js)?;
        let t1 = now_ms();
        let elapsed = solution.elapsed_time() + (t1 - t0) / 1000.0;
        solution.set_elapsed_time(elapsed);
        Ok(StepInfo {
            iterations: num_iters as f64,
            compute_ms: t1 - t0,
            time: solution.time(),
        })
    }
}

#[wasm_bindgen]
pub struct StepInfo {
    // f64 like `Simulation::iterations`
    iterations: f64,
    compute_ms: f64,
    time: f64,
}

#[wasm_bindgen]
impl StepInfo {
    pub fn iterations(&self) -> f64 { self.iterations }
    pub fn compute_ms(&self) -> f64 { self.compute_ms }
    pub fn time(&self) -> f64 { self.time }
}

fn to_js(e: nls_core::NlsError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn now_ms() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}
