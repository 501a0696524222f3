use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use ndarray::{ArrayD, IxDyn};
use serde_json::json;

use calibration_store::data::loader::save_file;
use calibration_store::{fetch_results_as_dataset, MeasurementAxis};

/// Complex response of a resonator probed at `f`: a Lorentzian dip.
fn lorentzian(f: f64, f0: f64, kappa: f64, depth: f64) -> (f64, f64) {
    let delta = (f - f0) / (kappa / 2.0);
    let denom = 1.0 + delta * delta;
    (1.0 - depth / denom, depth * delta / denom)
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() -> Result<()> {
    let root = PathBuf::from(
        std::env::args()
            .nth(1)
            .unwrap_or_else(|| "sample_storage".to_string()),
    );
    let folder = root.join("2024-06-01").join("#1_resonator_spectroscopy");
    fs::create_dir_all(&folder).with_context(|| format!("creating {}", folder.display()))?;

    let mut rng = SimpleRng::new(42);

    // Detuning sweep: -5 MHz → +5 MHz, 101 points
    let detunings: Vec<f64> = (0..101).map(|i| -5e6 + i as f64 * 1e5).collect();
    let qubits = ["qA1", "qA2", "qA3"];
    let resonators = [(7.12e9, 0.4e6), (7.25e9, 1.6e6), (7.31e9, -0.9e6)];
    let noise = 0.01;

    // One I and one Q stream per qubit, as the acquisition program saves them
    let mut handles: BTreeMap<String, ArrayD<f64>> = BTreeMap::new();
    for (i, &(_, offset)) in resonators.iter().enumerate() {
        let (re, im): (Vec<f64>, Vec<f64>) = detunings
            .iter()
            .map(|&df| {
                let (re, im) = lorentzian(df, offset, 1.2e6, 0.8);
                (re + rng.gauss(0.0, noise), im + rng.gauss(0.0, noise))
            })
            .unzip();
        handles.insert(
            format!("I{}", i + 1),
            ArrayD::from_shape_vec(IxDyn(&[detunings.len()]), re)?,
        );
        handles.insert(
            format!("Q{}", i + 1),
            ArrayD::from_shape_vec(IxDyn(&[detunings.len()]), im)?,
        );
    }

    let mut axis = MeasurementAxis::new().with("detuning", detunings.clone());
    let ds = fetch_results_as_dataset(&handles, &qubits, &mut axis)?;
    save_file(&ds, &folder.join("ds.parquet"))?;

    let metadata = json!({
        "initial_parameters": {
            "qubits": qubits,
            "num_averages": 100,
            "frequency_span_in_mhz": 10.0,
            "frequency_step_in_mhz": 0.1,
            "load_data_id": null
        },
        "outcomes": { "qA1": "successful", "qA2": "successful", "qA3": "successful" }
    });
    fs::write(folder.join("data.json"), serde_json::to_string_pretty(&metadata)?)?;

    let state_qubits: serde_json::Map<String, serde_json::Value> = qubits
        .iter()
        .zip(resonators)
        .map(|(name, (f_res, _))| {
            (
                name.to_string(),
                json!({ "id": name, "resonator": { "frequency": f_res } }),
            )
        })
        .collect();
    let state = json!({ "qubits": state_qubits, "active_qubit_names": qubits });
    fs::write(folder.join("quam_state.json"), serde_json::to_string_pretty(&state)?)?;

    println!(
        "Wrote run #1 ({} qubits, {} detunings) to {}",
        qubits.len(),
        detunings.len(),
        folder.display()
    );
    Ok(())
}
