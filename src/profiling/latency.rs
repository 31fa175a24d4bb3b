/// Per-sample inference latency sampling
use candle_core::{Device, Tensor};
use std::time::Instant;

use crate::models::Model;

/// Per-sample latency summary, in seconds
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LatencyStats {
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    /// One per timed batch: elapsed time / batch size
    pub samples: Vec<f64>,
}

impl LatencyStats {
    /// Mean and population standard deviation of `samples`
    pub fn from_samples(samples: Vec<f64>) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
                samples,
            };
        }

        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|&t| (t - mean).powi(2)).sum::<f64>() / n as f64;

        Self {
            mean,
            std_dev: var.sqrt(),
            samples,
        }
    }
}

/// Time `model.predict` on `repeat` random batches of `batch_shape`.
///
/// See [`sample_latency_with`].
pub fn sample_latency<M: Model + ?Sized>(
    model: &M,
    batch_shape: &[usize],
    repeat: usize,
) -> crate::Result<LatencyStats> {
    let device = model.device().clone();
    sample_latency_with(
        |batch| model.predict(batch).map(|_| ()),
        batch_shape,
        repeat,
        &device,
    )
}

/// Time `infer` on `repeat` random batches of `batch_shape`.
///
/// One untimed warm-up call runs first, so `infer` is invoked `repeat + 1`
/// times. Inputs are uniform in `[0, 1)` and generated outside the timed
/// region. `batch_shape[0]` is the batch size and the per-sample divisor.
/// The first error from `infer` is returned immediately.
pub fn sample_latency_with<F>(
    mut infer: F,
    batch_shape: &[usize],
    repeat: usize,
    device: &Device,
) -> crate::Result<LatencyStats>
where
    F: FnMut(&Tensor) -> crate::Result<()>,
{
    if repeat == 0 {
        return Err(crate::ExperimentError::Config(
            "latency repeat count must be > 0".to_string(),
        ));
    }
    let batch_size = match batch_shape.first() {
        Some(&b) if b > 0 => b,
        _ => {
            return Err(crate::ExperimentError::Config(format!(
                "batch shape must start with a non-zero batch size, got {:?}",
                batch_shape
            )))
        }
    };

    // drop first run
    infer(&random_batch(batch_shape, device)?)?;

    let mut elapsed = Vec::with_capacity(repeat);
    for _ in 0..repeat {
        let batch = random_batch(batch_shape, device)?;
        let start = Instant::now();
        infer(&batch)?;
        elapsed.push(start.elapsed().as_secs_f64());
    }

    let per_sample = elapsed.into_iter().map(|t| t / batch_size as f64).collect();
    let stats = LatencyStats::from_samples(per_sample);

    log::info!(
        "Latency over {} batches of {:?}: {:.6e} s/sample (std {:.3e})",
        repeat,
        batch_shape,
        stats.mean,
        stats.std_dev
    );

    Ok(stats)
}

fn random_batch(batch_shape: &[usize], device: &Device) -> candle_core::Result<Tensor> {
    Tensor::rand(0f32, 1f32, batch_shape.to_vec(), device)
}
