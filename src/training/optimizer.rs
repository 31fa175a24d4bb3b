/// SGD optimizer with momentum and Nesterov updates
///
/// Implements candle-nn's `Optimizer` trait so `backward_step` can drive it.
use candle_core::backprop::GradStore;
use candle_core::{Result, Var};
use candle_nn::Optimizer;

/// SGD optimizer configuration
///
/// Serialized as-is into the experiment log's `optimizer` entry.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SgdConfig {
    /// Learning rate
    pub lr: f64,
    /// Momentum factor (0 disables the velocity buffer)
    pub momentum: f64,
    /// Use the Nesterov look-ahead update
    pub nesterov: bool,
    /// L2 penalty added to every gradient
    pub weight_decay: f64,
}

impl Default for SgdConfig {
    fn default() -> Self {
        Self {
            lr: 0.01,
            momentum: 0.0,
            nesterov: false,
            weight_decay: 0.0,
        }
    }
}

/// Parameter with its velocity buffer
#[derive(Debug)]
struct ParamState {
    var: Var,
    velocity: Var,
}

/// Momentum SGD
///
/// With gradient `g` (plus `weight_decay * p`) and momentum `mu`:
/// - `v = mu * v - lr * g`
/// - plain: `p = p + v`
/// - Nesterov: `p = p + mu * v - lr * g`
#[derive(Debug)]
pub struct NesterovSgd {
    config: SgdConfig,
    params: Vec<ParamState>,
}

impl NesterovSgd {
    /// Current configuration, `lr` included
    pub fn config(&self) -> &SgdConfig {
        &self.config
    }
}

impl Optimizer for NesterovSgd {
    type Config = SgdConfig;

    fn new(vars: Vec<Var>, config: SgdConfig) -> Result<Self> {
        let params = vars
            .into_iter()
            .filter(|var| var.dtype().is_float())
            .map(|var| {
                let velocity = Var::zeros(var.shape().clone(), var.dtype(), var.device())?;
                Ok(ParamState { var, velocity })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { config, params })
    }

    fn step(&mut self, grads: &GradStore) -> Result<()> {
        let lr = self.config.lr;
        let mu = self.config.momentum;

        for state in &self.params {
            // Batch-norm running statistics never receive gradients
            let Some(grad) = grads.get(&state.var) else {
                continue;
            };

            let grad = if self.config.weight_decay > 0.0 {
                grad.add(&state.var.as_tensor().affine(self.config.weight_decay, 0.0)?)?
            } else {
                grad.clone()
            };
            let scaled_grad = grad.affine(lr, 0.0)?;

            let velocity = state
                .velocity
                .as_tensor()
                .affine(mu, 0.0)?
                .sub(&scaled_grad)?;

            let update = if self.config.nesterov {
                velocity.affine(mu, 0.0)?.sub(&scaled_grad)?
            } else {
                velocity.clone()
            };

            state.var.set(&state.var.as_tensor().add(&update)?)?;
            state.velocity.set(&velocity)?;
        }

        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.config.lr
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.config.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn assert_close(actual: &[f32], expected: &[f32]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "expected {:?}, got {:?}", expected, actual);
        }
    }

    #[test]
    fn test_plain_sgd_step() -> Result<()> {
        let device = Device::Cpu;
        let w = Var::new(&[1.0f32, -2.0], &device)?;
        let config = SgdConfig {
            lr: 0.1,
            ..Default::default()
        };
        let mut optimizer = NesterovSgd::new(vec![w.clone()], config)?;

        // d/dw sum(w^2) = 2w, so w <- w - 0.1 * 2w = 0.8w
        let loss = w.as_tensor().sqr()?.sum_all()?;
        optimizer.backward_step(&loss)?;

        assert_close(&w.as_tensor().to_vec1::<f32>()?, &[0.8, -1.6]);

        Ok(())
    }

    #[test]
    fn test_nesterov_first_step() -> Result<()> {
        let device = Device::Cpu;
        let w = Var::new(&[1.0f32], &device)?;
        let config = SgdConfig {
            lr: 0.1,
            momentum: 0.9,
            nesterov: true,
            weight_decay: 0.0,
        };
        let mut optimizer = NesterovSgd::new(vec![w.clone()], config)?;

        // g = 2, v = -0.2, update = 0.9 * -0.2 - 0.2 = -0.38
        let loss = w.as_tensor().sqr()?.sum_all()?;
        optimizer.backward_step(&loss)?;

        assert_close(&w.as_tensor().to_vec1::<f32>()?, &[0.62]);

        Ok(())
    }

    #[test]
    fn test_weight_decay_pulls_towards_zero() -> Result<()> {
        let device = Device::Cpu;
        let w = Var::new(&[1.0f32], &device)?;
        let unused = Var::new(&[3.0f32], &device)?;
        let config = SgdConfig {
            lr: 0.5,
            weight_decay: 0.1,
            ..Default::default()
        };
        let mut optimizer = NesterovSgd::new(vec![w.clone(), unused.clone()], config)?;

        // Loss independent of w's magnitude: g = 1 (+0.1 decay)
        let loss = w.as_tensor().sum_all()?;
        optimizer.backward_step(&loss)?;

        assert_close(&w.as_tensor().to_vec1::<f32>()?, &[0.45]);
        // No gradient, no update
        assert_close(&unused.as_tensor().to_vec1::<f32>()?, &[3.0]);

        Ok(())
    }

    #[test]
    fn test_lr_scheduling() -> Result<()> {
        let mut optimizer = NesterovSgd::new(vec![], SgdConfig::default())?;
        assert_eq!(optimizer.learning_rate(), 0.01);

        optimizer.set_learning_rate(5e-4);
        assert_eq!(optimizer.learning_rate(), 5e-4);
        assert_eq!(optimizer.config().lr, 5e-4);

        Ok(())
    }
}
