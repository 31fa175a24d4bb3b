/// DenseNet classifier trained with Nesterov SGD on a candle device
use candle_core::{DType, Device, Result, Tensor, D};
use candle_nn::{ModuleT, Optimizer, VarBuilder, VarMap};
use std::path::Path;

use super::{DenseNet, DenseNetConfig, Evaluation, Model};
use crate::data::BatchDataLoader;
use crate::training::{NesterovSgd, SgdConfig};
use crate::utils::count_parameters;

/// Categorical cross-entropy against one-hot targets, averaged over the batch
pub fn categorical_crossentropy(logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
    let log_probs = candle_nn::ops::log_softmax(logits, D::Minus1)?;
    log_probs.mul(targets)?.sum(D::Minus1)?.neg()?.mean_all()
}

/// Number of rows whose arg-max prediction matches the one-hot target
pub fn count_correct(logits: &Tensor, targets: &Tensor) -> Result<usize> {
    let predicted = logits.argmax(D::Minus1)?;
    let expected = targets.argmax(D::Minus1)?;
    let correct = predicted
        .eq(&expected)?
        .to_dtype(DType::F32)?
        .sum_all()?
        .to_scalar::<f32>()?;
    Ok(correct as usize)
}

/// DenseNet plus its parameters and optimizer state
pub struct DenseNetClassifier {
    net: DenseNet,
    varmap: VarMap,
    optimizer: NesterovSgd,
    config: DenseNetConfig,
    device: Device,
}

impl DenseNetClassifier {
    /// Build and initialize a fresh network
    pub fn new(config: DenseNetConfig, sgd: SgdConfig, device: &Device) -> crate::Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let net = DenseNet::new(&config, vb)?;
        let optimizer = NesterovSgd::new(varmap.all_vars(), sgd)?;

        log::info!(
            "DenseNet ready: {} dense blocks, {} layers per block, {} parameters",
            config.nb_dense_block,
            config.layers_per_block(),
            count_parameters(&varmap.all_vars())
        );

        Ok(Self {
            net,
            varmap,
            optimizer,
            config,
            device: device.clone(),
        })
    }

    /// Total number of parameters, batch-norm statistics included
    pub fn num_parameters(&self) -> usize {
        count_parameters(&self.varmap.all_vars())
    }

    /// Human-readable architecture listing
    pub fn summary(&self) -> String {
        let mut out = String::from("DenseNet\n");
        for line in self.net.summary_lines() {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(&format!(
            "  classes: {}, dropout: {}\n",
            self.config.num_classes, self.config.dropout_rate
        ));
        out.push_str(&format!("  total parameters: {}\n", self.num_parameters()));
        out
    }

    /// Save all weights in safetensors format
    pub fn save_weights<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        log::info!("Saving weights to {:?}", path.as_ref());
        self.varmap.save(path)?;
        Ok(())
    }
}

impl Model for DenseNetClassifier {
    fn device(&self) -> &Device {
        &self.device
    }

    fn predict(&self, batch: &Tensor) -> crate::Result<Tensor> {
        let logits = self.net.forward_t(batch, false)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?;
        // Copy back to host so timing covers the whole device round-trip
        Ok(probs.to_device(&Device::Cpu)?)
    }

    fn fit_one_pass(&mut self, batches: &mut dyn BatchDataLoader) -> crate::Result<f32> {
        let mut total_loss = 0.0f64;
        let mut num_samples = 0usize;
        let mut num_batches = 0usize;

        while let Some((inputs, labels)) = batches.next_batch(&self.device)? {
            let logits = self.net.forward_t(&inputs, true)?;
            let loss = categorical_crossentropy(&logits, &labels)?;
            self.optimizer.backward_step(&loss)?;

            let batch_len = inputs.dim(0)?;
            let loss_val = loss.to_scalar::<f32>()?;
            total_loss += loss_val as f64 * batch_len as f64;
            num_samples += batch_len;
            num_batches += 1;

            log::debug!(
                "Batch {}/{} ({}/{} samples): loss={:.4}",
                num_batches,
                batches.num_batches(),
                batch_len,
                batches.batch_size(),
                loss_val
            );
        }

        if num_samples == 0 {
            return Err(crate::ExperimentError::Training(
                "training pass produced no batches".to_string(),
            ));
        }

        Ok((total_loss / num_samples as f64) as f32)
    }

    fn evaluate(&mut self, batches: &mut dyn BatchDataLoader) -> crate::Result<Evaluation> {
        let mut total_loss = 0.0f64;
        let mut correct = 0usize;
        let mut num_samples = 0usize;

        while let Some((inputs, labels)) = batches.next_batch(&self.device)? {
            let logits = self.net.forward_t(&inputs, false)?;
            let batch_len = inputs.dim(0)?;

            let loss = categorical_crossentropy(&logits, &labels)?.to_scalar::<f32>()?;
            total_loss += loss as f64 * batch_len as f64;
            correct += count_correct(&logits, &labels)?;
            num_samples += batch_len;
        }

        if num_samples == 0 {
            return Err(crate::ExperimentError::Training(
                "evaluation pass produced no batches".to_string(),
            ));
        }

        Ok(Evaluation {
            loss: total_loss / num_samples as f64,
            accuracy: correct as f64 / num_samples as f64,
        })
    }

    fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.optimizer.set_learning_rate(lr);
    }

    fn optimizer_config(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self.optimizer.config())?)
    }
}
