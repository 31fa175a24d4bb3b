/// Epoch-driven training loop with step-decay learning rate and JSON logging
use std::path::PathBuf;
use std::time::Instant;

use super::experiment_log::ExperimentLog;
use super::scheduler::StepDecaySchedule;
use crate::config::EVAL_BATCH_SIZE;
use crate::data::{DatasetSplit, ImageDataLoader};
use crate::models::Model;

/// Training configuration
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub nb_epoch: usize,
    /// Training batch size
    pub batch_size: usize,
    /// Learning rate (initial)
    pub learning_rate: f64,
    /// Batch size for the per-epoch test evaluation
    pub eval_batch_size: usize,
    /// JSON log, overwritten after every epoch
    pub log_path: PathBuf,
    /// Reshuffle the training set every epoch
    pub shuffle: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            nb_epoch: 30,
            batch_size: 64,
            learning_rate: 1e-3,
            eval_batch_size: EVAL_BATCH_SIZE,
            log_path: PathBuf::from("log/experiment_log_cifar10.json"),
            shuffle: true,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.nb_epoch == 0 || self.batch_size == 0 || self.eval_batch_size == 0 {
            return Err(crate::ExperimentError::Config(format!(
                "nb_epoch ({}), batch_size ({}) and eval_batch_size ({}) must be > 0",
                self.nb_epoch, self.batch_size, self.eval_batch_size
            )));
        }

        if !(self.learning_rate > 0.0) {
            return Err(crate::ExperimentError::Config(format!(
                "learning_rate must be > 0, got {}",
                self.learning_rate
            )));
        }

        Ok(())
    }
}

/// Drives a [`Model`] through `nb_epoch` epochs
pub struct Trainer<M: Model> {
    model: M,
    config: TrainingConfig,
    schedule: StepDecaySchedule,
}

impl<M: Model> Trainer<M> {
    /// Create new trainer
    pub fn new(model: M, config: TrainingConfig) -> crate::Result<Self> {
        config.validate()?;
        let schedule = StepDecaySchedule::new(config.learning_rate, config.nb_epoch);

        Ok(Self {
            model,
            config,
            schedule,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Full training loop
    ///
    /// `latency` is the per-sample inference latency measured before
    /// training; it is copied into every log write. Any error aborts the run,
    /// leaving the log as of the last completed epoch.
    pub fn train(&mut self, data: &DatasetSplit, latency: f64) -> crate::Result<ExperimentLog> {
        let nb_epoch = self.config.nb_epoch;

        log::info!("Starting training for {} epochs", nb_epoch);
        log::info!(
            "Learning rate {} drops at epochs {} and {}",
            self.config.learning_rate,
            self.schedule.first_drop_epoch(),
            self.schedule.second_drop_epoch()
        );

        self.model.set_learning_rate(self.config.learning_rate);

        let mut train_loader =
            ImageDataLoader::new(&data.train, self.config.batch_size, self.config.shuffle)?;
        let mut test_loader = ImageDataLoader::new(&data.test, self.config.eval_batch_size, false)?;
        log::info!(
            "Batches per epoch: {} train, {} test",
            train_loader.num_batches(),
            test_loader.num_batches()
        );

        let mut experiment_log = ExperimentLog::new(
            self.config.batch_size,
            latency,
            nb_epoch,
            self.model.optimizer_config()?,
        );

        for epoch in 0..nb_epoch {
            if let Some(lr) = self.schedule.rate_change(epoch) {
                log::info!("Epoch {}: learning rate -> {}", epoch + 1, lr);
                self.model.set_learning_rate(lr);
            }

            let start = Instant::now();

            train_loader.reset();
            let train_loss = self.model.fit_one_pass(&mut train_loader)?;

            test_loader.reset();
            let evaluation = self.model.evaluate(&mut test_loader)?;

            let lr = self.model.learning_rate();
            experiment_log.record_epoch(evaluation.loss, evaluation.accuracy, lr);
            experiment_log.set_optimizer(self.model.optimizer_config()?);

            log::info!(
                "Epoch {}/{}, Time: {:.2}s, train_loss={:.4}, test_loss={:.4}, test_acc={:.4}, lr={}",
                epoch + 1,
                nb_epoch,
                start.elapsed().as_secs_f64(),
                train_loss,
                evaluation.loss,
                evaluation.accuracy,
                lr
            );

            experiment_log.save(&self.config.log_path)?;
        }

        log::info!("Training complete!");

        Ok(experiment_log)
    }
}
