/// Cats vs dogs DenseNet experiment: profile inference latency, then train
use std::path::PathBuf;

use anyhow::Context;
use candle_core::Device;
use catsdogs::models::Model;
use catsdogs::{profiling, utils, DatasetSplit, DenseNetClassifier, ExperimentConfig, Trainer};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "run_catsdogs", about = "Run cats vs dogs DenseNet experiment")]
struct Cli {
    /// Batch size
    #[arg(long = "batch_size", default_value_t = 64)]
    batch_size: usize,

    /// Number of epochs
    #[arg(long = "nb_epoch", default_value_t = 30)]
    nb_epoch: usize,

    /// Network depth
    #[arg(long, default_value_t = 7)]
    depth: usize,

    /// Number of dense blocks
    #[arg(long = "nb_dense_block", default_value_t = 1)]
    nb_dense_block: usize,

    /// Initial number of conv filters
    #[arg(long = "nb_filter", default_value_t = 16)]
    nb_filter: usize,

    /// Number of new filters added by conv layers
    #[arg(long = "growth_rate", default_value_t = 12)]
    growth_rate: usize,

    /// Dropout rate
    #[arg(long = "dropout_rate", default_value_t = 0.2)]
    dropout_rate: f32,

    /// Learning rate
    #[arg(long = "learning_rate", default_value_t = 1e-3)]
    learning_rate: f64,

    /// L2 regularization on weights
    #[arg(long = "weight_decay", default_value_t = 1e-4)]
    weight_decay: f64,

    /// Logfile name
    #[arg(long, default_value = "experiment_log_cifar10.json")]
    logfile: String,

    /// Save a summary of the network architecture
    #[arg(long = "plot_architecture")]
    plot_architecture: bool,

    /// Directory containing rgb_{train,test}_{in,out}.npy
    #[arg(long = "dataset_dir")]
    dataset_dir: PathBuf,

    /// Directory for the experiment log
    #[arg(long = "log_dir", default_value = "./log")]
    log_dir: PathBuf,

    /// Directory for architecture summaries
    #[arg(long = "figures_dir", default_value = "./figures")]
    figures_dir: PathBuf,

    /// Number of timed inference batches
    #[arg(long = "latency_repeat", default_value_t = 25)]
    latency_repeat: usize,

    /// Write trained weights to this safetensors file
    #[arg(long = "save_weights")]
    save_weights: Option<PathBuf>,

    /// Run on CPU even when CUDA is available
    #[arg(long)]
    cpu: bool,
}

impl Cli {
    fn experiment_config(&self) -> ExperimentConfig {
        ExperimentConfig {
            batch_size: self.batch_size,
            nb_epoch: self.nb_epoch,
            depth: self.depth,
            nb_dense_block: self.nb_dense_block,
            nb_filter: self.nb_filter,
            growth_rate: self.growth_rate,
            dropout_rate: self.dropout_rate,
            learning_rate: self.learning_rate,
            weight_decay: self.weight_decay,
            logfile: self.logfile.clone(),
            log_dir: self.log_dir.clone(),
            figures_dir: self.figures_dir.clone(),
            dataset_dir: self.dataset_dir.clone(),
            plot_architecture: self.plot_architecture,
            latency_repeat: self.latency_repeat,
            save_weights: self.save_weights.clone(),
        }
    }
}

fn select_device(force_cpu: bool) -> candle_core::Result<Device> {
    if !force_cpu && candle_core::utils::cuda_is_available() {
        Device::new_cuda(0)
    } else {
        Ok(Device::Cpu)
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = cli.experiment_config();
    config.validate()?;

    log::info!("Network configuration:");
    if let serde_json::Value::Object(entries) = serde_json::to_value(&config)? {
        for (name, value) in entries {
            log::info!("  {} {}", name, value);
        }
    }

    utils::ensure_dirs(&[&config.log_dir, &config.figures_dir])
        .context("creating output directories")?;

    let device = select_device(cli.cpu)?;
    log::info!("Using device: {:?}", device);

    // Data loading
    let data = DatasetSplit::from_directory(&config.dataset_dir)
        .with_context(|| format!("loading dataset from {:?}", config.dataset_dir))?;

    // Model construction
    let model = DenseNetClassifier::new(config.densenet_config(&data), config.sgd_config(), &device)?;
    let summary = model.summary();
    log::info!("Model summary:\n{}", summary);

    if config.plot_architecture {
        let path = config.figures_dir.join("densenet_archi.txt");
        std::fs::write(&path, &summary).with_context(|| format!("writing {:?}", path))?;
        log::info!("Architecture written to {:?}", path);
    }

    // Network profiling
    let latency = profiling::sample_latency(
        &model,
        &data.batch_shape(config.batch_size),
        config.latency_repeat,
    )?;
    log::info!(
        "Per-sample latency: {:.6e} s (std {:.3e})",
        latency.mean,
        latency.std_dev
    );

    // Network training
    log::info!("Training");
    let mut trainer = Trainer::new(model, config.training_config())?;
    let experiment_log = trainer.train(&data, latency.mean)?;

    if let Some((loss, accuracy)) = experiment_log.test_loss.last().map(|m| (m[0], m[1])) {
        log::info!(
            "Final test_loss={:.4}, test_acc={:.4}, lr={}",
            loss,
            accuracy,
            trainer.model().learning_rate()
        );
    }
    log::info!("Experiment log: {:?}", config.log_path());

    if let Some(path) = &config.save_weights {
        trainer.model().save_weights(path)?;
    }

    Ok(())
}
