/// DenseNet image classifier network
use candle_core::{Result, Tensor, D};
use candle_nn::{
    batch_norm, conv2d_no_bias, linear, BatchNorm, Conv2d, Conv2dConfig, Linear, Module, ModuleT,
    VarBuilder,
};

use crate::layers::{DenseBlock, Transition};

/// Network hyperparameters
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DenseNetConfig {
    /// Network depth; must be 3N + 4
    pub depth: usize,

    /// Number of dense blocks
    pub nb_dense_block: usize,

    /// Filters produced by the stem convolution
    pub nb_filter: usize,

    /// Filters added by each conv layer inside a dense block
    pub growth_rate: usize,

    /// Dropout probability after each convolution (0 disables)
    pub dropout_rate: f32,

    /// Channels of the input images
    pub in_channels: usize,

    /// Number of output classes
    pub num_classes: usize,
}

impl Default for DenseNetConfig {
    fn default() -> Self {
        Self {
            depth: 7,
            nb_dense_block: 1,
            nb_filter: 16,
            growth_rate: 12,
            dropout_rate: 0.2,
            in_channels: 3,
            num_classes: 2,
        }
    }
}

impl DenseNetConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.depth < 4 || (self.depth - 4) % 3 != 0 {
            return Err(crate::ExperimentError::Model(format!(
                "depth must be 3N + 4, got {}",
                self.depth
            )));
        }

        if self.nb_dense_block == 0 {
            return Err(crate::ExperimentError::Model(
                "nb_dense_block must be > 0".to_string(),
            ));
        }

        if self.nb_filter == 0 || self.growth_rate == 0 {
            return Err(crate::ExperimentError::Model(
                "nb_filter and growth_rate must be > 0".to_string(),
            ));
        }

        if self.in_channels == 0 || self.num_classes == 0 {
            return Err(crate::ExperimentError::Model(format!(
                "in_channels ({}) and num_classes ({}) must be > 0",
                self.in_channels, self.num_classes
            )));
        }

        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(crate::ExperimentError::Model(format!(
                "dropout_rate must be in [0, 1), got {}",
                self.dropout_rate
            )));
        }

        Ok(())
    }

    /// Conv layers in each dense block
    pub fn layers_per_block(&self) -> usize {
        (self.depth - 4) / 3
    }
}

/// Stem conv -> (dense block -> transition)* -> dense block -> BN-ReLU -> GAP -> linear
///
/// Takes NHWC input and produces unnormalized class logits `[batch, num_classes]`.
pub struct DenseNet {
    stem: Conv2d,
    blocks: Vec<DenseBlock>,
    transitions: Vec<Transition>,
    final_norm: BatchNorm,
    classifier: Linear,
    summary: Vec<String>,
}

impl DenseNet {
    /// Create new network
    pub fn new(config: &DenseNetConfig, vb: VarBuilder) -> crate::Result<Self> {
        config.validate()?;

        let mut summary = Vec::new();
        let stem_config = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let stem = conv2d_no_bias(config.in_channels, config.nb_filter, 3, stem_config, vb.pp("stem"))?;
        summary.push(format!(
            "stem: conv3x3 {} -> {}",
            config.in_channels, config.nb_filter
        ));

        let mut channels = config.nb_filter;
        let mut blocks = Vec::with_capacity(config.nb_dense_block);
        let mut transitions = Vec::with_capacity(config.nb_dense_block - 1);

        for i in 0..config.nb_dense_block {
            let block = DenseBlock::new(
                config.layers_per_block(),
                channels,
                config.growth_rate,
                config.dropout_rate,
                vb.pp(format!("dense_block_{}", i)),
            )?;
            summary.push(format!(
                "dense_block_{}: {} x [bn-relu-conv3x3 +{}] {} -> {}",
                i,
                block.num_layers(),
                config.growth_rate,
                channels,
                block.out_channels()
            ));
            channels = block.out_channels();
            blocks.push(block);

            if i + 1 < config.nb_dense_block {
                transitions.push(Transition::new(
                    channels,
                    config.dropout_rate,
                    vb.pp(format!("transition_{}", i)),
                )?);
                summary.push(format!(
                    "transition_{}: bn-relu-conv1x1 {} -> {}, avgpool 2x2",
                    i, channels, channels
                ));
            }
        }

        let final_norm = batch_norm(channels, 1e-5, vb.pp("final_norm"))?;
        let classifier = linear(channels, config.num_classes, vb.pp("classifier"))?;
        summary.push(format!(
            "head: bn-relu-global_avg_pool-linear {} -> {}",
            channels, config.num_classes
        ));

        Ok(Self {
            stem,
            blocks,
            transitions,
            final_norm,
            classifier,
            summary,
        })
    }

    /// One line per stage
    pub fn summary_lines(&self) -> &[String] {
        &self.summary
    }
}

impl ModuleT for DenseNet {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        // NHWC -> NCHW
        let mut xs = xs.permute((0, 3, 1, 2))?.contiguous()?.apply(&self.stem)?;

        for (i, block) in self.blocks.iter().enumerate() {
            xs = block.forward_t(&xs, train)?;
            if let Some(transition) = self.transitions.get(i) {
                xs = transition.forward_t(&xs, train)?;
            }
        }

        let xs = xs.apply_t(&self.final_norm, train)?.relu()?;
        let pooled = xs.mean(D::Minus1)?.mean(D::Minus1)?;
        self.classifier.forward(&pooled)
    }
}
