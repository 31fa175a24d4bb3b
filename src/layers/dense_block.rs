/// Dense blocks and transitions
///
/// Follows the pre-activation ordering of DenseNet: every convolution sees
/// batch-normalized, ReLU-activated features.
use candle_core::{Result, Tensor};
use candle_nn::{
    batch_norm, conv2d_no_bias, BatchNorm, Conv2d, Conv2dConfig, Dropout, ModuleT, VarBuilder,
};

const BN_EPS: f64 = 1e-5;

/// BN -> ReLU -> Conv(k x k) -> Dropout
pub struct ConvUnit {
    norm: BatchNorm,
    conv: Conv2d,
    dropout: Option<Dropout>,
}

impl ConvUnit {
    /// Create a conv unit with "same" padding
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        dropout_rate: f32,
        vb: VarBuilder,
    ) -> Result<Self> {
        let norm = batch_norm(in_channels, BN_EPS, vb.pp("norm"))?;
        let conv_config = Conv2dConfig {
            padding: kernel_size / 2,
            ..Default::default()
        };
        let conv = conv2d_no_bias(in_channels, out_channels, kernel_size, conv_config, vb.pp("conv"))?;
        let dropout = (dropout_rate > 0.0).then(|| Dropout::new(dropout_rate));

        Ok(Self {
            norm,
            conv,
            dropout,
        })
    }
}

impl ModuleT for ConvUnit {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let xs = xs.apply_t(&self.norm, train)?.relu()?.apply(&self.conv)?;
        match &self.dropout {
            Some(dropout) => dropout.forward(&xs, train),
            None => Ok(xs),
        }
    }
}

/// Stack of 3x3 conv units, each appending `growth_rate` channels
pub struct DenseBlock {
    layers: Vec<ConvUnit>,
    out_channels: usize,
}

impl DenseBlock {
    pub fn new(
        num_layers: usize,
        in_channels: usize,
        growth_rate: usize,
        dropout_rate: f32,
        vb: VarBuilder,
    ) -> Result<Self> {
        let mut layers = Vec::with_capacity(num_layers);
        let mut channels = in_channels;
        for i in 0..num_layers {
            layers.push(ConvUnit::new(
                channels,
                growth_rate,
                3,
                dropout_rate,
                vb.pp(format!("layer_{}", i)),
            )?);
            channels += growth_rate;
        }

        Ok(Self {
            layers,
            out_channels: channels,
        })
    }

    /// Channel count after concatenation
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

impl ModuleT for DenseBlock {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        let mut features = xs.clone();
        for layer in &self.layers {
            let new_features = layer.forward_t(&features, train)?;
            features = Tensor::cat(&[&features, &new_features], 1)?;
        }
        Ok(features)
    }
}

/// 1x1 conv unit followed by 2x2 average pooling
pub struct Transition {
    unit: ConvUnit,
}

impl Transition {
    pub fn new(channels: usize, dropout_rate: f32, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            unit: ConvUnit::new(channels, channels, 1, dropout_rate, vb)?,
        })
    }
}

impl ModuleT for Transition {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        self.unit.forward_t(xs, train)?.avg_pool2d(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_dense_block_grows_channels() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let block = DenseBlock::new(2, 4, 3, 0.0, vb)?;
        assert_eq!(block.out_channels(), 10);

        let x = Tensor::randn(0f32, 1.0, (2, 4, 6, 6), &device)?;
        let y = block.forward_t(&x, false)?;
        assert_eq!(y.dims(), &[2, 10, 6, 6]);

        Ok(())
    }

    #[test]
    fn test_transition_halves_spatial_dims() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        let transition = Transition::new(5, 0.2, vb)?;
        let x = Tensor::randn(0f32, 1.0, (3, 5, 8, 8), &device)?;
        let y = transition.forward_t(&x, true)?;
        assert_eq!(y.dims(), &[3, 5, 4, 4]);

        Ok(())
    }
}
