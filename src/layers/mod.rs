/// Neural network layer primitives
///
/// Building blocks for the DenseNet classifier, all assembled from candle-nn:
/// - Conv units (BN, ReLU, convolution, optional dropout)
/// - Dense blocks (conv units whose outputs are concatenated)
/// - Transitions (1x1 conv unit followed by 2x2 average pooling)

pub mod dense_block;

pub use dense_block::{ConvUnit, DenseBlock, Transition};
