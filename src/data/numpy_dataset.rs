/// NumPy dataset loader for RGB image classification data (.npy format)
use candle_core::{Device, Result, Tensor};
use ndarray::{Array2, Array4, ArrayD, Axis, Ix2, Ix4};
use ndarray_npy::ReadNpyExt;
use std::path::Path;

const TRAIN_INPUTS: &str = "rgb_train_in.npy";
const TRAIN_LABELS: &str = "rgb_train_out.npy";
const TEST_INPUTS: &str = "rgb_test_in.npy";
const TEST_LABELS: &str = "rgb_test_out.npy";

/// Pixel rescaling applied to every input image
const PIXEL_SCALE: f32 = 255.0;

/// Read a `.npy` file of any supported numeric dtype as f32.
fn read_npy_as_f32(path: &Path) -> crate::Result<ArrayD<f32>> {
    let bytes = std::fs::read(path)?;

    if let Ok(array) = ArrayD::<f32>::read_npy(bytes.as_slice()) {
        return Ok(array);
    }
    if let Ok(array) = ArrayD::<u8>::read_npy(bytes.as_slice()) {
        return Ok(array.mapv(f32::from));
    }
    if let Ok(array) = ArrayD::<f64>::read_npy(bytes.as_slice()) {
        return Ok(array.mapv(|x| x as f32));
    }

    ArrayD::<i64>::read_npy(bytes.as_slice())
        .map(|array| array.mapv(|x| x as f32))
        .map_err(|e| {
            crate::ExperimentError::Data(format!(
                "Failed to read {:?} as f32/u8/f64/i64: {}",
                path, e
            ))
        })
}

fn read_images(path: &Path) -> crate::Result<Array4<f32>> {
    let array = read_npy_as_f32(path)?;
    let shape = array.shape().to_vec();
    let images = array.into_dimensionality::<Ix4>().map_err(|_| {
        crate::ExperimentError::Data(format!(
            "{:?}: expected [N, H, W, C] images, got shape {:?}",
            path, shape
        ))
    })?;
    Ok(images.mapv(|x| x / PIXEL_SCALE))
}

fn read_labels(path: &Path) -> crate::Result<Array2<f32>> {
    let array = read_npy_as_f32(path)?;
    let shape = array.shape().to_vec();
    array.into_dimensionality::<Ix2>().map_err(|_| {
        crate::ExperimentError::Data(format!(
            "{:?}: expected one-hot [N, K] labels, got shape {:?}",
            path, shape
        ))
    })
}

/// One split of an image dataset: NHWC inputs and one-hot labels
#[derive(Debug, Clone)]
pub struct ImageDataset {
    inputs: Array4<f32>, // [N, H, W, C]
    labels: Array2<f32>, // [N, K]
}

impl ImageDataset {
    /// Pair inputs with labels, checking the sample counts agree
    pub fn new(inputs: Array4<f32>, labels: Array2<f32>) -> crate::Result<Self> {
        let n_inputs = inputs.len_of(Axis(0));
        let n_labels = labels.nrows();
        if n_inputs != n_labels {
            return Err(crate::ExperimentError::Data(format!(
                "Sample count mismatch: inputs {:?} vs labels {:?}",
                inputs.shape(),
                labels.shape()
            )));
        }
        if n_inputs == 0 {
            return Err(crate::ExperimentError::Data(
                "Dataset split is empty".to_string(),
            ));
        }

        Ok(Self { inputs, labels })
    }

    /// Get number of examples
    pub fn len(&self) -> usize {
        self.inputs.len_of(Axis(0))
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Image dimensions `[H, W, C]`
    pub fn image_dims(&self) -> [usize; 3] {
        let (_, h, w, c) = self.inputs.dim();
        [h, w, c]
    }

    /// Number of label classes
    pub fn num_classes(&self) -> usize {
        self.labels.ncols()
    }

    pub fn inputs(&self) -> &Array4<f32> {
        &self.inputs
    }
}

/// Train and test splits loaded once at startup
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train: ImageDataset,
    pub test: ImageDataset,
}

impl DatasetSplit {
    /// Combine two splits, checking they describe the same problem
    pub fn new(train: ImageDataset, test: ImageDataset) -> crate::Result<Self> {
        if train.image_dims() != test.image_dims() {
            return Err(crate::ExperimentError::Data(format!(
                "Image dims differ: train {:?} vs test {:?}",
                train.image_dims(),
                test.image_dims()
            )));
        }
        if train.num_classes() != test.num_classes() {
            return Err(crate::ExperimentError::Data(format!(
                "Class count differs: train {} vs test {}",
                train.num_classes(),
                test.num_classes()
            )));
        }

        Ok(Self { train, test })
    }

    /// Load from directory containing the four rgb_*.npy files
    pub fn from_directory<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let dir = path.as_ref();

        log::info!("Loading NumPy dataset from: {:?}", dir);

        let train = ImageDataset::new(
            read_images(&dir.join(TRAIN_INPUTS))?,
            read_labels(&dir.join(TRAIN_LABELS))?,
        )?;
        log::info!(
            "Loaded train split: {} examples, image dims {:?}",
            train.len(),
            train.image_dims()
        );

        let test = ImageDataset::new(
            read_images(&dir.join(TEST_INPUTS))?,
            read_labels(&dir.join(TEST_LABELS))?,
        )?;
        log::info!(
            "Loaded test split: {} examples, image dims {:?}",
            test.len(),
            test.image_dims()
        );

        let split = Self::new(train, test)?;
        log::info!("Dataset loaded: {} classes", split.train.num_classes());

        Ok(split)
    }

    /// Inference batch shape `[batch_size, H, W, C]`
    pub fn batch_shape(&self, batch_size: usize) -> Vec<usize> {
        let [h, w, c] = self.train.image_dims();
        vec![batch_size, h, w, c]
    }
}

/// Plain batching over an [`ImageDataset`], optionally shuffled per epoch
pub struct ImageDataLoader<'a> {
    dataset: &'a ImageDataset,
    batch_size: usize,
    current_idx: usize,
    indices: Vec<usize>,
    shuffle: bool,
}

impl<'a> ImageDataLoader<'a> {
    /// Create new data loader
    pub fn new(dataset: &'a ImageDataset, batch_size: usize, shuffle: bool) -> crate::Result<Self> {
        if batch_size == 0 {
            return Err(crate::ExperimentError::Config(
                "batch size must be > 0".to_string(),
            ));
        }

        let mut loader = Self {
            dataset,
            batch_size,
            current_idx: 0,
            indices: (0..dataset.len()).collect(),
            shuffle,
        };
        loader.reset();

        Ok(loader)
    }

    /// Get next batch (inputs [b, H, W, C], labels [b, K])
    pub fn next_batch(&mut self, device: &Device) -> Result<Option<(Tensor, Tensor)>> {
        if self.current_idx >= self.indices.len() {
            return Ok(None);
        }

        let end_idx = (self.current_idx + self.batch_size).min(self.indices.len());
        let batch_indices = &self.indices[self.current_idx..end_idx];
        let actual_batch_size = batch_indices.len();

        let inputs = self.dataset.inputs.select(Axis(0), batch_indices);
        let labels = self.dataset.labels.select(Axis(0), batch_indices);

        self.current_idx = end_idx;

        let [h, w, c] = self.dataset.image_dims();
        let input_tensor = Tensor::from_vec(
            inputs.iter().copied().collect::<Vec<f32>>(),
            (actual_batch_size, h, w, c),
            device,
        )?;
        let label_tensor = Tensor::from_vec(
            labels.iter().copied().collect::<Vec<f32>>(),
            (actual_batch_size, self.dataset.num_classes()),
            device,
        )?;

        Ok(Some((input_tensor, label_tensor)))
    }

    /// Reset loader for new epoch
    pub fn reset(&mut self) {
        self.current_idx = 0;

        if self.shuffle {
            use rand::seq::SliceRandom;
            let mut rng = rand::thread_rng();
            self.indices.shuffle(&mut rng);
        }
    }

    /// Get number of batches
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }
}

impl super::BatchDataLoader for ImageDataLoader<'_> {
    fn next_batch(&mut self, device: &Device) -> Result<Option<(Tensor, Tensor)>> {
        ImageDataLoader::next_batch(self, device)
    }

    fn reset(&mut self) {
        ImageDataLoader::reset(self)
    }

    fn num_batches(&self) -> usize {
        ImageDataLoader::num_batches(self)
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;
    use ndarray_npy::WriteNpyExt;
    use std::fs::File;

    fn one_hot(n: usize, k: usize) -> Array2<f32> {
        Array2::from_shape_fn((n, k), |(i, j)| if i % k == j { 1.0 } else { 0.0 })
    }

    fn write_split(dir: &Path, n_train: usize, n_test: usize) {
        let train_x = Array::from_elem((n_train, 4, 4, 3), 255u8);
        let test_x = Array::from_elem((n_test, 4, 4, 3), 51u8);
        train_x.write_npy(File::create(dir.join(TRAIN_INPUTS)).unwrap()).unwrap();
        test_x.write_npy(File::create(dir.join(TEST_INPUTS)).unwrap()).unwrap();
        one_hot(n_train, 2).write_npy(File::create(dir.join(TRAIN_LABELS)).unwrap()).unwrap();
        one_hot(n_test, 2).write_npy(File::create(dir.join(TEST_LABELS)).unwrap()).unwrap();
    }

    #[test]
    fn test_from_directory_scales_pixels() {
        let dir = tempfile::tempdir().unwrap();
        write_split(dir.path(), 6, 3);

        let split = DatasetSplit::from_directory(dir.path()).unwrap();
        assert_eq!(split.train.len(), 6);
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.image_dims(), [4, 4, 3]);
        assert_eq!(split.train.num_classes(), 2);
        assert!((split.train.inputs()[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((split.test.inputs()[[0, 0, 0, 0]] - 0.2).abs() < 1e-6);
        assert_eq!(split.batch_shape(8), vec![8, 4, 4, 3]);
    }

    #[test]
    fn test_sample_count_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_split(dir.path(), 6, 3);
        one_hot(5, 2)
            .write_npy(File::create(dir.path().join(TRAIN_LABELS)).unwrap())
            .unwrap();

        let result = DatasetSplit::from_directory(dir.path());
        assert!(matches!(result, Err(crate::ExperimentError::Data(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = DatasetSplit::from_directory(dir.path());
        assert!(matches!(result, Err(crate::ExperimentError::Io(_))));
    }

    #[test]
    fn test_loader_batches_with_short_tail() -> Result<()> {
        let inputs = Array4::<f32>::zeros((10, 2, 2, 1));
        let dataset = ImageDataset::new(inputs, one_hot(10, 2)).unwrap();
        let mut loader = ImageDataLoader::new(&dataset, 4, true).unwrap();
        assert_eq!(loader.num_batches(), 3);

        let device = Device::Cpu;
        let mut sizes = Vec::new();
        while let Some((x, y)) = loader.next_batch(&device)? {
            assert_eq!(x.dims()[1..].to_vec(), vec![2, 2, 1]);
            assert_eq!(y.dims()[1], 2);
            sizes.push(x.dim(0)?);
        }
        assert_eq!(sizes, vec![4, 4, 2]);

        loader.reset();
        assert!(loader.next_batch(&device)?.is_some());

        Ok(())
    }

    #[test]
    fn test_loader_preserves_pairs_without_shuffle() -> Result<()> {
        let inputs = Array4::from_shape_fn((3, 1, 1, 1), |(i, _, _, _)| i as f32);
        let dataset = ImageDataset::new(inputs, one_hot(3, 3)).unwrap();
        let mut loader = ImageDataLoader::new(&dataset, 3, false).unwrap();

        let (x, y) = loader.next_batch(&Device::Cpu)?.unwrap();
        assert_eq!(x.flatten_all()?.to_vec1::<f32>()?, vec![0.0, 1.0, 2.0]);
        assert_eq!(y.argmax(1)?.to_vec1::<u32>()?, vec![0, 1, 2]);

        Ok(())
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let dataset = ImageDataset::new(Array4::zeros((2, 1, 1, 1)), one_hot(2, 2)).unwrap();
        assert!(ImageDataLoader::new(&dataset, 0, false).is_err());
    }
}
