/// JSON experiment log, rewritten in full after every epoch
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Run metadata plus per-epoch test metrics and learning rates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentLog {
    /// Training batch size
    pub batch_size: usize,
    /// Mean per-sample inference latency in seconds, measured before training
    pub latency: f64,
    /// Total number of epochs in the run
    pub nb_epoch: usize,
    /// Optimizer configuration snapshot
    pub optimizer: serde_json::Value,
    /// `[loss, accuracy]` per completed epoch
    pub test_loss: Vec<[f64; 2]>,
    /// Learning rate per completed epoch
    pub learning_rate: Vec<f64>,
}

impl ExperimentLog {
    /// Create a log with no completed epochs
    pub fn new(
        batch_size: usize,
        latency: f64,
        nb_epoch: usize,
        optimizer: serde_json::Value,
    ) -> Self {
        Self {
            batch_size,
            latency,
            nb_epoch,
            optimizer,
            test_loss: Vec::new(),
            learning_rate: Vec::new(),
        }
    }

    /// Append one completed epoch
    pub fn record_epoch(&mut self, loss: f64, accuracy: f64, learning_rate: f64) {
        self.test_loss.push([loss, accuracy]);
        self.learning_rate.push(learning_rate);
    }

    pub fn set_optimizer(&mut self, optimizer: serde_json::Value) {
        self.optimizer = optimizer;
    }

    pub fn epochs_recorded(&self) -> usize {
        self.test_loss.len()
    }

    /// Overwrite `path` with the current state
    ///
    /// Keys are sorted and indented by four spaces. The file is truncated
    /// first, so an interrupted write leaves it incomplete.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Value maps are ordered by key, including the nested optimizer map
        let value = serde_json::to_value(self)?;

        let mut writer = BufWriter::new(File::create(path)?);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
        value.serialize(&mut serializer)?;
        writer.flush()?;

        log::debug!(
            "Wrote experiment log ({} epochs) to {:?}",
            self.epochs_recorded(),
            path
        );

        Ok(())
    }

    /// Load a log written by [`ExperimentLog::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_log() -> ExperimentLog {
        ExperimentLog::new(
            64,
            0.0025,
            30,
            json!({"nesterov": true, "lr": 0.001, "momentum": 0.9, "weight_decay": 0.0001}),
        )
    }

    #[test]
    fn test_record_epoch_grows_both_sequences() {
        let mut log = sample_log();
        assert_eq!(log.epochs_recorded(), 0);

        log.record_epoch(0.7, 0.5, 0.001);
        log.record_epoch(0.6, 0.6, 0.001);

        assert_eq!(log.epochs_recorded(), 2);
        assert_eq!(log.learning_rate.len(), 2);
        assert_eq!(log.test_loss[1], [0.6, 0.6]);
    }

    #[test]
    fn test_save_sorts_keys_and_indents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log").join("run.json");

        let mut log = sample_log();
        log.record_epoch(0.7, 0.5, 0.001);
        log.save(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let keys = [
            "\"batch_size\"",
            "\"latency\"",
            "\"learning_rate\"",
            "\"nb_epoch\"",
            "\"optimizer\"",
            "\"test_loss\"",
        ];
        let positions: Vec<usize> = keys.iter().map(|k| text.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "keys not sorted:\n{}", text);
        assert!(text.contains("\n    \"batch_size\": 64"));

        // Nested optimizer map is sorted as well
        let lr = text.find("\"lr\"").unwrap();
        let nesterov = text.find("\"nesterov\"").unwrap();
        assert!(lr < nesterov);
    }

    #[test]
    fn test_save_overwrites_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");

        let mut log = sample_log();
        log.record_epoch(0.7, 0.5, 0.001);
        log.record_epoch(0.6, 0.6, 0.001);
        log.save(&path).unwrap();

        let shorter = sample_log();
        shorter.save(&path).unwrap();

        let loaded = ExperimentLog::load(&path).unwrap();
        assert_eq!(loaded, shorter);
        assert_eq!(loaded.epochs_recorded(), 0);
    }

    #[test]
    fn test_load_returns_exact_floats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");

        let mut log = ExperimentLog::new(
            64,
            0.009859195362296583,
            2,
            json!({"lr": 0.001, "momentum": 0.9}),
        );
        log.record_epoch(0.6931472f32 as f64, 0.5123f32 as f64, 0.001);
        log.record_epoch(0.41378629f32 as f64, 0.83333333, 0.0001);
        log.save(&path).unwrap();

        let loaded = ExperimentLog::load(&path).unwrap();
        assert_eq!(loaded.latency.to_bits(), 0.009859195362296583f64.to_bits());
        assert_eq!(loaded, log);
    }

    #[test]
    fn test_saved_document_is_typed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");

        let mut log = sample_log();
        log.record_epoch(0.25, 0.875, 0.0001);
        log.save(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 6);
        assert!(object["batch_size"].is_u64());
        assert!(object["latency"].is_f64());
        assert!(object["nb_epoch"].is_u64());
        assert!(object["optimizer"].is_object());
        assert_eq!(object["test_loss"], json!([[0.25, 0.875]]));
        assert_eq!(object["learning_rate"], json!([0.0001]));
    }
}
