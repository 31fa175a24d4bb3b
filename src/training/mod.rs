//! Training infrastructure: optimizer, schedule, loop and experiment log

pub mod experiment_log;
pub mod optimizer;
pub mod scheduler;
pub mod trainer;

pub use experiment_log::ExperimentLog;
pub use optimizer::{NesterovSgd, SgdConfig};
pub use scheduler::StepDecaySchedule;
pub use trainer::{Trainer, TrainingConfig};
