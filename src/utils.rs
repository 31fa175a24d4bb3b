/// Utility functions
use candle_core::Var;
use std::path::Path;

/// Calculate the number of parameters across variables
pub fn count_parameters(vars: &[Var]) -> usize {
    vars.iter().map(|v| v.elem_count()).sum()
}

/// Create each directory (and parents) if missing
pub fn ensure_dirs<P: AsRef<Path>>(dirs: &[P]) -> std::io::Result<()> {
    for dir in dirs {
        if !dir.as_ref().exists() {
            log::info!("Creating directory {:?}", dir.as_ref());
            std::fs::create_dir_all(dir)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    #[test]
    fn test_count_parameters() -> candle_core::Result<()> {
        let device = Device::Cpu;
        let vars = vec![
            Var::zeros((3, 4), DType::F32, &device)?,
            Var::zeros(5, DType::F32, &device)?,
        ];
        assert_eq!(count_parameters(&vars), 17);
        Ok(())
    }

    #[test]
    fn test_ensure_dirs() {
        let root = tempfile::tempdir().unwrap();
        let log_dir = root.path().join("log");
        let figures_dir = root.path().join("figures").join("archi");

        ensure_dirs(&[&log_dir, &figures_dir]).unwrap();
        assert!(log_dir.is_dir());
        assert!(figures_dir.is_dir());

        // Existing directories are fine
        ensure_dirs(&[&log_dir]).unwrap();
    }
}
