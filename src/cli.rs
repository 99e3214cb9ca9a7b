//! Helpers shared by the command line tools.

use std::path::PathBuf;

/// Log at `info` unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// clap value parser for input paths that must name an existing file.
pub fn existing_file(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if path.is_file() {
        Ok(path)
    } else if path.exists() {
        Err(format!("'{s}' is a directory"))
    } else {
        Err(format!("'{s}' does not exist"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_existing_files_pass() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.yaml");
        std::fs::write(&file, "training_variables: [size]").unwrap();

        assert_eq!(existing_file(file.to_str().unwrap()), Ok(file.clone()));
        assert!(existing_file(dir.path().to_str().unwrap())
            .unwrap_err()
            .contains("directory"));
        assert!(existing_file("no/such/file.yaml").is_err());
    }
}
