//! src/test_utils.rs
use std::path::PathBuf;
use uuid::Uuid;

/// Fresh directory under the system temp dir, so tests never share files.
pub fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mapred-{label}-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("Failed to create scratch directory");
    dir
}
