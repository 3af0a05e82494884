//! src/configuration.rs
use std::path::PathBuf;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub paths: PathSettings,
}

/// Filesystem layout shared by the master and its workers. Intermediate and
/// reduce-output files land in `output`, the merged result in `result`, and
/// RPC endpoints are created under `socket_base`.
#[derive(serde::Deserialize, Clone, Debug)]
pub struct PathSettings {
    pub input: PathBuf,
    pub output: PathBuf,
    pub result: PathBuf,
    pub socket_base: PathBuf,
    pub master_socket: PathBuf,
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory.");
    let config_dir = base_path.join("configuration");

    let settings = config::Config::builder()
        .add_source(config::File::from(config_dir.join("engine.yaml")))
        .add_source(
            config::Environment::with_prefix("MAPRED")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
