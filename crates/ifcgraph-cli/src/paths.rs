//! Shared path utilities for ifcgraph-cli.

use std::path::PathBuf;

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("org", "ifcgraph", "ifcgraph")
}

/// Get the base data directory.
/// `IFCGRAPH_DATA_DIR` wins over the platform data directory.
pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("IFCGRAPH_DATA_DIR") {
        return PathBuf::from(dir);
    }
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".ifcgraph"))
}

/// Get the config file path.
/// `IFCGRAPH_CONFIG` wins over the platform config directory.
pub fn get_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("IFCGRAPH_CONFIG") {
        return PathBuf::from(path);
    }
    project_dirs()
        .map(|d| d.config_dir().join("ifcgraph.toml"))
        .unwrap_or_else(|| get_data_dir().join("ifcgraph.toml"))
}

/// Get the default graph database path
pub fn get_db_path() -> PathBuf {
    get_data_dir().join("graph.db")
}
