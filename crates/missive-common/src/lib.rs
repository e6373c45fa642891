//! Centralized directory structure management for Missive
//!
//! Directory layout:
//! ```text
//! missive_data/
//! ├── documents/       # JSON document store (profiles, conversations, logs)
//! └── blobs/           # Media blobs (profile pictures, message photos/videos)
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Serialize, Deserialize, Debug)]
struct MissiveConfig {
    missive_root: Option<PathBuf>,
}

/// Get the global configuration path
fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("missive").join("config.json"))
}

/// Load the persistent root from config file
pub fn load_persistent_root() -> Option<PathBuf> {
    let path = get_config_path()?;
    if !path.exists() {
        return None;
    }

    match fs::read_to_string(&path) {
        Ok(content) => match serde_json::from_str::<MissiveConfig>(&content) {
            Ok(config) => config.missive_root,
            Err(e) => {
                warn!("Failed to parse config file at {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            warn!("Failed to read config file at {:?}: {}", path, e);
            None
        }
    }
}

/// Save a path as the persistent Missive root
pub fn save_persistent_root(root: PathBuf) -> anyhow::Result<()> {
    let path = get_config_path().ok_or_else(|| anyhow::anyhow!("Could not determine config dir"))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let config = MissiveConfig {
        missive_root: Some(root),
    };
    let json = serde_json::to_string_pretty(&config)?;
    fs::write(path, json)?;
    Ok(())
}

/// Get the MISSIVE_ROOT directory from environment, persistent config, or default
pub fn missive_root() -> PathBuf {
    // 1. Check environment variable
    if let Ok(val) = std::env::var("MISSIVE_ROOT") {
        return PathBuf::from(val);
    }

    // 2. Check persistent config
    if let Some(root) = load_persistent_root() {
        // Set env var so subprocesses see it too
        std::env::set_var("MISSIVE_ROOT", &root);
        return root;
    }

    // 3. Default fallback
    PathBuf::from("missive_data")
}

/// Set the MISSIVE_ROOT directory at runtime
pub fn set_missive_root(path: PathBuf) {
    info!("Setting MISSIVE_ROOT to: {:?}", path);
    std::env::set_var("MISSIVE_ROOT", path);
}

/// JSON document store directory
pub fn documents_dir() -> PathBuf {
    missive_root().join("documents")
}

/// Media blob storage directory
pub fn blobs_dir() -> PathBuf {
    missive_root().join("blobs")
}

/// Ensure a single directory exists
pub fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        info!("Created directory: {:?}", path);
    }
    Ok(())
}

/// Initialize the complete directory structure
/// Call this once at app startup before any other operations
pub fn init_structure() -> anyhow::Result<PathBuf> {
    let root = missive_root();

    // Ensure root exists first
    ensure_dir(&root)?;

    ensure_dir(&documents_dir())?;
    ensure_dir(&blobs_dir())?;

    // Canonicalize for absolute path
    let canonical = fs::canonicalize(&root).unwrap_or_else(|_| root.clone());

    info!("Missive directory structure initialized at: {:?}", canonical);

    Ok(canonical)
}

/// Ensure a file's parent directory exists
pub fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}
