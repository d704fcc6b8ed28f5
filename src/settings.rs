use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct PersistentSettings {
    /// Key issued by the demo-user endpoint when no real key was configured.
    pub temporary_api_key: Option<String>,
    #[serde(default)]
    pub temporary_key_issued_at: Option<DateTime<Utc>>,
}

impl PersistentSettings {
    pub fn with_temporary_key(key: impl Into<String>) -> Self {
        Self {
            temporary_api_key: Some(key.into()),
            temporary_key_issued_at: Some(Utc::now()),
        }
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".scorable")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

pub fn load_settings(path: &Path) -> PersistentSettings {
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
        Err(_) => PersistentSettings::default(),
    }
}

/// Write settings atomically (temp file + rename) with owner-only permissions.
pub fn save_settings(path: &Path, settings: &PersistentSettings) {
    let json = match serde_json::to_string_pretty(settings) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize settings: {}", e);
            return;
        }
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!("Failed to create settings directory {:?}: {}", dir, e);
        return;
    }

    let tmp_path = path.with_extension("json.tmp");
    let result = std::fs::File::create(&tmp_path)
        .and_then(|mut f| f.write_all(json.as_bytes()))
        .and_then(|_| restrict_permissions(&tmp_path))
        .and_then(|_| std::fs::rename(&tmp_path, path));

    if let Err(e) = result {
        warn!("Failed to save settings to {:?}: {}", path, e);
        let _ = std::fs::remove_file(&tmp_path);
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
