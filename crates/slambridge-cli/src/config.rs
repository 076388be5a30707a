//! Configuration file – reads/writes `~/.slambridge/config.toml`.
//!
//! The file is optional. On first start the defaults are written out so the
//! topic and frame names can be edited in place; after that the file is only
//! read.

use std::fs;
use std::path::{Path, PathBuf};

use slambridge_types::{BridgeConfig, BridgeError};
use tracing::{info, warn};

/// Return the path to `~/.slambridge/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".slambridge").join("config.toml")
}

/// Load the config, falling back to defaults, then apply environment
/// overrides.
///
/// A missing file is created with the defaults (failure to write it is only
/// a warning). A file that cannot be read or parsed is reported and ignored.
pub fn load_or_default() -> BridgeConfig {
    let path = config_path();
    let mut cfg = match load_from(&path) {
        Ok(Some(cfg)) => {
            info!(path = %path.display(), "config loaded");
            cfg
        }
        Ok(None) => {
            let cfg = BridgeConfig::default();
            match save_to(&cfg, &path) {
                Ok(()) => info!(path = %path.display(), "default config written"),
                Err(e) => warn!(error = %e, "could not write default config"),
            }
            cfg
        }
        Err(e) => {
            warn!(error = %e, "config error; using defaults");
            BridgeConfig::default()
        }
    };
    apply_env_overrides(&mut cfg);
    cfg
}

/// Load the config from a specific path. Returns `None` if the file does not
/// exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<BridgeConfig>, BridgeError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        BridgeError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| BridgeError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `SLAMBRIDGE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SLAMBRIDGE_LISTEN_HOST` | `listen_host` |
/// | `SLAMBRIDGE_PORT` | `listen_port` |
/// | `SLAMBRIDGE_ROSBRIDGE_URL` | `rosbridge_url` |
pub fn apply_env_overrides(cfg: &mut BridgeConfig) {
    if let Ok(v) = std::env::var("SLAMBRIDGE_LISTEN_HOST") {
        cfg.listen_host = v;
    }
    if let Ok(v) = std::env::var("SLAMBRIDGE_PORT") {
        match v.parse::<u16>() {
            Ok(port) => cfg.listen_port = port,
            Err(_) => warn!(value = %v, "ignoring invalid SLAMBRIDGE_PORT"),
        }
    }
    if let Ok(v) = std::env::var("SLAMBRIDGE_ROSBRIDGE_URL") {
        cfg.rosbridge_url = v;
    }
}

/// Save the config to a specific path, creating the parent directory.
pub(crate) fn save_to(cfg: &BridgeConfig, path: &Path) -> Result<(), BridgeError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BridgeError::Config(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| BridgeError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        BridgeError::Config(format!("failed to write config at {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_points_to_slambridge_dir() {
        let p = config_path_for_home("/home/robot");
        assert!(p.to_string_lossy().contains(".slambridge"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&BridgeConfig::default(), &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, BridgeConfig::default());
        assert_eq!(loaded.listen_port, 8765);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "rosbridge_url = \"ws://robot:9090\"\n\n[topics]\nscan = \"/base_scan\"\n",
        )
        .unwrap();

        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.rosbridge_url, "ws://robot:9090");
        assert_eq!(cfg.topics.scan, "/base_scan");
        assert_eq!(cfg.topics.odom, "/odom");
        assert_eq!(cfg.frames.imu, "imu_link");
    }

    #[test]
    fn invalid_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "listen_port = \"eighty\"").unwrap();
        assert!(matches!(load_from(&path), Err(BridgeError::Config(_))));
    }

    // The env-var tests touch process-global state, so they run as one test.
    #[test]
    fn apply_env_overrides_reads_slambridge_vars() {
        // SAFETY: no other test in this crate reads these variables.
        unsafe {
            std::env::set_var("SLAMBRIDGE_PORT", "9876");
            std::env::set_var("SLAMBRIDGE_ROSBRIDGE_URL", "ws://10.0.0.2:9090");
            std::env::set_var("SLAMBRIDGE_LISTEN_HOST", "127.0.0.1");
        }
        let mut cfg = BridgeConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.listen_port, 9876);
        assert_eq!(cfg.rosbridge_url, "ws://10.0.0.2:9090");
        assert_eq!(cfg.listen_host, "127.0.0.1");

        unsafe { std::env::set_var("SLAMBRIDGE_PORT", "not-a-port") };
        let mut cfg = BridgeConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.listen_port, 8765);

        unsafe {
            std::env::remove_var("SLAMBRIDGE_PORT");
            std::env::remove_var("SLAMBRIDGE_ROSBRIDGE_URL");
            std::env::remove_var("SLAMBRIDGE_LISTEN_HOST");
        }
    }
}
