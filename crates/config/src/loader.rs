use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::GatewayConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["gateway.toml", "gateway.yaml", "gateway.yml", "gateway.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<GatewayConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::Read(path.to_path_buf(), e))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Load and parse the config file with env substitution, as a generic value.
pub fn load_config_value(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::Read(path.to_path_buf(), e))?;
    let raw = substitute_env(&raw);
    parse_config_value(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./gateway.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/gg-gateway/gateway.{toml,yaml,yml,json}` (user-global)
///
/// Returns `GatewayConfig::default()` if no config file is found.
pub fn discover_and_load() -> GatewayConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    GatewayConfig::default()
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    if let Some(dirs) = directories::ProjectDirs::from("", "", "gg-gateway") {
        let config_dir = dirs.config_dir();
        for name in CONFIG_FILENAMES {
            let p = config_dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/gg-gateway/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "gg-gateway").map(|d| d.config_dir().to_path_buf())
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gateway.toml")
}

/// Serialize `config` to TOML and write it to the user-global config path.
///
/// Creates parent directories if needed. Returns the path written to.
pub fn save_config(config: &GatewayConfig) -> Result<PathBuf> {
    let path = find_or_default_config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::Write(path.clone(), e))?;
    }
    let toml_str = toml::to_string_pretty(config)?;
    std::fs::write(&path, toml_str).map_err(|e| Error::Write(path.clone(), e))?;
    debug!(path = %path.display(), "saved config");
    Ok(path)
}

fn parse_config(raw: &str, path: &Path) -> Result<GatewayConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::UnsupportedFormat(ext.to_string())),
    }
}

fn parse_config_value(raw: &str, path: &Path) -> Result<serde_json::Value> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => {
            let v: toml::Value = toml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value = serde_yaml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::UnsupportedFormat(ext.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_dispatches_on_extension() {
        let toml_cfg = parse_config("bind = \"127.0.0.1:9000\"", Path::new("gateway.toml"))
            .expect("toml parses");
        assert_eq!(toml_cfg.bind, "127.0.0.1:9000");

        let json_cfg = parse_config(r#"{"bind":"127.0.0.1:9001"}"#, Path::new("gateway.json"))
            .expect("json parses");
        assert_eq!(json_cfg.bind, "127.0.0.1:9001");
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = parse_config("bind = \"x\"", Path::new("gateway.ini")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(ext) if ext == "ini"));
    }

    #[test]
    fn save_config_writes_loadable_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gateway.toml");

        let mut cfg = GatewayConfig::default();
        cfg.bind = "127.0.0.1:7000".to_string();
        std::fs::write(&path, toml::to_string_pretty(&cfg).expect("serialize")).expect("write");

        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded.bind, "127.0.0.1:7000");
    }
}
