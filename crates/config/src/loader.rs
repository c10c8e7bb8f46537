use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Context, Result},
    schema::StreamhubConfig,
};

const CONFIG_FILENAMES: &[&str] = &["streamhub.toml", "streamhub.yaml", "streamhub.yml"];

/// Load config from the given path (TOML or YAML).
pub fn load_config(path: &Path) -> Result<StreamhubConfig> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations (spec §6.4):
///
/// 1. `./streamhub.{toml,yaml,yml}` (project-local)
/// 2. `~/.config/streamhub/streamhub.{toml,yaml,yml}` (user-global)
///
/// Falls back to `StreamhubConfig::default()`, then applies env overrides
/// unconditionally so a bare `PORT=9000` works with no config file at all.
pub fn discover_and_load() -> StreamhubConfig {
    let mut config = if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => cfg,
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to load config, using defaults");
                StreamhubConfig::default()
            },
        }
    } else {
        debug!("no config file found, using defaults");
        StreamhubConfig::default()
    };

    apply_env_overrides(&mut config);
    config
}

/// Overlay environment variables onto an already-loaded config (spec §6.4).
/// Malformed values are logged and skipped rather than treated as fatal.
pub fn apply_env_overrides(config: &mut StreamhubConfig) {
    if let Some(v) = env_parsed::<u16>("PORT") {
        config.port = v;
    }
    if let Ok(v) = std::env::var("SERVER_ID") {
        config.server_id = v;
    }
    if let Some(v) = env_parsed::<u32>("MAX_CONNECTIONS") {
        config.max_connections = v;
    }
    if let Ok(v) = std::env::var("ROOM_SHARD_RANGE") {
        match v.parse() {
            Ok(range) => config.room_shard_range = range,
            Err(error) => warn!(%error, value = %v, "ignoring malformed ROOM_SHARD_RANGE"),
        }
    }
    if let Some(v) = env_parsed::<u32>("SHARD_COUNT") {
        config.shard_count = v;
    }
    if let Ok(v) = std::env::var("CORS_ORIGIN") {
        config.cors_origin = v;
    }
    if let Ok(v) = std::env::var("STORE_URLS") {
        config.store_urls = v.split(',').map(str::trim).map(str::to_string).collect();
    }
    if let Some(v) = env_parsed::<f32>("THROTTLE_CPU_WATERMARK") {
        config.throttle.cpu_high_watermark = v;
    }
    if let Some(v) = env_parsed::<f32>("THROTTLE_MEMORY_WATERMARK") {
        config.throttle.memory_high_watermark = v;
    }
    if let Some(v) = env_parsed::<u32>("RATE_LIMIT_MESSAGES_PER_WINDOW") {
        config.rate_limit.messages_per_window = Some(v);
    }
    if let Some(v) = env_parsed::<u64>("RATE_LIMIT_WINDOW_SECS") {
        config.rate_limit.window_secs = Some(v);
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(name, value = %raw, "ignoring malformed env override");
                None
            },
        },
        Err(_) => None,
    }
}

fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    if let Some(dirs) = directories::ProjectDirs::from("", "", "streamhub") {
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

/// Returns the user-global config directory (`~/.config/streamhub/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "streamhub").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<StreamhubConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    let wrap = |source: Box<dyn std::error::Error + Send + Sync>| crate::error::Error::Parse {
        path: path.display().to_string(),
        source,
    };

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| wrap(Box::new(e))),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| wrap(Box::new(e))),
        _ => Err(crate::error::Error::message(format!(
            "unsupported config format: .{ext}"
        ))),
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_apply_on_top_of_defaults() {
        // SAFETY: test-only, single-threaded within this test.
        unsafe {
            std::env::set_var("PORT", "9100");
            std::env::set_var("SERVER_ID", "node-a");
        }
        let mut config = StreamhubConfig::default();
        apply_env_overrides(&mut config);
        assert_eq!(config.port, 9100);
        assert_eq!(config.server_id, "node-a");
        unsafe {
            std::env::remove_var("PORT");
            std::env::remove_var("SERVER_ID");
        }
    }

    #[test]
    fn malformed_env_override_is_ignored() {
        unsafe {
            std::env::set_var("MAX_CONNECTIONS", "not-a-number");
        }
        let mut config = StreamhubConfig::default();
        let before = config.max_connections;
        apply_env_overrides(&mut config);
        assert_eq!(config.max_connections, before);
        unsafe {
            std::env::remove_var("MAX_CONNECTIONS");
        }
    }

    #[test]
    fn parse_toml_config() {
        let raw = "port = 9000\nserver_id = \"node-b\"\n";
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streamhub.toml");
        std::fs::write(&path, raw).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.server_id, "node-b");
    }
}
