//! Gateway configuration loading and env substitution.
//!
//! Config files: `streamhub.toml`, `streamhub.yaml`, or `streamhub.yml`.
//! Searched in `./` then `~/.config/streamhub/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values, followed by an
//! explicit [`apply_env_overrides`] pass so individual env vars win over
//! whatever the file says (spec §6.4).

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{RateLimitOverrides, ShardRange, StreamhubConfig, ThrottleConfig},
};
