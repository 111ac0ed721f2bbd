//! Layered configuration
//!
//! Four layers, later ones winning:
//! 1. Built-in defaults
//! 2. User config (`~/.config/spec2sim/config.toml`)
//! 3. Project config (`./spec2sim.toml`)
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;
mod settings;

pub use defaults::BuiltinDefaults;
pub use effective::{
    user_config_path, ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig,
    PROJECT_CONFIG_FILE,
};
pub use merge::{deep_merge, merge_layers};
pub use settings::{
    OracleSettings, OutputSettings, PipelineSettings, SandboxSettings, Settings, VerifySettings,
    MAX_ATTEMPTS_LIMIT,
};
