//! Standard locations for spool files

use std::path::PathBuf;

/// Directory holding spool's configuration
///
/// Returns: `<platform config dir>/spool`, or `./spool` when the platform
/// has no config directory.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spool")
}

/// Default engine config file: `<config dir>/spool/engine.yaml`
pub fn default_config_path() -> PathBuf {
    config_dir().join("engine.yaml")
}
