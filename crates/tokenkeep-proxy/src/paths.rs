//! XDG-compliant path helpers.
//!
//! Respects `XDG_CONFIG_HOME`, falling back to the platform config directory.

use std::path::PathBuf;

/// Returns the config base directory.
///
/// Uses `XDG_CONFIG_HOME` if set, otherwise the platform default
/// (`~/.config` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
}

/// Returns `<config dir>/tokenkeep/proxy.toml`.
pub fn proxy_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("tokenkeep").join("proxy.toml"))
}
