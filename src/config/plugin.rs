/// Plugin configuration: mapping-file location and status-source tuning
use crate::config::types::{MappingError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Plugin option selecting the mapping file
pub const PLUGIN_ARG_MAPFILE: &str = "-mapfile";

/// Mapping file used when the plugin is configured without `-mapfile`
pub const DEFAULT_MAPFILE: &str = "/etc/grid-security/glexec-mapfile";

/// Root of the kernel's per-process status tree
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Bytes of a status record examined by the inspector.
///
/// Fields beyond this window are never seen; the scan then fails with
/// `ParseFailure` rather than reading further.
pub const DEFAULT_STATUS_WINDOW: usize = 4095;

/// Largest accepted status window. Status records are a few KiB.
pub const MAX_STATUS_WINDOW: usize = 1024 * 1024;

/// Configuration passed explicitly into every resolution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Administrator-maintained source -> target mapping file
    pub mapfile: PathBuf,
    /// Directory holding `<pid>/status` records
    pub proc_root: PathBuf,
    /// Maximum bytes read from one status record
    pub status_window: usize,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            mapfile: PathBuf::from(DEFAULT_MAPFILE),
            proc_root: PathBuf::from(DEFAULT_PROC_ROOT),
            status_window: DEFAULT_STATUS_WINDOW,
        }
    }
}

impl PluginConfig {
    /// Parse host plugin arguments. `args[0]` is the plugin name.
    pub fn from_plugin_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let mut config = Self::default();
        let mut mapfile: Option<PathBuf> = None;

        let mut idx = 1;
        while idx < args.len() {
            let arg = args[idx].as_ref();
            log::debug!("static-mapping: arg {} is {}", idx, arg);

            if arg.eq_ignore_ascii_case(PLUGIN_ARG_MAPFILE) && idx + 1 < args.len() {
                idx += 1;
                let value = args[idx].as_ref();
                if !value.is_empty() {
                    mapfile = Some(PathBuf::from(value));
                    log::debug!("static-mapping: Mapfile is {}", value);
                }
            } else {
                return Err(MappingError::Config(format!(
                    "Invalid plugin option: {}",
                    arg
                )));
            }
            idx += 1;
        }

        if let Some(path) = mapfile {
            config.mapfile = path;
        }
        Ok(config)
    }

    /// Load configuration from a JSON file; missing fields take defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MappingError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: PluginConfig = serde_json::from_str(&content)
            .map_err(|e| MappingError::Config(format!("Failed to parse config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mapfile.as_os_str().is_empty() {
            return Err(MappingError::Config("mapfile path is empty".to_string()));
        }
        if self.status_window == 0 {
            return Err(MappingError::Config(
                "status_window must be greater than zero".to_string(),
            ));
        }
        if self.status_window > MAX_STATUS_WINDOW {
            return Err(MappingError::Config(format!(
                "status_window {} exceeds the maximum of {} bytes",
                self.status_window, MAX_STATUS_WINDOW
            )));
        }
        Ok(())
    }
}
