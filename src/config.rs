//! Shared configuration types for the Qserv CLI surface (spec §6.5).
//!
//! [`SharedFlags`] carries the flags common to every partitioning tool. Each
//! binary flattens it into its own `clap::Parser` struct with
//! `#[command(flatten)]`, following `orbit-star`'s composition style.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Flags shared by the HTM indexer, duplicator, and layout viewer.
#[derive(Debug, Clone, clap::Args, Serialize, Deserialize)]
pub struct SharedFlags {
    /// Output directory for generated files.
    #[arg(long = "out.dir")]
    pub out_dir: PathBuf,

    /// Number of output node subdirectories to hash records into.
    #[arg(long = "out.num-nodes", default_value_t = 1)]
    pub out_num_nodes: u32,

    /// Number of map-reduce worker threads (0 = auto-detect).
    #[arg(long = "mr.num-workers", default_value_t = 0)]
    pub mr_num_workers: usize,

    /// Map-reduce input block size, in MiB.
    #[arg(long = "mr.block-size", default_value_t = 16)]
    pub mr_block_size: usize,

    /// Input field list (name[:type] pairs, comma separated).
    #[arg(long = "in.fields")]
    pub in_fields: Option<String>,

    /// Output field list.
    #[arg(long = "out.fields")]
    pub out_fields: Option<String>,

    /// Partitioning position field pair, "lonField,latField".
    #[arg(long = "part.pos")]
    pub part_pos: Option<String>,

    /// Record id field name.
    #[arg(long = "id")]
    pub id_field: Option<String>,

    /// Emit debug-level logging.
    #[arg(long, short)]
    pub verbose: bool,
}

impl SharedFlags {
    pub const MAX_NUM_NODES: u32 = 99_999;

    /// Validate cross-field invariants not expressible in `clap` alone.
    pub fn validate(&self) -> Result<(), crate::error::QservError> {
        if self.out_num_nodes < 1 || self.out_num_nodes > Self::MAX_NUM_NODES {
            return Err(crate::error::QservError::config(format!(
                "out.num-nodes must be in [1, {}], got {}",
                Self::MAX_NUM_NODES,
                self.out_num_nodes
            )));
        }
        Ok(())
    }
}

/// On-disk TOML configuration for components that are long-running (the
/// Controller, the registry sync loop) rather than one-shot CLI tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    /// Minimum heartbeat interval for the registry worker-tracking loop, in
    /// seconds. Clamped to >= 1 per spec §4.7.
    #[serde(default = "default_heartbeat_ival_sec")]
    pub registry_heartbeat_ival_sec: u64,

    /// Whether newly observed workers are auto-registered into Configuration.
    #[serde(default)]
    pub controller_auto_register_workers: bool,

    /// Whether newly observed czars are auto-registered.
    #[serde(default)]
    pub controller_auto_register_czars: bool,

    /// Default request expiration, in seconds. `None` disables expiration timers.
    #[serde(default)]
    pub default_expiration_sec: Option<u64>,
}

fn default_heartbeat_ival_sec() -> u64 {
    5
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            registry_heartbeat_ival_sec: default_heartbeat_ival_sec(),
            controller_auto_register_workers: false,
            controller_auto_register_czars: false,
            default_expiration_sec: None,
        }
    }
}

impl ControlPlaneConfig {
    /// Load from a TOML file, falling back to defaults if it does not exist.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| crate::error::QservError::config(format!("parsing {path:?}: {e}")))
    }

    /// Heartbeat interval clamped to a stated minimum of 1 second.
    pub fn heartbeat_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.registry_heartbeat_ival_sec.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_heartbeat_is_clamped() {
        let mut cfg = ControlPlaneConfig::default();
        cfg.registry_heartbeat_ival_sec = 0;
        assert_eq!(cfg.heartbeat_interval().as_secs(), 1);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = ControlPlaneConfig::load(std::path::Path::new("/nonexistent/qserv.toml"))
            .expect("missing file is not an error");
        assert_eq!(cfg.registry_heartbeat_ival_sec, 5);
    }
}
