use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::kelly::{DEFAULT_KELLY_MULTIPLIER, DEFAULT_MAX_FRACTION};

pub const DEFAULT_FID: f64 = 0.4;
const DEFAULT_ALIAS_TTL_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub alias_ttl: Duration,
    pub kelly_max_fraction: f64,
    pub kelly_multiplier: f64,
    pub default_fid: f64,
    pub team_directory: Option<PathBuf>,
    pub curated_teams: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            alias_ttl: Duration::from_secs(DEFAULT_ALIAS_TTL_SECS),
            kelly_max_fraction: DEFAULT_MAX_FRACTION,
            kelly_multiplier: DEFAULT_KELLY_MULTIPLIER,
            default_fid: DEFAULT_FID,
            team_directory: None,
            curated_teams: true,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let alias_ttl_secs = env::var("SLIP_ALIAS_TTL_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_ALIAS_TTL_SECS)
            .clamp(1, 3600);
        let kelly_max_fraction =
            env_f64("SLIP_KELLY_MAX_FRACTION", DEFAULT_MAX_FRACTION).clamp(0.0, 1.0);
        let kelly_multiplier =
            env_f64("SLIP_KELLY_MULTIPLIER", DEFAULT_KELLY_MULTIPLIER).clamp(0.0, 1.0);
        let default_fid = env_f64("SLIP_DEFAULT_FID", DEFAULT_FID).clamp(0.0, 1.0);
        let team_directory = opt_env("SLIP_TEAM_DIRECTORY").map(PathBuf::from);

        Self {
            alias_ttl: Duration::from_secs(alias_ttl_secs),
            kelly_max_fraction,
            kelly_multiplier,
            default_fid,
            team_directory,
            curated_teams: env_bool("SLIP_CURATED_TEAMS", true),
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| {
            let t = v.trim().to_ascii_lowercase();
            !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
        })
        .unwrap_or(default)
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
