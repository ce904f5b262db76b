//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::game::teams::TeamColor;
use crate::util::time::DEFAULT_TICK_INTERVAL_MS;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Match timer cadence
    pub tick_interval: Duration,
    /// Seed for the headless arena RNG (random when unset)
    pub arena_seed: Option<u64>,
    /// Match rules and timings
    pub match_settings: MatchSettings,
}

/// Rules and timings the coordinator runs with
#[derive(Clone, Debug, PartialEq)]
pub struct MatchSettings {
    /// Minimum alive (plus fake) participants required to start
    pub min_participants: usize,
    /// COUNTDOWN length in seconds
    pub countdown_secs: u32,
    /// COLLECTION length in seconds
    pub collection_secs: u32,
    /// PVP length in seconds
    pub pvp_secs: u32,
    /// Boundary size requested when COLLECTION starts
    pub collection_border: f64,
    /// Boundary size requested when PVP starts
    pub pvp_initial_border: f64,
    /// Boundary size the PVP shrink ends at
    pub border_final_size: f64,
    /// Duration of the PVP boundary shrink in seconds
    pub border_shrink_secs: u32,
    /// Global team mode
    pub teams_enabled: bool,
    /// Teams switched off at startup
    pub disabled_teams: Vec<TeamColor>,
    /// Per-tick status tag refresh
    pub status_tags_enabled: bool,
    /// Status tag template (`{name}`, `{hp}`)
    pub status_tag_format: String,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            min_participants: 2,
            countdown_secs: 30,
            collection_secs: 300,
            pvp_secs: 900,
            collection_border: 10_000.0,
            pvp_initial_border: 150.0,
            border_final_size: 5.0,
            border_shrink_secs: 300,
            teams_enabled: true,
            disabled_teams: Vec::new(),
            status_tags_enabled: true,
            status_tag_format: "{name} [{hp}❤]".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = MatchSettings::default();

        let mut disabled_teams = Vec::new();
        for team in TeamColor::ALL {
            let key = team.enabled_env_key();
            if !parse_var(&key, true)? {
                disabled_teams.push(team);
            }
        }

        let arena_seed = match env::var("SB_ARENA_SEED") {
            Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid {
                key: "SB_ARENA_SEED".to_string(),
                value: raw,
            })?),
            Err(_) => None,
        };

        let tick_ms: u64 = parse_var("SB_TICK_INTERVAL_MS", DEFAULT_TICK_INTERVAL_MS)?;
        if tick_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "SB_TICK_INTERVAL_MS".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            tick_interval: Duration::from_millis(tick_ms),
            arena_seed,
            match_settings: MatchSettings {
                min_participants: parse_var("SB_MIN_PARTICIPANTS", defaults.min_participants)?,
                countdown_secs: parse_var("SB_COUNTDOWN_SECONDS", defaults.countdown_secs)?,
                collection_secs: parse_var("SB_COLLECTION_SECONDS", defaults.collection_secs)?,
                pvp_secs: parse_var("SB_PVP_SECONDS", defaults.pvp_secs)?,
                collection_border: parse_var("SB_COLLECTION_BORDER", defaults.collection_border)?,
                pvp_initial_border: parse_var(
                    "SB_PVP_INITIAL_BORDER",
                    defaults.pvp_initial_border,
                )?,
                border_final_size: parse_var("SB_BORDER_FINAL_SIZE", defaults.border_final_size)?,
                border_shrink_secs: parse_var(
                    "SB_BORDER_SHRINK_SECONDS",
                    defaults.border_shrink_secs,
                )?,
                teams_enabled: parse_var("SB_TEAMS_ENABLED", defaults.teams_enabled)?,
                disabled_teams,
                status_tags_enabled: parse_var(
                    "SB_STATUS_TAGS_ENABLED",
                    defaults.status_tags_enabled,
                )?,
                status_tag_format: env::var("SB_STATUS_TAG_FORMAT")
                    .unwrap_or(defaults.status_tag_format),
            },
        })
    }
}

/// Read an optional variable, falling back to `default` when unset
fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {key}: {value:?}")]
    Invalid { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variable_uses_default() {
        let value: u32 = parse_var("SB_TEST_SURELY_UNSET_VARIABLE", 17).unwrap();
        assert_eq!(value, 17);
    }

    #[test]
    fn garbage_value_is_reported_with_key() {
        env::set_var("SB_TEST_GARBAGE_COUNTDOWN", "soon");
        let err = parse_var::<u32>("SB_TEST_GARBAGE_COUNTDOWN", 30).unwrap_err();
        assert!(err.to_string().contains("SB_TEST_GARBAGE_COUNTDOWN"));
        env::remove_var("SB_TEST_GARBAGE_COUNTDOWN");
    }

    #[test]
    fn default_settings_match_documented_timings() {
        let settings = MatchSettings::default();
        assert_eq!(settings.countdown_secs, 30);
        assert_eq!(settings.collection_secs, 300);
        assert_eq!(settings.pvp_secs, 900);
        assert!(settings.teams_enabled);
    }
}
