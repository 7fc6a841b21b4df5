use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::Deserialize;
use thiserror::Error;

use crate::collectors::tle_fetcher::CelestrakSource;
use crate::core::orbit::KeplerSettings;
use crate::tracking::engine::EngineSettings;
use crate::tracking::scheduler::MAX_TIME_OFFSET_DAYS;

const DAY_SECONDS: u64 = 86_400;
/// Upper bound for every duration-valued setting other than the time offset.
const MAX_PERIOD_SECONDS: u64 = 10 * 365 * DAY_SECONDS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub propagation: PropagationConfig,
    pub track: TrackConfig,
    pub refresh: RefreshConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub time_offset_seconds: i64,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_interval_ms: default_tick_interval_ms(), time_offset_seconds: 0 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropagationConfig {
    #[serde(default)]
    pub kepler: KeplerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackConfig {
    /// Trailing window; one orbital period per object when unset.
    #[serde(default)]
    pub window_seconds: Option<i64>,
    #[serde(default = "default_max_points")]
    pub max_points: usize,
}

fn default_max_points() -> usize {
    720
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self { window_seconds: None, max_points: default_max_points() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    #[serde(default = "default_refresh_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    #[serde(default = "default_refresh_interval")]
    pub cache_max_age_seconds: u64,
    /// Local TLE files loaded once at startup.
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

fn default_refresh_interval() -> u64 {
    2 * 60 * 60
}

fn default_sources() -> Vec<String> {
    vec!["stations".to_string()]
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("data/db/catalog.sqlite")
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_refresh_interval(),
            sources: default_sources(),
            cache_path: default_cache_path(),
            cache_max_age_seconds: default_refresh_interval(),
            files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: default_filter() }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let kepler = &self.propagation.kepler;
        if !(kepler.tolerance > 0.0 && kepler.tolerance.is_finite()) {
            return Err(invalid("propagation.kepler.tolerance", "must be a positive number"));
        }
        if kepler.max_iterations == 0 {
            return Err(invalid("propagation.kepler.max_iterations", "must be at least 1"));
        }
        if self.scheduler.tick_interval_ms == 0 {
            return Err(invalid("scheduler.tick_interval_ms", "must be at least 1"));
        }
        if self.track.max_points == 0 {
            return Err(invalid("track.max_points", "must be at least 1"));
        }
        if self.scheduler.tick_interval_ms > DAY_SECONDS * 1000 {
            return Err(invalid("scheduler.tick_interval_ms", "must be at most one day"));
        }
        let max_offset_seconds = MAX_TIME_OFFSET_DAYS as u64 * DAY_SECONDS;
        if self.scheduler.time_offset_seconds.unsigned_abs() > max_offset_seconds {
            return Err(invalid("scheduler.time_offset_seconds", "must be within 100 years"));
        }
        if let Some(window) = self.track.window_seconds {
            if window <= 0 || window as u64 > MAX_PERIOD_SECONDS {
                let reason = "must be positive and at most ten years";
                return Err(invalid("track.window_seconds", reason));
            }
        }
        let refresh_interval = self.refresh.interval_seconds;
        if refresh_interval == 0 || refresh_interval > MAX_PERIOD_SECONDS {
            return Err(invalid("refresh.interval_seconds", "must be between 1 s and ten years"));
        }
        if self.refresh.cache_max_age_seconds > MAX_PERIOD_SECONDS {
            return Err(invalid("refresh.cache_max_age_seconds", "must be at most ten years"));
        }
        for source in &self.refresh.sources {
            source
                .parse::<CelestrakSource>()
                .map_err(|e| invalid("refresh.sources", &e.to_string()))?;
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.scheduler.tick_interval_ms)
    }

    pub fn time_offset(&self) -> Duration {
        Duration::seconds(self.scheduler.time_offset_seconds)
    }

    pub fn refresh_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.refresh.interval_seconds)
    }

    pub fn cache_max_age(&self) -> Duration {
        Duration::seconds(self.refresh.cache_max_age_seconds as i64)
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            kepler: self.propagation.kepler,
            track_max_age: self.track.window_seconds.map(Duration::seconds),
            track_max_points: self.track.max_points,
        }
    }

    /// Sources that parsed; `validate` rejects configs with unknown ones.
    pub fn sources(&self) -> Vec<CelestrakSource> {
        self.refresh.sources.iter().filter_map(|s| s.parse().ok()).collect()
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_when_empty() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.tick_interval(), std::time::Duration::from_secs(1));
        assert_eq!(config.propagation.kepler, KeplerSettings::default());
        assert_eq!(config.track.max_points, 720);
        assert!(config.track.window_seconds.is_none());
        assert_eq!(config.refresh.interval_seconds, 7200);
        assert_eq!(config.refresh.cache_max_age_seconds, 7200);
        assert_eq!(config.refresh.sources, vec!["stations"]);
        assert_eq!(config.logging.filter, "info");
        assert_eq!(config.engine_settings(), EngineSettings::default());
    }

    #[test]
    fn yaml_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
scheduler:
  tick_interval_ms: 250
  time_offset_seconds: -3600
propagation:
  kepler:
    tolerance: 1.0e-10
    max_iterations: 25
track:
  window_seconds: 1800
refresh:
  sources: [weather, ISS, "2021-035A"]
  files: [local/extra.tle]
logging:
  filter: sattrack=debug
"#
        )
        .unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.tick_interval(), std::time::Duration::from_millis(250));
        assert_eq!(config.time_offset(), Duration::hours(-1));
        assert_eq!(config.propagation.kepler.max_iterations, 25);
        let settings = config.engine_settings();
        assert_eq!(settings.track_max_age, Some(Duration::minutes(30)));
        assert_eq!(settings.track_max_points, 720);
        assert_eq!(config.sources().len(), 3);
        assert_eq!(config.refresh.files, vec![PathBuf::from("local/extra.tle")]);
        assert_eq!(config.logging.filter, "sattrack=debug");
    }

    #[test]
    fn rejects_durations_out_of_range() {
        for (yaml, field) in [
            (
                "scheduler:\n  time_offset_seconds: 10000000000000\n",
                "scheduler.time_offset_seconds",
            ),
            (
                "scheduler:\n  time_offset_seconds: -9223372036854775808\n",
                "scheduler.time_offset_seconds",
            ),
            ("track:\n  window_seconds: 9223372036854775807\n", "track.window_seconds"),
            (
                "refresh:\n  cache_max_age_seconds: 18446744073709551615\n",
                "refresh.cache_max_age_seconds",
            ),
            ("refresh:\n  interval_seconds: 18446744073709551615\n", "refresh.interval_seconds"),
        ] {
            match Config::from_yaml(yaml) {
                Err(ConfigError::Invalid { field: got, .. }) => assert_eq!(got, field),
                other => panic!("{field}: expected rejection, got {other:?}"),
            }
        }
        let config = Config::from_yaml("scheduler:\n  time_offset_seconds: -3155760000\n").unwrap();
        assert_eq!(config.time_offset(), Duration::days(-MAX_TIME_OFFSET_DAYS));
        assert_eq!(config.cache_max_age(), Duration::hours(2));
    }

    #[test]
    fn rejects_bad_settings() {
        let yaml = "propagation:\n  kepler:\n    tolerance: 0.0\n    max_iterations: 10\n";
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "propagation.kepler.tolerance", .. }));
        assert!(matches!(
            Config::from_yaml("scheduler:\n  tick_interval_ms: 0\n"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            Config::from_yaml("refresh:\n  sources: [\"\"]\n"),
            Err(ConfigError::Invalid { field: "refresh.sources", .. })
        ));
        assert!(matches!(Config::from_yaml("scheduler: [1, 2]"), Err(ConfigError::Yaml(_))));
        assert!(matches!(
            Config::from_file(Path::new("/nonexistent/sattrack.yaml")),
            Err(ConfigError::Io(_))
        ));
    }
}
