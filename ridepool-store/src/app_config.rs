use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub review_cache: ReviewCacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// Trip status sweep cadence
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    pub interval_seconds: u64,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds.max(1))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_seconds: 60 }
    }
}

/// TTL of the cached first page of reviews: `ttl_seconds` plus up to `jitter_seconds`
#[derive(Debug, Deserialize, Clone)]
pub struct ReviewCacheConfig {
    pub ttl_seconds: u64,
    #[serde(default)]
    pub jitter_seconds: u64,
}

impl Default for ReviewCacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: 60, jitter_seconds: 10 }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked local overrides
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `RIDEPOOL_DATABASE__URL=postgres://...` sets `database.url`
            .add_source(config::Environment::with_prefix("RIDEPOOL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_fall_back_to_defaults() {
        let raw = config::Config::builder()
            .set_override("server.port", 8080)
            .unwrap()
            .set_override("database.url", "postgres://localhost/ridepool")
            .unwrap()
            .set_override("redis.url", "redis://localhost:6379")
            .unwrap()
            .build()
            .unwrap();

        let cfg: Config = raw.try_deserialize().unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.scheduler.interval(), Duration::from_secs(60));
        assert_eq!(cfg.review_cache.ttl_seconds, 60);
        assert_eq!(cfg.review_cache.jitter_seconds, 10);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let cfg = SchedulerConfig { interval_seconds: 0 };
        assert_eq!(cfg.interval(), Duration::from_secs(1));
    }
}
