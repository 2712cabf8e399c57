use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

/// Configuration for a forumdb instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// URL to connect to the database
    pub database_url: String,
    /// How many connections the pool may hold
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// How long to wait for a pooled connection, e.g. "30s"
    #[serde(
        default = "default_connection_timeout",
        deserialize_with = "duration_deserialize_helper",
        serialize_with = "duration_serialize_helper"
    )]
    pub connection_timeout: Duration,
    /// File to log to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// The most verbose level to log at
    #[serde(default = "default_log_level")]
    pub log_level: LevelFilter,
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_log_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

impl Config {
    /// Open a config file at the given path.
    pub fn open<P>(path: P) -> Result<Config>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let msg = format!("Couldn't open config file at {}", path.display());

        let reader = File::open(path).map_err(|err| Error::from_io_error(err, msg))?;

        Ok(serde_yaml::from_reader(reader)?)
    }

    /// Generate a new config file from default values.
    pub fn generate<W>(mut out: W) -> Result<()>
    where
        W: std::io::Write,
    {
        writeln!(&mut out, "# Configuration for forumdb")?;
        serde_yaml::to_writer(&mut out, &Config::default())?;
        writeln!(&mut out)?;
        Ok(())
    }

    /// Get the default location of the config file.
    pub fn default_path() -> PathBuf {
        if cfg!(debug_assertions) {
            PathBuf::from("contrib/dev-config.yaml")
        } else {
            PathBuf::from("/etc/forumdb/config.yaml")
        }
    }

    /// Dump configuration info to the log.
    pub fn debug_log(&self) {
        use log::debug;

        debug!("  database url {}", self.database_url);
        debug!("  pool size {}", self.pool_size);
        debug!("  connection timeout {:?}", self.connection_timeout);
        debug!("  log level {}", self.log_level);
        if let Some(ref log_file) = self.log_file {
            debug!("  log file {}", log_file.display());
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        if cfg!(debug_assertions) {
            Config {
                database_url: "postgres://forumdb:@localhost/forumdb".into(),
                pool_size: default_pool_size(),
                connection_timeout: default_connection_timeout(),
                log_file: None,
                log_level: default_log_level(),
            }
        } else {
            Config {
                database_url: "postgres://forumdb:@localhost/forumdb".into(),
                pool_size: default_pool_size(),
                connection_timeout: default_connection_timeout(),
                log_file: Some(PathBuf::from("/var/log/forumdb/forumdb.log")),
                log_level: default_log_level(),
            }
        }
    }
}

fn duration_deserialize_helper<'de, D>(de: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(de)
        .and_then(|s| parse_duration::parse(&s).map_err(serde::de::Error::custom))
}

fn duration_serialize_helper<S>(duration: &Duration, se: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    format!("{}s", duration.as_secs()).serialize(se)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config() {
        let config: Config =
            serde_yaml::from_str("database_url: postgres://localhost/forum\n").unwrap();

        assert_eq!(config.database_url, "postgres://localhost/forum");
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.connection_timeout, Duration::from_secs(30));
        assert_eq!(config.log_file, None);
    }

    #[test]
    fn human_durations() {
        let yaml = "database_url: postgres://localhost/forum\n\
                    pool_size: 4\n\
                    connection_timeout: 2m 5s\n\
                    log_level: warn\n\
                    log_file: /tmp/forumdb.log\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.pool_size, 4);
        assert_eq!(config.connection_timeout, Duration::from_secs(125));
        assert_eq!(config.log_level, LevelFilter::Warn);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/forumdb.log")));
    }

    #[test]
    fn bad_duration() {
        let yaml = "database_url: x\nconnection_timeout: soon\n";
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn generated_config_reads_back() {
        let mut out = Vec::new();
        Config::generate(&mut out).unwrap();

        let config: Config = serde_yaml::from_slice(&out).unwrap();
        assert_eq!(config, Config::default());
    }
}
