//! User configuration, read from `config.toml` in the platform config directory.
//!
//! Every key is optional:
//!
//! ```toml
//! [tailer]
//! poll_interval_ms = 100
//! missing_file_backoff_ms = 500
//! error_backoff_ms = 1000
//! stop_timeout_ms = 2000
//! cursor_path = ".visualizer_position"
//!
//! [view]
//! window_size = 20
//! edge_margin = 3
//! refresh_hz = 4
//!
//! [state]
//! activity_capacity = 20
//! ```
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use eyre::WrapErr;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tailer: TailerConfig,
    pub view: ViewConfig,
    pub state: StateConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TailerConfig {
    pub poll_interval_ms: u64,
    pub missing_file_backoff_ms: u64,
    pub error_backoff_ms: u64,
    pub stop_timeout_ms: u64,
    /// Side-car file holding the resume offset, relative to the working directory
    pub cursor_path: PathBuf,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            missing_file_backoff_ms: 500,
            error_backoff_ms: 1000,
            stop_timeout_ms: 2000,
            cursor_path: PathBuf::from(".visualizer_position"),
        }
    }
}

impl TailerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn missing_file_backoff(&self) -> Duration {
        Duration::from_millis(self.missing_file_backoff_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewConfig {
    pub window_size: usize,
    pub edge_margin: usize,
    pub refresh_hz: u32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            edge_margin: 3,
            refresh_hz: 4,
        }
    }
}

impl ViewConfig {
    /// Time between frames
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(1) / self.refresh_hz.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateConfig {
    pub activity_capacity: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            activity_capacity: 20,
        }
    }
}

/// `config.toml` in the platform config directory, e.g. `~/.config/dapviz/config.toml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dapviz").join("config.toml"))
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

impl Config {
    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> eyre::Result<Self> {
        let mut config: Config = toml::from_str(contents).wrap_err("parsing configuration")?;
        config.tailer.cursor_path = expand_home(&config.tailer.cursor_path);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration.
    ///
    /// With an explicit path the file must exist. Otherwise the default location is used
    /// when present and the built-in defaults when not.
    pub fn load(path: Option<&Path>) -> eyre::Result<Self> {
        let (path, required) = match path {
            Some(path) => (expand_home(path), true),
            None => match default_path() {
                Some(path) => (path, false),
                None => {
                    tracing::debug!("no config directory on this platform, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound && !required => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).wrap_err_with(|| format!("reading config file {}", path.display()));
            }
        };

        tracing::info!(path = %path.display(), "loaded config file");
        Self::from_toml(&contents).wrap_err_with(|| format!("in {}", path.display()))
    }

    pub fn validate(&self) -> eyre::Result<()> {
        eyre::ensure!(self.tailer.poll_interval_ms > 0, "tailer.poll_interval_ms must be positive");
        eyre::ensure!(self.view.window_size > 0, "view.window_size must be positive");
        eyre::ensure!(
            2 * self.view.edge_margin < self.view.window_size,
            "view.edge_margin ({}) must leave room for the focus line in a window of {} lines",
            self.view.edge_margin,
            self.view.window_size
        );
        eyre::ensure!(self.view.refresh_hz > 0, "view.refresh_hz must be positive");
        eyre::ensure!(
            self.state.activity_capacity > 0,
            "state.activity_capacity must be positive"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.tailer.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.view.refresh_period(), Duration::from_millis(250));
        assert_eq!(config.tailer.cursor_path, PathBuf::from(".visualizer_position"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [view]
            window_size = 30

            [state]
            activity_capacity = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.view.window_size, 30);
        assert_eq!(config.view.edge_margin, 3);
        assert_eq!(config.state.activity_capacity, 50);
        assert_eq!(config.tailer, TailerConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Config::from_toml("[view]\nwindow_size = 0\n").is_err());
        assert!(Config::from_toml("[view]\nrefresh_hz = 0\n").is_err());
        assert!(Config::from_toml("[view]\nwindow_size = 20\nedge_margin = 10\n").is_err());
        assert!(Config::from_toml("[view]\nwindow_size = 7\nedge_margin = 3\n").is_ok());
        assert!(Config::from_toml("[tailer]\npoll_interval_ms = \"fast\"\n").is_err());
        assert!(Config::from_toml("[tailer]\npoll_intervall_ms = 5\n").is_err());
    }

    #[test]
    fn load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[tailer]\npoll_interval_ms = 25\ncursor_path = \"/tmp/pos\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.tailer.poll_interval(), Duration::from_millis(25));
        assert_eq!(config.tailer.cursor_path, PathBuf::from("/tmp/pos"));
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[view\nwindow_size = ").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
