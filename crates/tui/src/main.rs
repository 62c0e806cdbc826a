use std::path::{Path, PathBuf};

use clap::Parser;
use code_window::CodeWindow;
use color_eyre::{eyre, eyre::Context};
use config::Config;
use events::EventParser;
use state::{DebugState, SharedState};
use tailer::{LogTailer, TailerOptions};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod app;
mod dashboard;
mod handlers;
mod widgets;

/// Live terminal view of a debugging session, following the debugger server's structured log
#[derive(Debug, Parser)]
#[command(name = "dapviz", version)]
struct Args {
    /// Log file written by the debugger server
    #[arg(default_value = "logs/debug-mcp-server.log")]
    log_path: PathBuf,

    /// Configuration file [default: <config dir>/dapviz/config.toml]
    #[arg(long)]
    config: Option<PathBuf>,

    /// File the read position is saved to
    #[arg(long)]
    cursor: Option<PathBuf>,

    /// Forget the saved position and read the log from the beginning
    #[arg(long)]
    fresh: bool,

    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Number of source lines in the code panel
    #[arg(long)]
    window_size: Option<usize>,

    /// Lines kept between the current line and the edge of the code panel
    #[arg(long)]
    edge_margin: Option<usize>,

    /// Directory for the visualizer's own diagnostics [default: <data dir>/dapviz]
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Args {
    /// Command line flags take precedence over the configuration file
    fn apply(&self, config: &mut Config) {
        if let Some(cursor) = &self.cursor {
            config.tailer.cursor_path = cursor.clone();
        }
        if let Some(poll_interval_ms) = self.poll_interval_ms {
            config.tailer.poll_interval_ms = poll_interval_ms;
        }
        if let Some(window_size) = self.window_size {
            config.view.window_size = window_size;
        }
        if let Some(edge_margin) = self.edge_margin {
            config.view.edge_margin = edge_margin;
        }
    }
}

fn init_logging(log_dir: &Path) -> eyre::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("creating log directory {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::never(log_dir, "dapviz.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .try_init()
        .map_err(|e| eyre::eyre!("installing tracing subscriber: {}", e))?;
    Ok(guard)
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let log_dir = args
        .log_dir
        .clone()
        .or_else(|| dirs::data_local_dir().map(|dir| dir.join("dapviz")))
        .unwrap_or_else(|| PathBuf::from("."));
    let _guard = init_logging(&log_dir).context("setting up logging")?;

    let mut config = Config::load(args.config.as_deref()).context("loading configuration")?;
    args.apply(&mut config);
    config.validate().context("validating configuration")?;
    tracing::info!(log_path = %args.log_path.display(), ?config, "starting visualizer");

    let state = SharedState::new(DebugState::with_capacity(config.state.activity_capacity));
    let parser = EventParser::new(state.clone());

    let mut tailer = LogTailer::new(
        &args.log_path,
        TailerOptions {
            poll_interval: config.tailer.poll_interval(),
            missing_file_backoff: config.tailer.missing_file_backoff(),
            error_backoff: config.tailer.error_backoff(),
            stop_timeout: config.tailer.stop_timeout(),
            cursor_path: config.tailer.cursor_path.clone(),
        },
    );
    handlers::register_handlers(&tailer, &parser).context("registering event handlers")?;
    if args.fresh {
        tracing::info!("starting from the beginning of the log");
        tailer.clear_cursor().context("clearing saved position")?;
    }
    tailer.start().context("starting log tailer")?;

    let window = CodeWindow::new(config.view.window_size, config.view.edge_margin);
    let app = app::App::new(state, window, tailer, config.view.refresh_period());

    let terminal = ratatui::init();
    let result = app.run(terminal);
    ratatui::restore();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "dapviz",
            "server.log",
            "--cursor",
            "/tmp/pos",
            "--window-size",
            "30",
            "--poll-interval-ms",
            "50",
        ]);
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(args.log_path, PathBuf::from("server.log"));
        assert!(!args.fresh);
        assert_eq!(config.tailer.cursor_path, PathBuf::from("/tmp/pos"));
        assert_eq!(config.tailer.poll_interval_ms, 50);
        assert_eq!(config.view.window_size, 30);
        assert_eq!(config.view.edge_margin, 3);
    }

    #[test]
    fn default_log_path() {
        let args = Args::parse_from(["dapviz", "--fresh"]);
        assert_eq!(args.log_path, PathBuf::from("logs/debug-mcp-server.log"));
        assert!(args.fresh);
    }
}
