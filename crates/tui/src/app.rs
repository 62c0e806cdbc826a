use std::{thread, time::Duration};

use code_window::CodeWindow;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use eyre::WrapErr;
use ratatui::{DefaultTerminal, Frame};
use state::SharedState;
use tailer::LogTailer;

use crate::dashboard;

/// Foreground half of the visualizer: redraws the dashboard at a fixed rate while the tailer
/// keeps the state up to date in the background
pub struct App {
    state: SharedState,
    window: CodeWindow,
    tailer: LogTailer,
    refresh_period: Duration,
    should_terminate: bool,
}

impl App {
    pub fn new(
        state: SharedState,
        window: CodeWindow,
        tailer: LogTailer,
        refresh_period: Duration,
    ) -> Self {
        Self {
            state,
            window,
            tailer,
            refresh_period,
            should_terminate: false,
        }
    }

    pub fn run(mut self, mut terminal: DefaultTerminal) -> eyre::Result<()> {
        let result = self.event_loop(&mut terminal);
        self.tailer.stop();
        result
    }

    fn event_loop(&mut self, terminal: &mut DefaultTerminal) -> eyre::Result<()> {
        // set up background thread polling for keyboard events
        let (tx, rx) = crossbeam_channel::unbounded();
        thread::spawn(move || {
            loop {
                match event::read() {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "error reading from event stream");
                    }
                }
            }
        });
        let ticker = crossbeam_channel::tick(self.refresh_period);

        loop {
            if self.should_terminate {
                tracing::info!("terminating application");
                return Ok(());
            }
            if !self.tailer.is_running() {
                tracing::info!("log tailer finished, terminating application");
                return Ok(());
            }

            terminal
                .draw(|frame| self.draw(frame))
                .wrap_err("drawing frame")?;

            crossbeam_channel::select! {
                recv(rx) -> msg => match msg {
                    Ok(Event::Key(key)) => self.handle_key(key),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "keyboard event stream closed");
                        self.should_terminate = true;
                    }
                },
                recv(ticker) -> _ => {}
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_terminate = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_terminate = true
            }
            KeyCode::Char('r') => {
                tracing::debug!("reloading source files");
                self.window.clear_cache(None);
            }
            _ => {}
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let stats = self.tailer.stats();
        let dashboard = dashboard::compose(&self.state, &mut self.window, &stats);
        dashboard::draw(frame, &dashboard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{Terminal, backend::TestBackend};
    use state::{ActivityEntry, ActivityStatus};
    use tailer::TailerOptions;

    fn app(dir: &std::path::Path) -> App {
        let tailer = LogTailer::new(
            dir.join("server.log"),
            TailerOptions {
                cursor_path: dir.join("position"),
                ..TailerOptions::default()
            },
        );
        App::new(
            SharedState::default(),
            CodeWindow::default(),
            tailer,
            Duration::from_millis(250),
        )
    }

    #[test]
    fn quit_keys() {
        let dir = tempfile::tempdir().unwrap();

        for key in [
            KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE),
            KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE),
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        ] {
            let mut app = app(dir.path());
            app.handle_key(key);
            assert!(app.should_terminate, "{key:?} should quit");
        }

        let mut app = app(dir.path());
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE));
        app.handle_key(KeyEvent::new_with_kind(
            KeyCode::Char('q'),
            KeyModifiers::NONE,
            KeyEventKind::Release,
        ));
        assert!(!app.should_terminate);
    }

    #[test]
    fn reload_key_clears_source_cache() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.py");
        std::fs::write(&source, "a = 1\n").unwrap();

        let mut app = app(dir.path());
        app.state
            .with_state(|state| state.update_location(source.canonicalize().unwrap(), 1))
            .unwrap();

        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|frame| app.draw(frame)).unwrap();
        assert_eq!(app.window.cached_files().len(), 1);

        app.handle_key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::NONE));
        assert!(app.window.cached_files().is_empty());
        assert!(!app.should_terminate);
    }

    #[test]
    fn draw_reflects_state_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();

        terminal.draw(|frame| app.draw(frame)).unwrap();
        app.state
            .with_state(|state| {
                state.add_activity(ActivityEntry::new(
                    "continue_execution",
                    ActivityStatus::Calling,
                    "Continuing...",
                ))
            })
            .unwrap();
        terminal.draw(|frame| app.draw(frame)).unwrap();

        let buffer = terminal.backend().buffer();
        let screen: String = buffer.content().iter().map(|cell| cell.symbol()).collect();
        assert!(screen.contains("⟳ continue_execution"));
        assert!(screen.contains("Continuing..."));
    }
}
