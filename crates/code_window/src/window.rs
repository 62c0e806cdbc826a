use std::{
    collections::BTreeSet,
    fmt,
    path::{Path, PathBuf},
};

use crate::cache::FileCache;

pub const DEFAULT_WINDOW_SIZE: usize = 20;
pub const DEFAULT_EDGE_MARGIN: usize = 3;

pub const BREAKPOINT_MARKER: char = '●';
pub const CURRENT_LINE_MARKER: char = '→';

/// One row of a [`WindowView`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    /// 1-based line number, `None` for the error row
    pub number: Option<usize>,
    pub breakpoint: bool,
    pub current: bool,
    pub text: String,
}

impl DisplayLine {
    fn error(message: impl Into<String>) -> Self {
        Self {
            number: None,
            breakpoint: false,
            current: false,
            text: message.into(),
        }
    }

    /// Two marker columns: breakpoint, then current line
    pub fn markers(&self) -> String {
        let breakpoint = if self.breakpoint {
            BREAKPOINT_MARKER
        } else {
            ' '
        };
        let current = if self.current {
            CURRENT_LINE_MARKER
        } else {
            ' '
        };
        format!("{breakpoint}{current}")
    }
}

impl fmt::Display for DisplayLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.number {
            Some(_) => write!(f, "{} {}", self.markers(), self.text),
            None => write!(f, "   {}", self.text),
        }
    }
}

/// Lines `start..=end` of a file, ready to display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowView {
    pub lines: Vec<DisplayLine>,
    pub start: usize,
    pub end: usize,
}

impl WindowView {
    fn error(message: impl Into<String>) -> Self {
        Self {
            lines: vec![DisplayLine::error(message)],
            start: 1,
            end: 1,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.lines.as_slice(), [line] if line.number.is_none())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LastWindow {
    path: PathBuf,
    start: usize,
    end: usize,
}

/// Fixed size viewport over source files that follows the focus line without jumping around.
///
/// As long as the focus stays inside the previous window for the same file and away from its
/// edges, the window does not move. Close to an edge it scrolls just far enough to keep
/// `edge_margin` lines of context.
#[derive(Debug)]
pub struct CodeWindow {
    cache: FileCache,
    window_size: usize,
    edge_margin: usize,
    last_window: Option<LastWindow>,
}

impl Default for CodeWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE, DEFAULT_EDGE_MARGIN)
    }
}

impl CodeWindow {
    /// The margin is capped so that a window position always exists with the focus line at
    /// least `edge_margin` lines away from both edges.
    pub fn new(window_size: usize, edge_margin: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            cache: FileCache::new(),
            window_size,
            edge_margin: edge_margin.min((window_size - 1) / 2),
            last_window: None,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn get_window(
        &mut self,
        file_path: &Path,
        focus_line: usize,
        breakpoints: &BTreeSet<usize>,
        current_line: Option<usize>,
    ) -> WindowView {
        let file_path = resolve(file_path);
        let lines = match self.cache.lines(&file_path) {
            Ok(lines) => lines,
            Err(e) => {
                tracing::debug!(error = %e, "cannot load source file");
                return WindowView::error(format!(
                    "Error: Could not read {}",
                    file_path.display()
                ));
            }
        };
        if lines.is_empty() {
            return WindowView::error("Error: Empty file");
        }

        let (start, end) = self.window_bounds(&file_path, focus_line, lines.len());
        let lines = (start..=end)
            .zip(&lines[start - 1..end])
            .map(|(number, text)| DisplayLine {
                number: Some(number),
                breakpoint: breakpoints.contains(&number),
                current: current_line == Some(number),
                text: text.clone(),
            })
            .collect();

        WindowView { lines, start, end }
    }

    fn window_bounds(&mut self, file_path: &Path, focus_line: usize, total: usize) -> (usize, usize) {
        let size = self.window_size;
        let margin = self.edge_margin;
        let focus = focus_line.clamp(1, total);

        // ideal window centred on the focus, slid back inside the file
        let ideal_start = focus as isize - (size / 2) as isize;
        let ideal_end = ideal_start + size as isize - 1;
        let (mut start, mut end) = if ideal_start < 1 {
            (1, size.min(total))
        } else if ideal_end > total as isize {
            (total.saturating_sub(size - 1).max(1), total)
        } else {
            (ideal_start as usize, ideal_end as usize)
        };

        if let Some(last) = self.last_window.as_ref().filter(|last| last.path == file_path) {
            if (last.start..=last.end).contains(&focus) {
                if focus - last.start < margin {
                    start = focus.saturating_sub(margin).max(1);
                } else if last.end - focus < margin {
                    start = (focus + margin).saturating_sub(size - 1).max(1);
                } else {
                    start = last.start;
                }
                // always show a full window when the file is long enough
                end = (start + size - 1).min(total);
                start = end.saturating_sub(size - 1).max(1);
            }
        }

        self.last_window = Some(LastWindow {
            path: file_path.to_path_buf(),
            start,
            end,
        });
        (start, end)
    }

    /// Forget cached contents of one file, or of every file
    pub fn clear_cache(&mut self, file_path: Option<&Path>) {
        match file_path {
            Some(path) => {
                let path = resolve(path);
                self.cache.remove(&path);
                if self.last_window.as_ref().is_some_and(|last| last.path == path) {
                    self.last_window = None;
                }
            }
            None => {
                self.cache.clear();
                self.last_window = None;
            }
        }
    }

    /// Reload a file on next access, e.g. after it was edited
    pub fn invalidate_file(&mut self, file_path: &Path) {
        self.clear_cache(Some(file_path));
    }

    /// Drop the cached file if it changed on disk. Keeps the remembered window.
    pub fn invalidate_if_modified(&mut self, file_path: &Path) -> bool {
        self.cache.invalidate_if_modified(&resolve(file_path))
    }

    pub fn cached_files(&self) -> Vec<PathBuf> {
        self.cache.paths()
    }
}

fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
