use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, Seek, SeekFrom},
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use events::{EventKind, LogRecord, RecordError};
use eyre::WrapErr;

use crate::{
    cursor::{CursorFile, TailerCursor},
    stats::{StatsSnapshot, TailerStats},
};

/// Upper bound on lines handled per poll cycle, so a large backlog cannot delay `stop`
const MAX_LINES_PER_POLL: usize = 1024;

type Handler = Box<dyn FnMut(&LogRecord) + Send>;
type Handlers = Arc<Mutex<HashMap<EventKind, Handler>>>;

#[derive(Debug, Clone)]
pub struct TailerOptions {
    /// Sleep between polls when there is no new data
    pub poll_interval: Duration,
    /// Sleep while the log file does not exist
    pub missing_file_backoff: Duration,
    /// Sleep after a failed poll
    pub error_backoff: Duration,
    /// How long `stop` waits for the background thread
    pub stop_timeout: Duration,
    pub cursor_path: PathBuf,
}

impl Default for TailerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            missing_file_backoff: Duration::from_millis(500),
            error_backoff: Duration::from_secs(1),
            stop_timeout: Duration::from_secs(2),
            cursor_path: PathBuf::from(".visualizer_position"),
        }
    }
}

struct Worker {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: JoinHandle<()>,
}

/// Follows a log file on a background thread
pub struct LogTailer {
    path: PathBuf,
    options: TailerOptions,
    cursor_file: CursorFile,
    handlers: Handlers,
    stats: Arc<TailerStats>,
    running: Arc<AtomicBool>,
    worker: Option<Worker>,
}

impl LogTailer {
    pub fn new(path: impl Into<PathBuf>, options: TailerOptions) -> Self {
        let cursor_file = CursorFile::new(&options.cursor_path);
        Self {
            path: path.into(),
            options,
            cursor_file,
            handlers: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(TailerStats::default()),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register the handler for one discriminator, replacing any earlier one.
    ///
    /// Handlers run on the tailer thread, in log order.
    pub fn on_event<F>(&self, kind: EventKind, handler: F) -> eyre::Result<()>
    where
        F: FnMut(&LogRecord) + Send + 'static,
    {
        with_handlers(&self.handlers, |handlers| {
            if handlers.insert(kind, Box::new(handler)).is_some() {
                tracing::debug!(%kind, "replacing event handler");
            }
        })
    }

    /// Run the handler for a record directly, without going through the file.
    ///
    /// Returns whether a handler was registered for the record.
    pub fn inject(&self, record: &LogRecord) -> eyre::Result<bool> {
        with_handlers(&self.handlers, |handlers| match handlers.get_mut(&record.kind) {
            Some(handler) => {
                handler(record);
                true
            }
            None => false,
        })
    }

    /// Forget the persisted position, so the next start reads the file from the beginning.
    ///
    /// Fails while the tailer is running, since the background thread owns the offset.
    pub fn clear_cursor(&self) -> eyre::Result<()> {
        eyre::ensure!(!self.is_running(), "cannot clear the cursor of a running tailer");
        self.cursor_file.clear()?;
        self.stats.set_position(0);
        Ok(())
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Start following the file. Creates the file (and its directory) when missing.
    pub fn start(&mut self) -> eyre::Result<()> {
        if self.is_running() {
            tracing::debug!("tailer already running");
            return Ok(());
        }

        ensure_exists(&self.path)?;
        let file_len = fs::metadata(&self.path)
            .wrap_err_with(|| format!("reading metadata of {}", self.path.display()))?
            .len();
        let offset = self.cursor_file.resume_offset(file_len);
        tracing::info!(path = %self.path.display(), offset, "starting tailer");

        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
        self.running.store(true, Ordering::SeqCst);
        self.stats.set_position(offset);

        let poller = Poller {
            cursor: TailerCursor::new(&self.path, offset),
            reader: None,
            options: self.options.clone(),
            cursor_file: self.cursor_file.clone(),
            handlers: Arc::clone(&self.handlers),
            stats: Arc::clone(&self.stats),
            running: Arc::clone(&self.running),
            stop_rx,
        };

        let handle = thread::Builder::new()
            .name("dapviz-tailer".to_string())
            .spawn(move || {
                // dropped when the thread exits, which wakes up `stop`
                let _done = done_tx;
                poller.run();
            })
            .wrap_err("spawning tailer thread")?;

        self.worker = Some(Worker {
            stop_tx,
            done_rx,
            handle,
        });
        Ok(())
    }

    /// Ask the background thread to finish and wait for it, up to the stop timeout
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let Some(worker) = self.worker.take() else {
            return;
        };
        let _ = worker.stop_tx.try_send(());

        match worker.done_rx.recv_timeout(self.options.stop_timeout) {
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    timeout = ?self.options.stop_timeout,
                    "tailer thread did not stop in time, abandoning it"
                );
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    tracing::error!("tailer thread panicked");
                }
                tracing::debug!("tailer stopped");
            }
        }
    }
}

impl Drop for LogTailer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn with_handlers<F, T>(handlers: &Handlers, f: F) -> eyre::Result<T>
where
    F: FnOnce(&mut HashMap<EventKind, Handler>) -> T,
{
    let mut handlers = handlers
        .lock()
        .map_err(|e| eyre::eyre!("handlers mutex poisoned: {}", e))?;
    Ok(f(&mut handlers))
}

fn ensure_exists(path: &Path) -> eyre::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("creating log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .wrap_err_with(|| format!("creating log file {}", path.display()))?;
    Ok(())
}

/// What the loop should do after a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pause {
    /// More data may be waiting
    Busy,
    Idle,
    PartialLine,
    MissingFile,
    Error,
}

/// State owned by the background thread
struct Poller {
    cursor: TailerCursor,
    reader: Option<BufReader<File>>,
    options: TailerOptions,
    cursor_file: CursorFile,
    handlers: Handlers,
    stats: Arc<TailerStats>,
    running: Arc<AtomicBool>,
    stop_rx: Receiver<()>,
}

impl Poller {
    fn run(mut self) {
        let span = tracing::debug_span!("tailer", path = %self.cursor.path.display());
        let _guard = span.enter();

        while self.running.load(Ordering::SeqCst) {
            let pause = match self.poll() {
                Ok(pause) => pause,
                Err(e) => {
                    tracing::warn!(error = %e, "error while tailing log file");
                    self.stats.io_error();
                    self.reader = None;
                    Pause::Error
                }
            };
            if !self.sleep(pause) {
                break;
            }
        }
        tracing::debug!(offset = self.cursor.offset, "tailer loop finished");
    }

    /// Wait out a pause. Returns false once a stop was requested.
    fn sleep(&self, pause: Pause) -> bool {
        let duration = match pause {
            Pause::Busy => return self.running.load(Ordering::SeqCst),
            Pause::Idle => self.options.poll_interval,
            Pause::PartialLine => self.options.poll_interval / 2,
            Pause::MissingFile => self.options.missing_file_backoff,
            Pause::Error => self.options.error_backoff,
        };
        match self.stop_rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => self.running.load(Ordering::SeqCst),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn poll(&mut self) -> eyre::Result<Pause> {
        let metadata = match fs::metadata(&self.cursor.path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // whatever appears at the path next is a new file, even if it reuses the inode
                if self.reader.take().is_some() || self.cursor.offset > 0 {
                    tracing::info!("log file removed, waiting for it to reappear");
                    self.stats.rotated();
                    self.cursor.offset = 0;
                    self.cursor.inode = None;
                }
                return Ok(Pause::MissingFile);
            }
            Err(e) => return Err(e).wrap_err("reading log file metadata"),
        };

        if self.cursor.observe(&metadata) {
            tracing::info!("log file replaced, reading new file from the start");
            self.stats.rotated();
            self.reader = None;
        } else if metadata.len() < self.cursor.offset {
            tracing::info!(
                offset = self.cursor.offset,
                len = metadata.len(),
                "log file truncated, reading from the start"
            );
            self.stats.rotated();
            self.cursor.offset = 0;
            self.reader = None;
        }

        let reader = match self.reader.take() {
            Some(reader) => reader,
            None => {
                let mut file = File::open(&self.cursor.path).wrap_err("opening log file")?;
                file.seek(SeekFrom::Start(self.cursor.offset))
                    .wrap_err("seeking to saved offset")?;
                BufReader::new(file)
            }
        };
        let reader = self.reader.insert(reader);

        let mut line = Vec::new();
        for _ in 0..MAX_LINES_PER_POLL {
            if !self.running.load(Ordering::SeqCst) {
                return Ok(Pause::Busy);
            }

            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .wrap_err("reading log file")?;
            if read == 0 {
                return Ok(Pause::Idle);
            }
            if !line.ends_with(b"\n") {
                tracing::trace!(bytes = read, "partial line, waiting for the rest");
                reader
                    .seek(SeekFrom::Start(self.cursor.offset))
                    .wrap_err("rewinding partial line")?;
                return Ok(Pause::PartialLine);
            }

            dispatch_line(&self.handlers, &self.stats, &line);
            self.cursor.offset += read as u64;
            self.stats.set_position(self.cursor.offset);
            if let Err(e) = self.cursor_file.save(self.cursor.offset) {
                tracing::debug!(error = %e, "could not persist cursor");
            }
        }
        Ok(Pause::Busy)
    }
}

fn dispatch_line(handlers: &Handlers, stats: &TailerStats, line: &[u8]) {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(error = %e, "dropping line that is not valid UTF-8");
            stats.malformed();
            return;
        }
    };

    let record = match LogRecord::parse(text) {
        Ok(record) => record,
        Err(RecordError::Empty) => return,
        Err(RecordError::UnknownDiscriminator(message)) => {
            tracing::trace!(%message, "no handler for record");
            stats.unhandled();
            return;
        }
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed line");
            stats.malformed();
            return;
        }
    };

    let result = with_handlers(handlers, |handlers| {
        let Some(handler) = handlers.get_mut(&record.kind) else {
            return false;
        };
        if panic::catch_unwind(AssertUnwindSafe(|| handler(&record))).is_err() {
            tracing::error!(kind = %record.kind, "event handler panicked");
        }
        true
    });

    match result {
        Ok(true) => stats.dispatched(),
        Ok(false) => stats.unhandled(),
        Err(e) => tracing::error!(error = %e, "cannot dispatch record"),
    }
}
