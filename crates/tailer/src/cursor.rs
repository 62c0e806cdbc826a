use std::{
    fs::{self, Metadata},
    io,
    path::{Path, PathBuf},
};

use eyre::WrapErr;

/// Reasons a persisted cursor could not be used
#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    #[error("no cursor file at {0}")]
    Missing(PathBuf),

    #[error("cursor file contains {contents:?}, not a byte offset")]
    Corrupt { contents: String },

    #[error("reading cursor file")]
    Io(#[from] io::Error),
}

/// Side-car file holding the byte offset of the last processed line as plain text
#[derive(Debug, Clone)]
pub struct CursorFile {
    path: PathBuf,
}

impl CursorFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<u64, CursorError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CursorError::Missing(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        contents
            .trim()
            .parse()
            .map_err(|_| CursorError::Corrupt { contents })
    }

    /// Write the offset through a temporary file and rename it into place, so a crash never
    /// leaves a half-written cursor behind
    pub fn save(&self, offset: u64) -> eyre::Result<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, offset.to_string())
            .wrap_err_with(|| format!("writing cursor to {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .wrap_err_with(|| format!("moving cursor into {}", self.path.display()))?;
        Ok(())
    }

    pub fn clear(&self) -> eyre::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).wrap_err_with(|| format!("removing cursor {}", self.path.display()))
            }
        }
    }

    /// Offset to resume from in a file that is currently `file_len` bytes long.
    ///
    /// A missing cursor starts from the beginning, an unreadable one from the end of the file.
    /// An offset past the end means the file was truncated while we were not watching.
    pub fn resume_offset(&self, file_len: u64) -> u64 {
        match self.load() {
            Ok(offset) if offset <= file_len => offset,
            Ok(offset) => {
                tracing::info!(offset, file_len, "saved offset past end of file, starting over");
                0
            }
            Err(CursorError::Missing(_)) => 0,
            Err(e) => {
                tracing::warn!(error = %e, "unusable cursor, starting from end of file");
                file_len
            }
        }
    }
}

/// Position of the tailer within the file it follows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailerCursor {
    pub path: PathBuf,
    pub offset: u64,
    /// Identity of the file the offset refers to; `None` where the platform has no inodes
    pub inode: Option<u64>,
}

impl TailerCursor {
    pub fn new(path: impl Into<PathBuf>, offset: u64) -> Self {
        Self {
            path: path.into(),
            offset,
            inode: None,
        }
    }

    /// Record the identity of the file currently at `path`.
    ///
    /// Returns true when a previously seen file was replaced, in which case the offset is
    /// reset to the start of the new file.
    pub fn observe(&mut self, metadata: &Metadata) -> bool {
        let inode = file_id(metadata);
        let rotated = self.inode.is_some() && inode != self.inode;
        self.inode = inode;
        if rotated {
            self.offset = 0;
        }
        rotated
    }
}

#[cfg(unix)]
fn file_id(metadata: &Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn file_id(_metadata: &Metadata) -> Option<u64> {
    None
}
