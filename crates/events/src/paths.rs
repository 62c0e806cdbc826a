use std::{
    borrow::Cow,
    path::{Component, Path, PathBuf},
};

fn expand_home(path: &Path) -> Cow<'_, Path> {
    // Try to expand tilde prefix to home directory
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return Cow::Owned(home.join(stripped));
        }
        tracing::warn!("cannot determine home directory, using path as-is");
    }
    Cow::Borrowed(path)
}

/// Resolve `.` and `..` without touching the filesystem
fn lexically_normalise(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Normalise a path reported in the log so that the same file always compares equal.
///
/// The path is made absolute (relative to the current working directory) and canonicalised.
/// Paths that cannot be canonicalised, e.g. because the file does not exist locally, fall back
/// to a lexically cleaned absolute path.
pub fn normalise_path(path: impl AsRef<Path>) -> PathBuf {
    let path = expand_home(path.as_ref());
    let absolute = if path.is_absolute() {
        path.into_owned()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(e) => {
                tracing::debug!(error = %e, "cannot determine current directory");
                path.into_owned()
            }
        }
    };

    match absolute.canonicalize() {
        Ok(canonical) => canonical,
        Err(e) => {
            tracing::trace!(path = %absolute.display(), error = %e, "canonicalising path");
            lexically_normalise(&absolute)
        }
    }
}
