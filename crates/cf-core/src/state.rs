//! The session's working directory.
//!
//! The process-wide cwd is never touched; every subprocess and file step gets
//! the session directory passed explicitly.

use std::path::{Path, PathBuf};

use crate::config::home_dir;
use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    cwd: PathBuf,
}

impl SessionState {
    /// Start in `cwd`, which should already be absolute.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    /// Start in the process's current directory.
    pub fn from_process() -> Result<Self, CoreError> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Resolve `path` against the session directory, expanding a leading `~`.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let expanded = expand_home(path);
        if expanded.is_absolute() {
            expanded
        } else {
            self.cwd.join(expanded)
        }
    }

    /// Move to `target`. On failure the current directory is left unchanged.
    pub fn change_dir(&mut self, target: &str) -> Result<&Path, CoreError> {
        let target = target.trim();
        let candidate = if target.is_empty() {
            home_dir()
        } else {
            self.resolve(target)
        };

        let resolved = candidate
            .canonicalize()
            .map_err(|_| CoreError::DirectoryNotFound(candidate.clone()))?;
        if !resolved.is_dir() {
            return Err(CoreError::NotADirectory(resolved));
        }

        tracing::debug!(from = %self.cwd.display(), to = %resolved.display(), "cd");
        self.cwd = resolved;
        Ok(&self.cwd)
    }

    /// The cwd with the home directory abbreviated to `~`.
    pub fn display_path(&self) -> String {
        let home = home_dir();
        match self.cwd.strip_prefix(&home) {
            Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
            Ok(rest) => format!("~/{}", rest.display()),
            Err(_) => self.cwd.display().to_string(),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        home_dir()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home_dir().join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// Characters that make a `cd` line a compound shell command.
const SHELL_OPERATORS: [char; 8] = ['&', '|', ';', '<', '>', '(', ')', '`'];

/// If `command` is a bare directory change (`cd` or `cd <dir>`), the target.
/// An empty target means the home directory. Anything with more than one
/// argument or a shell operator is left for the shell.
pub fn directory_change_target(command: &str) -> Option<&str> {
    let command = command.trim();
    let rest = if command == "cd" {
        ""
    } else {
        command.strip_prefix("cd ")?.trim()
    };
    single_word(rest)
}

fn single_word(s: &str) -> Option<&str> {
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|s| s.strip_suffix(quote)) {
            return (!inner.contains(quote)).then_some(inner);
        }
    }
    let plain = !s.chars().any(|c| {
        c.is_whitespace() || c == '"' || c == '\'' || SHELL_OPERATORS.contains(&c)
    });
    plain.then_some(s)
}
