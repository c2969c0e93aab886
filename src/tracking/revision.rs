//! Best-effort lookup of the commit the working directory is checked out at.

use std::path::Path;

use git2::Repository;

/// Outcome of a code revision lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeRevision {
    /// Hex commit hash of HEAD
    Commit(String),
    /// No revision could be read; the reason is for logging only
    Unavailable(String),
}

impl CodeRevision {
    /// Look up HEAD starting from the process working directory.
    pub fn from_current_dir() -> Self {
        match std::env::current_dir() {
            Ok(dir) => Self::discover(&dir),
            Err(e) => Self::Unavailable(format!("working directory unreadable: {}", e)),
        }
    }

    /// Search upward from `start` for a repository and read its HEAD commit.
    pub fn discover(start: &Path) -> Self {
        match head_commit(start) {
            Ok(sha) => Self::Commit(sha),
            Err(e) => Self::Unavailable(e.to_string()),
        }
    }

    pub fn commit(&self) -> Option<&str> {
        match self {
            Self::Commit(sha) => Some(sha),
            Self::Unavailable(_) => None,
        }
    }
}

fn head_commit(start: &Path) -> Result<String, git2::Error> {
    let repo = Repository::discover(start)?;
    let commit = repo.head()?.peel_to_commit()?;
    Ok(commit.id().to_string())
}
