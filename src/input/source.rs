//! Source selectors
//!
//! Each repository's source is given as `latest`, a revision, or a host
//! directory. The value is classified once, when the input is loaded, and
//! the classified variant is what every later stage consumes.

use crate::catalog::{Repository, SourceMode};
use crate::error::{EmulationError, Result};
use crate::settings::Settings;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Literal selecting the default branch tip
pub const LATEST_KEYWORD: &str = "latest";
/// Literal selecting the default folder path from the settings file
pub const LOCAL_KEYWORD: &str = "local";

static COMMIT_SHA_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{40}$").expect("commit sha regex is valid"));

/// Where a repository's source comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceSelector {
    /// Tip of the default branch
    Latest,
    /// A commit sha or an allowed branch name
    Revision(String),
    /// Host directory bind mounted into the builder
    Local(PathBuf),
}

impl std::fmt::Display for SourceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceSelector::Latest => write!(f, "{}", LATEST_KEYWORD),
            SourceSelector::Revision(revision) => write!(f, "{}", revision),
            SourceSelector::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

impl SourceSelector {
    /// Classify a raw selector for the given repository
    pub fn classify(repo: Repository, value: &str, settings: &Settings) -> Result<Self> {
        let failed = || EmulationError::SourceClassificationFailed {
            field: repo.input_field().to_string(),
            value: value.to_string(),
        };

        if value == LATEST_KEYWORD {
            return Ok(SourceSelector::Latest);
        }

        if value == LOCAL_KEYWORD {
            return match settings.default_folder_path(repo) {
                Some(path) if path.is_dir() => Ok(SourceSelector::Local(path.to_path_buf())),
                _ => Err(failed()),
            };
        }

        if COMMIT_SHA_REGEX.is_match(value) || value == repo.default_branch() {
            return Ok(SourceSelector::Revision(value.to_string()));
        }

        let path = Path::new(value);
        if path.is_absolute() && path.is_dir() {
            return Ok(SourceSelector::Local(path.to_path_buf()));
        }

        Err(failed())
    }

    pub fn mode(&self) -> SourceMode {
        match self {
            SourceSelector::Local(_) => SourceMode::Local,
            _ => SourceMode::Remote,
        }
    }

    pub fn is_local(&self) -> bool {
        self.mode() == SourceMode::Local
    }

    pub fn local_path(&self) -> Option<&Path> {
        match self {
            SourceSelector::Local(path) => Some(path),
            _ => None,
        }
    }
}
