use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;

use tokio_util::sync::CancellationToken;

use crate::address::Address;
use crate::error::FetchError;

/// Whether an address denotes a single artifact or a tree.
///
/// Callers probe the mode first and then pick `get` (directory) or
/// `get_file` (file); the choice is never inferred during retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    File,
    Directory,
}

impl FromStr for Mode {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Mode::File),
            "dir" | "directory" => Ok(Mode::Directory),
            _ => Err(FetchError::invalid_address(s, "unknown retrieval mode")),
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Mode::File => write!(f, "file"),
            Mode::Directory => write!(f, "directory"),
        }
    }
}

/// A single retrieval: where from, where to, and how.
///
/// Built once per call. Getters only ever rewrite `dst`, and only when
/// `inplace` is set.
#[derive(Debug, Clone)]
pub struct Request {
    pub address: Address,
    pub dst: PathBuf,
    /// Copy bytes instead of symlinking where a getter offers the choice.
    pub copy: bool,
    /// Use the source location itself as the result; nothing is transferred.
    pub inplace: bool,
    /// Getter that was forced during detection, if any.
    pub forced: Option<String>,
    pub cancel: CancellationToken,
}

impl Request {
    pub fn new(address: Address, dst: impl Into<PathBuf>) -> Self {
        Request {
            address,
            dst: dst.into(),
            copy: false,
            inplace: false,
            forced: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_copy(mut self, copy: bool) -> Self {
        self.copy = copy;
        self
    }

    pub fn with_inplace(mut self, inplace: bool) -> Self {
        self.inplace = inplace;
        self
    }

    pub fn with_forced(mut self, forced: impl Into<String>) -> Self {
        self.forced = Some(forced.into());
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
