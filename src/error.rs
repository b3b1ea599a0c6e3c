use std::{
    io,
    path::{Path, PathBuf},
};

use crate::dhcp_parsers::LeasesParseError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` failed ({}): {}", exit_status(.code), .stderr.trim())]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{} not found", .path.display())]
    NotFound { path: PathBuf },

    #[error("permission denied for {}; run this tool with sudo", .path.display())]
    PermissionDenied { path: PathBuf },

    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error("invalid address range: {0}")]
    InvalidRange(String),

    #[error("lease has no {0}")]
    IncompleteLease(&'static str),

    #[error(transparent)]
    LeasesParser(#[from] LeasesParseError),

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl Error {
    /// Sorts an io error on `path` into not-found, permission, or other.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

#[allow(clippy::ref_option)]
fn exit_status(code: &Option<i32>) -> String {
    code.map_or_else(|| "killed by signal".to_string(), |c| format!("exit status {c}"))
}
