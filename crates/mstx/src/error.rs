//! 💀 Errors, the typed kind, for when "something went wrong" is not enough.
//!
//! Every task in mstx fails the same way: immediately, loudly, and without retrying.
//! `TaskError` is what the library hands back so a caller can tell "your input was
//! shaped like a potato" apart from "Meilisearch said 401". The CLI and `run()` wrap it
//! in `anyhow` context chains on the way out. 🦆

use std::io;

use thiserror::Error;

/// 🏷️ The coarse category of a failure, the thing a workflow engine reports next to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInputShape,
    UnresolvedReference,
    RemoteIndexError,
    NotFound,
    Storage,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidInputShape => "InvalidInputShape",
            ErrorKind::UnresolvedReference => "UnresolvedReference",
            ErrorKind::RemoteIndexError => "RemoteIndexError",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Storage => "Storage",
        };
        f.write_str(name)
    }
}

/// 💀 Everything a task can trip over.
///
/// None of these are retried. Not here, not anywhere in this crate.
#[derive(Debug, Error)]
pub enum TaskError {
    /// 📐 The data source was not an object, a list of objects, or a resolvable reference.
    #[error("invalid input shape: {0}")]
    InvalidInputShape(String),

    /// 🔗 A blob reference or local file could not be opened.
    #[error("unresolved reference '{reference}'")]
    UnresolvedReference {
        reference: String,
        #[source]
        source: io::Error,
    },

    /// 📡 Meilisearch (or its stand-in) rejected the call, or the call never arrived.
    /// `status` is `None` for transport failures.
    #[error("remote index error{}: [{code}] {message}", fmt_status(.status))]
    RemoteIndex {
        status: Option<u16>,
        code: String,
        message: String,
    },

    /// 🔍 The document with that id does not exist.
    #[error("document '{id}' not found in index '{index}'")]
    NotFound { index: String, id: String },

    /// 🗄️ Writing to or reading from the blob store failed after the reference resolved.
    #[error("storage error: {context}")]
    Storage {
        context: String,
        #[source]
        source: io::Error,
    },

    /// 🛑 Ingest stopped early. `forwarded` rows made it before the failure.
    #[error("ingest aborted after {forwarded} rows were forwarded")]
    IngestAborted {
        forwarded: u64,
        #[source]
        source: Box<TaskError>,
    },
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl TaskError {
    /// 🏷️ Which bucket this failure belongs in. `IngestAborted` reports its cause's bucket.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::InvalidInputShape(_) => ErrorKind::InvalidInputShape,
            TaskError::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
            TaskError::RemoteIndex { .. } => ErrorKind::RemoteIndexError,
            TaskError::NotFound { .. } => ErrorKind::NotFound,
            TaskError::Storage { .. } => ErrorKind::Storage,
            TaskError::IngestAborted { source, .. } => source.kind(),
        }
    }

    pub fn invalid_shape(msg: impl Into<String>) -> Self {
        Self::InvalidInputShape(msg.into())
    }

    pub fn unresolved(reference: impl Into<String>, source: io::Error) -> Self {
        Self::UnresolvedReference {
            reference: reference.into(),
            source,
        }
    }

    pub fn remote(status: Option<u16>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteIndex {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn storage(context: impl Into<String>, source: io::Error) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T, E = TaskError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_aborted_ingest_reports_the_kind_of_what_actually_broke() {
        let the_wreckage = TaskError::IngestAborted {
            forwarded: 4,
            source: Box::new(TaskError::remote(Some(400), "missing_document_id", "no id")),
        };
        assert_eq!(the_wreckage.kind(), ErrorKind::RemoteIndexError);
        assert_eq!(
            the_wreckage.to_string(),
            "ingest aborted after 4 rows were forwarded"
        );
    }

    #[test]
    fn the_one_where_transport_errors_have_no_status_in_the_message() {
        let no_status = TaskError::remote(None, "transport", "connection refused");
        assert_eq!(
            no_status.to_string(),
            "remote index error: [transport] connection refused"
        );

        let with_status = TaskError::remote(Some(401), "invalid_api_key", "nope");
        assert_eq!(
            with_status.to_string(),
            "remote index error (HTTP 401): [invalid_api_key] nope"
        );
    }

    #[test]
    fn the_one_where_every_kind_prints_its_own_name() {
        assert_eq!(ErrorKind::NotFound.to_string(), "NotFound");
        assert_eq!(
            TaskError::invalid_shape("potato").kind().to_string(),
            "InvalidInputShape"
        );
    }
}
