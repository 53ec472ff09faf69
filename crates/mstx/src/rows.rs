//! 🚰 Row sources: inline JSON, a blob reference, or an already-open byte stream,
//! all flattened into one lazy sequence of rows.
//!
//! The writer downstream never learns where a row came from. It pulls from a
//! [`RowStream`] until the stream says stop or says no.
//!
//! Streams are read one line at a time. A ten-gigabyte blob costs one line of memory,
//! not ten gigabytes. The underlying handle belongs to the `RowStream` and is let go
//! the moment the data runs out, the first bad line shows up, or the `RowStream` is
//! dropped, whichever comes first.

use std::path::PathBuf;

use futures::Stream;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, trace};

use crate::backends::{BlobBackend, BlobReference, BlobStore, ByteStream};
use crate::codec::{decode_line, value_kind};
use crate::common::Row;
use crate::error::{Result, TaskError};

/// 🎭 Where the rows live. Exactly one of three places.
pub enum DataSource {
    /// 📦 A JSON object (one row) or an array of objects (many rows).
    Inline(Value),
    /// 🔗 A stored blob, one JSON object per line.
    RemoteUri(BlobReference),
    /// 🚿 An open stream, one JSON object per line.
    RemoteFile(ByteStream),
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Inline(value) => f.debug_tuple("Inline").field(&value_kind(value)).finish(),
            DataSource::RemoteUri(reference) => f.debug_tuple("RemoteUri").field(&reference.to_string()).finish(),
            DataSource::RemoteFile(_) => f.write_str("RemoteFile(..)"),
        }
    }
}

impl DataSource {
    /// 🔍 Turn the source into a row stream. Blob lookups happen here, row decoding later.
    pub async fn resolve(self, blobs: &BlobBackend) -> Result<RowStream> {
        match self {
            DataSource::Inline(Value::Object(row)) => Ok(RowStream::inline(vec![row])),
            DataSource::Inline(Value::Array(items)) => {
                let rows = items
                    .into_iter()
                    .enumerate()
                    .map(|(position, item)| match item {
                        Value::Object(row) => Ok(row),
                        other => Err(TaskError::invalid_shape(format!(
                            "item {position} of the inline list is {}, expected an object",
                            value_kind(&other)
                        ))),
                    })
                    .collect::<Result<Vec<Row>>>()?;
                Ok(RowStream::inline(rows))
            }
            DataSource::Inline(other) => Err(TaskError::invalid_shape(format!(
                "inline data must be an object or a list of objects, found {}",
                value_kind(&other)
            ))),
            DataSource::RemoteUri(reference) => {
                debug!("🔗 resolving {}", reference);
                let stream = blobs.open_for_read(&reference).await?;
                Ok(RowStream::lines(stream))
            }
            DataSource::RemoteFile(stream) => Ok(RowStream::lines(stream)),
        }
    }
}

enum Feed {
    Inline(std::vec::IntoIter<Row>),
    Lines {
        // 🔒 Some while open, None once released
        reader: Option<BufReader<ByteStream>>,
        line_number: u64,
        buffer: String,
    },
}

/// 🚰 A single-use, lazy sequence of rows.
///
/// Pull with [`RowStream::next_row`] or adapt with [`RowStream::into_stream`]. There is
/// no rewinding: to read the same data again, resolve the source again.
pub struct RowStream {
    feed: Feed,
}

impl std::fmt::Debug for RowStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.feed {
            Feed::Inline(rows) => f.debug_struct("RowStream").field("inline_remaining", &rows.len()).finish(),
            Feed::Lines { reader, line_number, .. } => f
                .debug_struct("RowStream")
                .field("open", &reader.is_some())
                .field("line_number", line_number)
                .finish(),
        }
    }
}

impl RowStream {
    fn inline(rows: Vec<Row>) -> Self {
        Self {
            feed: Feed::Inline(rows.into_iter()),
        }
    }

    fn lines(stream: ByteStream) -> Self {
        Self {
            feed: Feed::Lines {
                reader: Some(BufReader::new(stream)),
                line_number: 0,
                buffer: String::new(),
            },
        }
    }

    /// 🔓 Whether a stream handle is still held.
    pub fn is_open(&self) -> bool {
        matches!(&self.feed, Feed::Lines { reader: Some(_), .. })
    }

    /// 📖 The next row, `None` at the end.
    ///
    /// After the end or after the first error, the handle is released and every later
    /// call returns `Ok(None)`.
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        match &mut self.feed {
            Feed::Inline(rows) => Ok(rows.next()),
            Feed::Lines {
                reader,
                line_number,
                buffer,
            } => {
                let Some(open) = reader.as_mut() else {
                    return Ok(None);
                };
                loop {
                    buffer.clear();
                    let bytes = match open.read_line(buffer).await {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            let failed_at = *line_number + 1;
                            *reader = None;
                            return Err(if e.kind() == std::io::ErrorKind::InvalidData {
                                TaskError::invalid_shape(format!("line {failed_at}: not valid UTF-8"))
                            } else {
                                TaskError::storage(format!("reading line {failed_at} of the row stream"), e)
                            });
                        }
                    };
                    if bytes == 0 {
                        trace!("🏁 row stream exhausted after {} lines", line_number);
                        *reader = None;
                        return Ok(None);
                    }
                    *line_number += 1;
                    match decode_line(buffer, *line_number) {
                        Ok(Some(row)) => return Ok(Some(row)),
                        Ok(None) => continue,
                        Err(e) => {
                            *reader = None;
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// 🌊 The same rows as a `futures::Stream`. Ends right after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Row>> + Send {
        futures::stream::unfold(Some(self), |state| async move {
            let mut rows = state?;
            match rows.next_row().await {
                Ok(Some(row)) => Some((Ok(row), Some(rows))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

/// 📝 The config-file spelling of a [`DataSource`]. Set exactly one field.
///
/// ```toml
/// [task.DocumentAdd.data]
/// from_uri = "blob://runs/7/movies.ndjson"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    #[serde(default)]
    pub from_map: Option<Row>,
    #[serde(default)]
    pub from_list: Option<Vec<Value>>,
    #[serde(default)]
    pub from_uri: Option<String>,
    #[serde(default)]
    pub from_file: Option<PathBuf>,
}

impl DataConfig {
    /// 🔧 Check that exactly one field is set and build the matching source.
    ///
    /// `from_file` is opened here, so a missing file fails before any remote call.
    pub async fn into_source(self) -> Result<DataSource> {
        let set = [
            self.from_map.is_some(),
            self.from_list.is_some(),
            self.from_uri.is_some(),
            self.from_file.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if set != 1 {
            return Err(TaskError::invalid_shape(format!(
                "data needs exactly one of from_map, from_list, from_uri, from_file (found {set})"
            )));
        }

        if let Some(row) = self.from_map {
            return Ok(DataSource::Inline(Value::Object(row)));
        }
        if let Some(items) = self.from_list {
            return Ok(DataSource::Inline(Value::Array(items)));
        }
        if let Some(uri) = self.from_uri {
            return Ok(DataSource::RemoteUri(BlobReference::parse(&uri)?));
        }
        match self.from_file {
            Some(path) => {
                let file = tokio::fs::File::open(&path)
                    .await
                    .map_err(|e| TaskError::unresolved(path.display().to_string(), e))?;
                Ok(DataSource::RemoteFile(Box::new(file)))
            }
            None => Err(TaskError::invalid_shape("data has no source")),
        }
    }
}
