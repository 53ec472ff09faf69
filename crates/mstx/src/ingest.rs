//! 📬 The ingest writer: rows in, one `add_row` call per row, a count out.
//!
//! Strictly sequential. Row N+1 is not even pulled from the source until row N has been
//! accepted. There is no batching and no retry. The first failure stops the
//! whole thing and reports how many rows made it before the wall.

use tracing::{info, trace, warn};

use crate::backends::RemoteIndex;
use crate::codec::encode_row;
use crate::common::IndexTarget;
use crate::error::{Result, TaskError};
use crate::progress::ProgressMetrics;
use crate::rows::RowStream;

fn aborted(forwarded: u64, cause: TaskError) -> TaskError {
    TaskError::IngestAborted {
        forwarded,
        source: Box::new(cause),
    }
}

/// 🚀 Forward every row of `rows` to `target`'s index, in order.
///
/// Returns the number of rows the index accepted. On failure, returns
/// `TaskError::IngestAborted` carrying that same number for the rows that got through,
/// whether the failure came from the index or from reading the rows.
pub async fn ingest<I>(mut rows: RowStream, index: &I, target: &IndexTarget, progress: &mut ProgressMetrics) -> Result<u64>
where
    I: RemoteIndex + ?Sized,
{
    let mut forwarded = 0u64;
    info!("📬 ingesting into '{}'", target.index());

    loop {
        let row = match rows.next_row().await {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(e) => {
                warn!("💀 row {} could not be read: {}", forwarded + 1, e);
                progress.abandon();
                return Err(aborted(forwarded, e));
            }
        };

        let encoded = match encode_row(&row) {
            Ok(encoded) => encoded,
            Err(e) => {
                progress.abandon();
                return Err(aborted(forwarded, e));
            }
        };

        match index.add_row(target.index(), &encoded).await {
            Ok(handle) => {
                forwarded += 1;
                trace!("🎫 row {} enqueued as task {}", forwarded, handle.task_uid);
                progress.record_row(encoded.len() as u64);
            }
            Err(e) => {
                warn!("💀 row {} rejected by '{}': {}", forwarded + 1, target.index(), e);
                progress.abandon();
                return Err(aborted(forwarded, e));
            }
        }
    }

    progress.finish();
    info!("✅ {} rows forwarded to '{}'", forwarded, target.index());
    Ok(forwarded)
}
