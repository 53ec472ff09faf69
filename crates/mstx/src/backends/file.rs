//! # 💾 The local-disk blob store
//!
//! One file per reference under a root directory. `blob://runs/7/hits.ndjson` lives at
//! `<root>/runs/7/hits.ndjson`. Reference names are checked before they reach the
//! filesystem, so nothing outside the root is ever opened.

mod file_blob_store;

pub use file_blob_store::FileBlobStore;
