//! 📦 Common data structures, the building blocks of mstx.
//!
//! 🎬 A row walks into an index. The index asks for its id. The row looks at its
//! fields, finds one ending in `id`, and hands it over. Nobody validates the rest.
//! Meilisearch is the source of truth for what a field means. We just carry them. 🦆

use serde_json::{Map, Value};

/// 🎯 One document, as an ordered mapping of field name to JSON value.
///
/// `serde_json` is built with `preserve_order`, so fields keep the order they were written in
/// all the way to the wire.
pub type Row = Map<String, Value>;

/// 📡 Where a task sends its rows: which index, on which server, with which key.
///
/// Everything is already resolved by the time this is built. Nobody mutates it afterwards.
/// One per task invocation, dropped when the task ends.
#[derive(Clone, PartialEq, Eq)]
pub struct IndexTarget {
    index: String,
    url: String,
    key: String,
}

impl IndexTarget {
    pub fn new(index: impl Into<String>, url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            url: url.into(),
            key: key.into(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

// 🔒 manual Debug so the master key never ends up in a log line at 3am
impl std::fmt::Debug for IndexTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexTarget")
            .field("index", &self.index)
            .field("url", &self.url)
            .field("key", &if self.key.is_empty() { "" } else { "***" })
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_the_master_key_stays_out_of_debug_output() {
        let target = IndexTarget::new("movies", "http://localhost:7700", "MASTER_KEY");
        let printed = format!("{:?}", target);
        assert!(!printed.contains("MASTER_KEY"), "key leaked: {printed}");
        assert!(printed.contains("movies"));
        assert_eq!(target.key(), "MASTER_KEY");
    }

    #[test]
    fn the_one_where_rows_remember_the_order_they_were_born_in() {
        let row: Row = serde_json::from_str(r#"{"zeta":1,"alpha":2,"mid":3}"#).unwrap();
        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }
}
