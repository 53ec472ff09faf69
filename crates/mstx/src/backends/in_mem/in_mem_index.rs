use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::trace;

use super::filter;
use crate::backends::remote_index::{FacetSearchRequest, FacetSearchResult, RemoteIndex, TaskHandle};
use crate::codec::value_kind;
use crate::common::Row;
use crate::error::{Result, TaskError};

/// 📄 The real server's default page size for search.
const DEFAULT_SEARCH_LIMIT: usize = 20;

#[derive(Debug, Default)]
struct IndexState {
    primary_key: Option<String>,
    // 📚 insertion order, one entry per primary key
    documents: Vec<(String, Row)>,
}

/// 🧠 A Meilisearch stand-in that lives on the heap.
///
/// Behaves like the server where tasks can tell the difference: indexes spring into
/// existence on first add, adds are upserts on the primary key (`id`, or else the first
/// field whose name ends in `id`), unknown indexes are a 404, unknown documents are
/// `document_not_found`. Unlike the server, an add is visible the moment it returns.
///
/// Clones share state, so keep one for assertions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndex {
    indexes: Arc<Mutex<BTreeMap<String, IndexState>>>,
    task_uids: Arc<AtomicU64>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🏗️ Make an empty index exist, the way creating one through the API would.
    pub async fn create_index(&self, index: &str) {
        self.indexes.lock().await.entry(index.to_string()).or_default();
    }

    /// 🔍 Every document in `index`, in the order it first arrived.
    pub async fn documents(&self, index: &str) -> Vec<Row> {
        self.indexes
            .lock()
            .await
            .get(index)
            .map(|state| state.documents.iter().map(|(_, row)| row.clone()).collect())
            .unwrap_or_default()
    }

    /// 🎫 How many additions were accepted so far, across all indexes.
    pub fn tasks_enqueued(&self) -> u64 {
        self.task_uids.load(Ordering::SeqCst)
    }
}

fn index_not_found(index: &str) -> TaskError {
    TaskError::remote(Some(404), "index_not_found", format!("Index `{index}` not found."))
}

/// 🔑 `id` wins, then the first field ending in `id`, same inference rule as the server.
fn infer_primary_key(row: &Row) -> Option<String> {
    if row.contains_key("id") {
        return Some("id".to_string());
    }
    row.keys().find(|key| key.to_lowercase().ends_with("id")).cloned()
}

fn document_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_u64() || n.is_i64() => Some(n.to_string()),
        _ => None,
    }
}

/// 🔎 Every term must show up somewhere in the document, ignoring case.
fn matches_query(row: &Row, terms: &[String]) -> bool {
    let mut haystack = String::new();
    for value in row.values() {
        flatten_text(value, &mut haystack);
    }
    terms.iter().all(|term| haystack.contains(term.as_str()))
}

fn flatten_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(&s.to_lowercase());
            out.push(' ');
        }
        Value::Number(n) => {
            out.push_str(&n.to_string());
            out.push(' ');
        }
        Value::Array(items) => items.iter().for_each(|item| flatten_text(item, out)),
        Value::Object(map) => map.values().for_each(|item| flatten_text(item, out)),
        Value::Bool(_) | Value::Null => {}
    }
}

fn facet_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[async_trait]
impl RemoteIndex for InMemoryIndex {
    async fn add_row(&self, index: &str, encoded_row: &str) -> Result<TaskHandle> {
        let row = match serde_json::from_str::<Value>(encoded_row) {
            Ok(Value::Object(row)) => row,
            Ok(other) => {
                return Err(TaskError::remote(
                    Some(400),
                    "malformed_payload",
                    format!("expected a JSON object, found {}", value_kind(&other)),
                ));
            }
            Err(e) => return Err(TaskError::remote(Some(400), "malformed_payload", e.to_string())),
        };

        let mut indexes = self.indexes.lock().await;
        let state = indexes.entry(index.to_string()).or_default();

        let primary_key = match state.primary_key.clone().or_else(|| infer_primary_key(&row)) {
            Some(key) => key,
            None => {
                return Err(TaskError::remote(
                    Some(400),
                    "index_primary_key_no_candidate_found",
                    "The primary key inference failed as the engine did not find any field ending with `id` in its name.",
                ));
            }
        };
        let id = match row.get(&primary_key) {
            None => {
                return Err(TaskError::remote(
                    Some(400),
                    "missing_document_id",
                    format!("Document doesn't have a `{primary_key}` attribute: `{encoded_row}`."),
                ));
            }
            Some(value) => document_id(value).ok_or_else(|| {
                TaskError::remote(
                    Some(400),
                    "invalid_document_id",
                    format!("Document identifier `{value}` is invalid."),
                )
            })?,
        };
        state.primary_key.get_or_insert(primary_key);

        // 🔁 upsert: replace in place so the original position survives
        match state.documents.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = row,
            None => state.documents.push((id.clone(), row)),
        }

        let task_uid = self.task_uids.fetch_add(1, Ordering::SeqCst);
        trace!("🧠 {}#{} stored as task {}", index, id, task_uid);
        Ok(TaskHandle {
            task_uid,
            index_uid: Some(index.to_string()),
            status: Some("enqueued".to_string()),
            kind: Some("documentAdditionOrUpdate".to_string()),
            enqueued_at: None,
        })
    }

    async fn get_by_id(&self, index: &str, id: &str) -> Result<Row> {
        let indexes = self.indexes.lock().await;
        let state = indexes.get(index).ok_or_else(|| index_not_found(index))?;
        state
            .documents
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, row)| row.clone())
            .ok_or_else(|| TaskError::NotFound {
                index: index.to_string(),
                id: id.to_string(),
            })
    }

    async fn search(&self, index: &str, query: &str) -> Result<Vec<Row>> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        let indexes = self.indexes.lock().await;
        let state = indexes.get(index).ok_or_else(|| index_not_found(index))?;
        Ok(state
            .documents
            .iter()
            .map(|(_, row)| row)
            .filter(|row| matches_query(row, &terms))
            .take(DEFAULT_SEARCH_LIMIT)
            .cloned()
            .collect())
    }

    async fn facet_search(&self, index: &str, request: &FacetSearchRequest) -> Result<FacetSearchResult> {
        let filter = filter::parse_all(&request.filters)?;
        let needle = request.facet_query.as_deref().map(str::to_lowercase);

        let indexes = self.indexes.lock().await;
        let state = indexes.get(index).ok_or_else(|| index_not_found(index))?;

        // 📊 value -> count, remembering first-seen order to break ties stably
        let mut counts: Vec<(String, u64)> = Vec::new();
        for (_, row) in &state.documents {
            if filter.as_ref().is_some_and(|f| !f.matches(row)) {
                continue;
            }
            let Some(field) = filter::lookup(row, &request.facet_name) else {
                continue;
            };
            for value in filter::leaves(field).into_iter().filter_map(facet_value) {
                if needle.as_ref().is_some_and(|n| !value.to_lowercase().contains(n.as_str())) {
                    continue;
                }
                match counts.iter_mut().find(|(seen, _)| *seen == value) {
                    Some(entry) => entry.1 += 1,
                    None => counts.push((value, 1)),
                }
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));

        let facet_hits = counts
            .into_iter()
            .map(|(value, count)| {
                let mut hit = Row::new();
                hit.insert("value".into(), Value::String(value));
                hit.insert("count".into(), Value::from(count));
                hit
            })
            .collect();
        Ok(FacetSearchResult::from_hits(facet_hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    async fn seeded(index: &InMemoryIndex, rows: &[Value]) -> Result<()> {
        for row in rows {
            index.add_row("movies", &row.to_string()).await?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_adding_twice_is_an_upsert_not_a_duplicate() -> Result<()> {
        let index = InMemoryIndex::new();
        seeded(
            &index,
            &[
                json!({"id": "13", "title": "Notebook"}),
                json!({"id": "14", "title": "Dune"}),
                json!({"id": "13", "title": "The Notebook"}),
            ],
        )
        .await?;

        let documents = index.documents("movies").await;
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].get("title"), Some(&json!("The Notebook")));
        assert_eq!(index.tasks_enqueued(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_numeric_and_string_ids_meet_in_the_middle() -> Result<()> {
        let index = InMemoryIndex::new();
        seeded(&index, &[json!({"id": 7, "name": "Seven"})]).await?;
        let row = index.get_by_id("movies", "7").await?;
        assert_eq!(row.get("name"), Some(&json!("Seven")));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_primary_key_is_inferred_from_an_id_suffix() -> Result<()> {
        let index = InMemoryIndex::new();
        seeded(&index, &[json!({"title": "Dune", "movie_id": "m1"})]).await?;
        assert!(index.get_by_id("movies", "m1").await.is_ok());

        let err = index.add_row("movies", r#"{"title": "No key"}"#).await.unwrap_err();
        assert!(err.to_string().contains("missing_document_id"), "{err}");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_garbage_and_keyless_rows_are_bad_requests() {
        let index = InMemoryIndex::new();
        for (payload, code) in [
            ("[1,2]", "malformed_payload"),
            ("{nope", "malformed_payload"),
            (r#"{"title": "x"}"#, "index_primary_key_no_candidate_found"),
            (r#"{"id": 1.5}"#, "invalid_document_id"),
        ] {
            match index.add_row("movies", payload).await.unwrap_err() {
                TaskError::RemoteIndex { status, code: got, .. } => {
                    assert_eq!(status, Some(400), "{payload}");
                    assert_eq!(got, code, "{payload}");
                }
                other => panic!("💀 {payload}: expected RemoteIndex, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn the_one_where_missing_things_fail_differently() -> Result<()> {
        let index = InMemoryIndex::new();
        let err = index.get_by_id("ghosts", "1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteIndexError);
        assert_eq!(index.search("ghosts", "x").await.unwrap_err().kind(), ErrorKind::RemoteIndexError);

        index.create_index("movies").await;
        let err = index.get_by_id("movies", "1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(index.search("movies", "").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_search_needs_every_term_and_ignores_case() -> Result<()> {
        let index = InMemoryIndex::new();
        seeded(
            &index,
            &[
                json!({"id": 1, "name": "John Doe"}),
                json!({"id": 2, "name": "Johnny"}),
                json!({"id": 3, "name": "Jane", "tags": ["john-adjacent"]}),
                json!({"id": 4, "name": "Mary"}),
            ],
        )
        .await?;

        assert_eq!(index.search("movies", "john").await?.len(), 3);
        assert_eq!(index.search("movies", "JOHN doe").await?.len(), 1);
        assert_eq!(index.search("movies", "").await?.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_search_stops_at_the_default_page() -> Result<()> {
        let index = InMemoryIndex::new();
        for i in 0..25 {
            index.add_row("movies", &json!({"id": i, "title": "same"}).to_string()).await?;
        }
        assert_eq!(index.search("movies", "same").await?.len(), DEFAULT_SEARCH_LIMIT);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_facets_are_counted_after_filtering() -> Result<()> {
        let index = InMemoryIndex::new();
        seeded(
            &index,
            &[
                json!({"id": 1, "genre": "Fiction", "rating": 4}),
                json!({"id": 2, "genre": "Fiction", "rating": 5}),
                json!({"id": 3, "genre": "Fiction", "rating": 2}),
                json!({"id": 4, "genre": "Fantasy", "rating": 5}),
                json!({"id": 5, "genre": "Romance", "rating": 5}),
            ],
        )
        .await?;

        let result = index
            .facet_search(
                "movies",
                &FacetSearchRequest {
                    facet_name: "genre".into(),
                    facet_query: Some("f".into()),
                    filters: vec!["rating > 3".into()],
                },
            )
            .await?;
        assert_eq!(result.total_hits, 2);
        assert_eq!(
            result.facet_hits,
            vec![
                json!({"value": "Fiction", "count": 2}).as_object().cloned().expect("obj"),
                json!({"value": "Fantasy", "count": 1}).as_object().cloned().expect("obj"),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_bad_filter_is_the_servers_400() -> Result<()> {
        let index = InMemoryIndex::new();
        index.create_index("movies").await;
        let err = index
            .facet_search(
                "movies",
                &FacetSearchRequest {
                    facet_name: "genre".into(),
                    facet_query: None,
                    filters: vec!["rating >".into()],
                },
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid_search_filter"), "{err}");
        Ok(())
    }
}
