//! ============================================================================
//! FullTextIndex - Ranked text search over message text (tantivy)
//! ============================================================================
//! BM25 scores on tantivy's absolute scale; the retrieval engine either
//! max-normalizes them (hybrid mode) or applies an absolute floor
//! (fulltext-only fallback). The tenant filter is a zero-boost Must clause
//! so it never contributes to the score.
//! ============================================================================

use std::path::Path;
use std::sync::Mutex;

use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, TantivyDocument, Term};
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Full-text index over message text
pub struct FullTextIndex {
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    id_field: Field,
    user_field: Field,
    text_field: Field,
}

impl FullTextIndex {
    /// Open (or create) the index under `dir`
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| StoreError::new("open fulltext index", e))?;

        let mut schema_builder = Schema::builder();
        let id_field = schema_builder.add_text_field("id", STRING | STORED);
        let user_field = schema_builder.add_text_field("user_id", STRING);
        let text_field = schema_builder.add_text_field("text", TEXT);
        let schema = schema_builder.build();

        let directory = MmapDirectory::open(dir)
            .map_err(|e| StoreError::new("open fulltext index", e))?;
        let index = Index::open_or_create(directory, schema)
            .map_err(|e| StoreError::new("open fulltext index", e))?;

        let writer = index
            .writer(WRITER_HEAP_BYTES)
            .map_err(|e| StoreError::new("open fulltext index", e))?;
        let reader = index
            .reader()
            .map_err(|e| StoreError::new("open fulltext index", e))?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader,
            id_field,
            user_field,
            text_field,
        })
    }

    /// Index one message's text
    pub fn add(&self, id: Uuid, user_id: &str, text: &str) -> Result<(), StoreError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::new("index text", anyhow::anyhow!("writer lock poisoned")))?;

        writer
            .add_document(doc!(
                self.id_field => id.to_string(),
                self.user_field => user_id,
                self.text_field => text,
            ))
            .map_err(|e| StoreError::new("index text", e))?;
        writer
            .commit()
            .map_err(|e| StoreError::new("index text", e))?;

        Ok(())
    }

    /// Ranked search scoped to one user. Query terms are OR-ed; the user
    /// filter carries zero boost so scores are text-only BM25.
    pub fn search(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(Uuid, f32)>, StoreError> {
        let term_queries: Vec<(Occur, Box<dyn Query>)> = query
            .split_whitespace()
            .map(|token| {
                let term = Term::from_field_text(self.text_field, &token.to_lowercase());
                let q: Box<dyn Query> =
                    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                (Occur::Should, q)
            })
            .collect();

        if term_queries.is_empty() {
            return Ok(Vec::new());
        }

        let user_term = Term::from_field_text(self.user_field, user_id);
        let user_query: Box<dyn Query> = Box::new(BoostQuery::new(
            Box::new(TermQuery::new(user_term, IndexRecordOption::Basic)),
            0.0,
        ));
        let text_query: Box<dyn Query> = Box::new(BooleanQuery::new(term_queries));

        let full_query = BooleanQuery::new(vec![
            (Occur::Must, user_query),
            (Occur::Must, text_query),
        ]);

        self.reader
            .reload()
            .map_err(|e| StoreError::new("fulltext search", e))?;
        let searcher = self.reader.searcher();

        let top_docs = searcher
            .search(&full_query, &TopDocs::with_limit(limit.max(1)))
            .map_err(|e| StoreError::new("fulltext search", e))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let stored: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| StoreError::new("fulltext search", e))?;
            let id = stored
                .get_first(self.id_field)
                .and_then(|v| v.as_str())
                .and_then(|s| Uuid::parse_str(s).ok());
            if let Some(id) = id {
                hits.push((id, score));
            }
        }

        debug!(
            "Fulltext search for user {} returned {} hits",
            user_id,
            hits.len()
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_index() -> FullTextIndex {
        let dir = std::env::temp_dir().join(format!("memtree-fts-{}", Uuid::new_v4()));
        FullTextIndex::open(&dir).unwrap()
    }

    #[test]
    fn search_is_tenant_scoped() {
        let index = temp_index();
        let alice_msg = Uuid::new_v4();
        let bob_msg = Uuid::new_v4();

        index
            .add(alice_msg, "alice", "planning a trip to lisbon in spring")
            .unwrap();
        index
            .add(bob_msg, "bob", "lisbon has excellent seafood")
            .unwrap();

        let hits = index.search("alice", "lisbon", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, alice_msg);
        assert!(hits[0].1 > 0.0);
    }

    #[test]
    fn unmatched_query_returns_nothing() {
        let index = temp_index();
        index
            .add(Uuid::new_v4(), "alice", "coffee every morning")
            .unwrap();

        assert!(index.search("alice", "submarine", 10).unwrap().is_empty());
        assert!(index.search("alice", "   ", 10).unwrap().is_empty());
    }
}
