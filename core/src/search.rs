//! Full-text index over the corpus, backed by tantivy.

use crate::{DocId, GalenError};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::doc;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, FAST, INDEXED, STORED, STRING, TEXT};
use tantivy::{Directory, Index, IndexReader, IndexWriter, ReloadPolicy};

/// Most hits a query contributes to the highlighted set.
pub const MAX_MATCHES: usize = 500;

const WRITER_HEAP_BYTES: usize = 50_000_000;

#[derive(Debug, Clone)]
pub struct PaperFields {
    pub paperid: Field,
    pub paper_sha: Field,
    pub title: Field,
    pub content: Field,
}

impl PaperFields {
    pub fn schema() -> (Schema, Self) {
        let mut builder = Schema::builder();
        let paperid = builder.add_u64_field("paperid", INDEXED | STORED | FAST);
        let paper_sha = builder.add_text_field("paper_sha", STRING | STORED);
        let title = builder.add_text_field("title", TEXT | STORED);
        let content = builder.add_text_field("content", TEXT);
        (builder.build(), Self { paperid, paper_sha, title, content })
    }

    pub fn from_schema(schema: &Schema) -> Result<Self> {
        let field = |name: &'static str| {
            schema
                .fields()
                .find(|(_, entry)| entry.name() == name)
                .map(|(field, _)| field)
                .ok_or(GalenError::MissingField(name))
        };
        Ok(Self {
            paperid: field("paperid")?,
            paper_sha: field("paper_sha")?,
            title: field("title")?,
            content: field("content")?,
        })
    }
}

/// Text indexed as content: the title stands in for an empty body.
pub fn indexed_content<'a>(title: &'a str, text: &'a str) -> &'a str {
    if text.trim().is_empty() {
        title
    } else {
        text
    }
}

/// Writes a fresh index; nothing is visible until [`IndexBuilder::commit`].
pub struct IndexBuilder {
    index: Index,
    writer: IndexWriter,
    fields: PaperFields,
    added: usize,
}

impl IndexBuilder {
    /// Create an empty index at `dir`, replacing any index already there.
    pub fn create(dir: &Path) -> Result<Self> {
        if dir.exists() {
            std::fs::remove_dir_all(dir).with_context(|| format!("removing old index {}", dir.display()))?;
        }
        std::fs::create_dir_all(dir)?;
        let (schema, fields) = PaperFields::schema();
        let index = Index::create_in_dir(dir, schema)?;
        let writer = index.writer(WRITER_HEAP_BYTES)?;
        Ok(Self { index, writer, fields, added: 0 })
    }

    pub fn add(&mut self, doc_id: DocId, paper_sha: &str, title: &str, text: &str) -> Result<()> {
        let f = &self.fields;
        self.writer.add_document(doc!(
            f.paperid => doc_id as u64,
            f.paper_sha => paper_sha,
            f.title => title,
            f.content => indexed_content(title, text)
        ))?;
        self.added += 1;
        Ok(())
    }

    pub fn added(&self) -> usize {
        self.added
    }

    /// Commit every added document and return how many there were.
    pub fn commit(mut self) -> Result<usize> {
        self.writer.commit()?;
        self.writer.wait_merging_threads()?;
        self.index.directory().sync_directory()?;
        Ok(self.added)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub paper_sha: String,
    pub title: String,
    pub score: f32,
}

/// Read-only handle on a built index.
pub struct PaperIndex {
    index: Index,
    reader: IndexReader,
    fields: PaperFields,
}

impl PaperIndex {
    pub fn open(dir: &Path) -> Result<Self> {
        let index = Index::open_in_dir(dir).with_context(|| format!("opening index {}", dir.display()))?;
        let fields = PaperFields::from_schema(&index.schema())?;
        let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
        Ok(Self { index, reader, fields })
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Top `limit` hits for `query` over the content field. Terms are
    /// combined with AND unless the query says otherwise. A blank query has
    /// no hits. Any free text is accepted: clauses the parser cannot make
    /// sense of (unknown fields, unbalanced quotes or parentheses) are
    /// dropped rather than reported.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut parser = QueryParser::for_index(&self.index, vec![self.fields.content]);
        parser.set_conjunction_by_default();
        let (parsed, errors) = parser.parse_query_lenient(query);
        if !errors.is_empty() {
            tracing::debug!(query, ignored = errors.len(), "dropped unparsable query clauses");
        }
        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&parsed, &TopDocs::with_limit(limit.max(1)))?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let stored = searcher.doc(addr)?;
            let doc_id = match stored.get_first(self.fields.paperid) {
                Some(Value::U64(v)) => *v as DocId,
                _ => return Err(GalenError::MissingField("paperid").into()),
            };
            let text = |field: Field| match stored.get_first(field) {
                Some(Value::Str(s)) => s.clone(),
                _ => String::new(),
            };
            hits.push(SearchHit { doc_id, paper_sha: text(self.fields.paper_sha), title: text(self.fields.title), score });
        }
        Ok(hits)
    }

    /// Ids of up to [`MAX_MATCHES`] documents matching `query`.
    pub fn matching_ids(&self, query: &str) -> Result<HashSet<DocId>> {
        Ok(self.search(query, MAX_MATCHES)?.into_iter().map(|h| h.doc_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fruit_index(dir: &Path) -> PaperIndex {
        let mut builder = IndexBuilder::create(dir).unwrap();
        builder.add(0, "a", "A", "apple pie").unwrap();
        builder.add(1, "b", "B", "banana split").unwrap();
        builder.add(2, "c", "Cherry", "").unwrap();
        assert_eq!(builder.commit().unwrap(), 3);
        PaperIndex::open(dir).unwrap()
    }

    #[test]
    fn term_query_finds_only_its_document() {
        let tmp = tempfile::tempdir().unwrap();
        let index = fruit_index(&tmp.path().join("index"));
        assert_eq!(index.num_docs(), 3);
        let ids = index.matching_ids("banana").unwrap();
        assert_eq!(ids, HashSet::from([1]));
        let hits = index.search("banana", 10).unwrap();
        assert_eq!(hits[0].title, "B");
        assert_eq!(hits[0].paper_sha, "b");
    }

    #[test]
    fn empty_text_falls_back_to_title() {
        let tmp = tempfile::tempdir().unwrap();
        let index = fruit_index(&tmp.path().join("index"));
        assert_eq!(index.matching_ids("cherry").unwrap(), HashSet::from([2]));
        assert_eq!(indexed_content("Cherry", "  \n"), "Cherry");
        assert_eq!(indexed_content("Cherry", "pit"), "pit");
    }

    #[test]
    fn blank_query_matches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let index = fruit_index(&tmp.path().join("index"));
        assert!(index.matching_ids("").unwrap().is_empty());
        assert!(index.matching_ids("   ").unwrap().is_empty());
    }

    #[test]
    fn terms_are_conjunctive() {
        let tmp = tempfile::tempdir().unwrap();
        let index = fruit_index(&tmp.path().join("index"));
        assert!(index.matching_ids("apple banana").unwrap().is_empty());
        assert_eq!(index.matching_ids("apple OR banana").unwrap(), HashSet::from([0, 1]));
    }

    #[test]
    fn free_text_never_fails_to_parse() {
        let tmp = tempfile::tempdir().unwrap();
        let index = fruit_index(&tmp.path().join("index"));
        for query in ["ratio 1:2", "\"spike", "sars-cov-2 (", "banana AND", "title:", ")("] {
            assert!(index.matching_ids(query).is_ok(), "query {query:?}");
        }
    }

    #[test]
    fn matches_are_capped() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("index");
        let mut builder = IndexBuilder::create(&dir).unwrap();
        for i in 0..(MAX_MATCHES as u32 + 20) {
            builder.add(i, &format!("p{i}"), "Virus", &format!("virus sample{i}")).unwrap();
        }
        builder.commit().unwrap();
        let index = PaperIndex::open(&dir).unwrap();
        assert_eq!(index.num_docs(), MAX_MATCHES as u64 + 20);
        assert_eq!(index.matching_ids("virus").unwrap().len(), MAX_MATCHES);
        assert_eq!(index.search("virus", 3).unwrap().len(), 3);
        assert_eq!(index.matching_ids("sample7").unwrap(), HashSet::from([7]));
    }

    #[test]
    fn rebuilding_replaces_the_old_index() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("index");
        drop(fruit_index(&dir));
        let mut builder = IndexBuilder::create(&dir).unwrap();
        builder.add(0, "d", "Date", "date palm").unwrap();
        builder.commit().unwrap();
        let index = PaperIndex::open(&dir).unwrap();
        assert_eq!(index.num_docs(), 1);
        assert!(index.matching_ids("banana").unwrap().is_empty());
    }
}
