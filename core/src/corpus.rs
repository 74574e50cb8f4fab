//! Enumeration and loading of downloaded CORD-19 documents.
//!
//! A paper directory holds one subdirectory per downloaded subset, each
//! containing one JSON file per paper. Documents are enumerated in sorted path
//! order so the positional [`DocId`] of a paper is stable across the
//! embedding and indexing stages.

use crate::{DocId, GalenError};
use anyhow::{Context, Result};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocId,
    pub paper_id: String,
    pub title: String,
    /// Body paragraphs joined by blank lines.
    pub text: String,
}

impl Document {
    /// Title-prefixed text fed to the vectorizer.
    pub fn titled_text(&self) -> String {
        format!("{}\n\n{}", self.title, self.text)
    }
}

#[derive(Debug, Deserialize)]
struct RawPaper {
    #[serde(default)]
    paper_id: String,
    #[serde(default)]
    metadata: RawMetadata,
    #[serde(default)]
    body_text: Vec<RawParagraph>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct RawParagraph {
    #[serde(default)]
    text: String,
}

/// The set of document files found under a paper directory.
pub struct Paperset {
    root: PathBuf,
    files: Vec<PathBuf>,
}

impl Paperset {
    /// Enumerate `*.json` files inside the subdirectories of `root`.
    ///
    /// Files directly in `root` (derived artifacts) and the `index`
    /// directory are never part of the corpus.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut files = Vec::new();
        let walker = WalkDir::new(&root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !(e.depth() == 1 && e.file_type().is_dir() && e.file_name() == "index"));
        for entry in walker {
            let entry = entry.with_context(|| format!("walking {}", root.display()))?;
            if entry.depth() < 2 || !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|s| s.to_str()) == Some("json") {
                files.push(entry.into_path());
            }
        }
        tracing::debug!(root = %root.display(), documents = files.len(), "enumerated corpus");
        Ok(Self { root, files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of documents a run with the given cap processes.
    pub fn capped_len(&self, limit: Option<usize>) -> usize {
        limit.map_or(self.len(), |n| n.min(self.len()))
    }

    /// Load one document by its positional id.
    pub fn get(&self, id: DocId) -> Result<Document> {
        let path = self
            .files
            .get(id as usize)
            .ok_or(GalenError::NoSuchDocument(id))?;
        let f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let raw: RawPaper = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parsing {}", path.display()))?;
        let text = raw
            .body_text
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(Document { id, paper_id: raw.paper_id, title: raw.metadata.title, text })
    }

    /// Documents in enumeration order, stopping after `limit` when given.
    pub fn iter(&self, limit: Option<usize>) -> impl Iterator<Item = Result<Document>> + '_ {
        (0..self.capped_len(limit)).map(move |i| self.get(i as DocId))
    }

    /// SHA-1 over the relative paths of the first `limit` documents.
    ///
    /// Two artifacts built from the same enumerated prefix carry the same
    /// fingerprint.
    pub fn fingerprint(&self, limit: Option<usize>) -> String {
        let mut hasher = Sha1::new();
        for path in &self.files[..self.capped_len(limit)] {
            let rel = path.strip_prefix(&self.root).unwrap_or(path);
            hasher.update(rel.to_string_lossy().as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_paper(dir: &Path, name: &str, title: &str, paragraphs: &[&str]) {
        let body: Vec<_> = paragraphs.iter().map(|t| serde_json::json!({ "text": t, "section": "" })).collect();
        let json = serde_json::json!({
            "paper_id": name,
            "metadata": { "title": title, "authors": [] },
            "body_text": body,
        });
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(format!("{name}.json")), json.to_string()).unwrap();
    }

    #[test]
    fn enumerates_sorted_and_skips_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("comm_use_subset");
        write_paper(&sub, "bbb", "Second", &["two"]);
        write_paper(&sub, "aaa", "First", &["one", "uno"]);
        write_paper(&tmp.path().join("index"), "zzz", "Not a paper", &[]);
        fs::write(tmp.path().join("metadata.table.json"), "{}").unwrap();

        let papers = Paperset::open(tmp.path()).unwrap();
        assert_eq!(papers.len(), 2);
        let first = papers.get(0).unwrap();
        assert_eq!(first.paper_id, "aaa");
        assert_eq!(first.text, "one\n\nuno");
        assert_eq!(first.titled_text(), "First\n\none\n\nuno");
        assert_eq!(papers.get(1).unwrap().title, "Second");
        assert!(papers.get(2).is_err());
    }

    #[test]
    fn missing_body_yields_empty_text() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("custom_license");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("p.json"), r#"{"paper_id":"p","metadata":{"title":"Only a title"}}"#).unwrap();
        let papers = Paperset::open(tmp.path()).unwrap();
        let doc = papers.get(0).unwrap();
        assert_eq!(doc.title, "Only a title");
        assert!(doc.text.is_empty());
    }

    #[test]
    fn fingerprint_depends_on_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let sub = tmp.path().join("s");
        write_paper(&sub, "a", "A", &[]);
        write_paper(&sub, "b", "B", &[]);
        let papers = Paperset::open(tmp.path()).unwrap();
        assert_eq!(papers.fingerprint(None), papers.fingerprint(Some(10)));
        assert_ne!(papers.fingerprint(None), papers.fingerprint(Some(1)));
        assert_eq!(papers.iter(Some(1)).count(), 1);
    }
}
