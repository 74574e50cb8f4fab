//! Explorer session state.
//!
//! The session owns everything loaded for one paper directory and reacts to
//! two inputs (the search string and the color selector) and one event (a
//! click on the canvas). Every change is published to subscribers as a
//! [`SessionEvent`].

use crate::color::ColorScale;
use anyhow::{Context, Result};
use galen_core::corpus::{Document, Paperset};
use galen_core::nearest::{KdTree, NearestPoint};
use galen_core::persist::{load_manifest, load_table, PaperPaths};
use galen_core::search::{PaperIndex, SearchHit};
use galen_core::table::ProjectionTable;
use galen_core::{DocId, GalenError};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Color selector value that disables column coloring.
pub const BLUE: &str = "Blue";

/// Characters of document text shown in the preview pane.
pub const PREVIEW_CHARS: usize = 1500;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkerStyle {
    pub marker: &'static str,
    pub size: u32,
    pub opacity: f32,
}

pub const MATCHED_STYLE: MarkerStyle = MarkerStyle { marker: "triangle-up", size: 7, opacity: 1.0 };
pub const UNMATCHED_STYLE: MarkerStyle = MarkerStyle { marker: "circle", size: 5, opacity: 0.4 };

/// Partition of the table into matched and unmatched points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub query: String,
    pub coloring: String,
    pub matched: Vec<DocId>,
    pub unmatched: Vec<DocId>,
    /// Color scale position per unmatched point when coloring by a column.
    pub colors: Option<Vec<Option<f32>>>,
    pub color_range: Option<(f32, f32)>,
    pub matched_style: MarkerStyle,
    pub unmatched_style: MarkerStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub x: f32,
    pub y: f32,
    pub doc_id: DocId,
    pub paper_id: String,
    pub title: String,
    pub text: String,
    pub preview: String,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Frame(Arc<Frame>),
    Selection(Arc<Selection>),
}

/// Split the table rows by membership in `matched`.
pub fn render_frame(table: &ProjectionTable, matched: &HashSet<DocId>, query: &str, coloring: &str) -> Result<Frame> {
    let (hit, miss): (Vec<DocId>, Vec<DocId>) =
        table.rows().iter().map(|r| r.doc_id).partition(|id| matched.contains(id));
    let (colors, color_range) = if coloring == BLUE {
        (None, None)
    } else {
        let values = table.column(coloring)?;
        match ColorScale::clipped(values) {
            Some(scale) => {
                let colors = miss.iter().map(|id| scale.normalize(values[*id as usize])).collect();
                (Some(colors), Some((scale.low, scale.high)))
            }
            None => (Some(vec![None; miss.len()]), None),
        }
    };
    Ok(Frame {
        query: query.to_string(),
        coloring: coloring.to_string(),
        matched: hit,
        unmatched: miss,
        colors,
        color_range,
        matched_style: MATCHED_STYLE,
        unmatched_style: UNMATCHED_STYLE,
    })
}

/// First `PREVIEW_CHARS` characters of `text`.
pub fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

/// Attach auxiliary columns from a JSON object of the form
/// `{"column": {"paper_id": value, ...}, ...}`. Papers without a value get NaN.
pub fn attach_scores(table: &mut ProjectionTable, path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let columns: BTreeMap<String, HashMap<String, f32>> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    for (name, by_paper) in columns {
        let values = table
            .rows()
            .iter()
            .map(|r| by_paper.get(&r.paper_id).copied().unwrap_or(f32::NAN))
            .collect();
        tracing::info!(column = %name, known = by_paper.len(), "attached score column");
        table.add_column(name, values)?;
    }
    Ok(())
}

pub struct ExplorerSession {
    table: ProjectionTable,
    index: PaperIndex,
    papers: Arc<Paperset>,
    points: KdTree,
    query: String,
    coloring: String,
    frame: Arc<Frame>,
    selection: Option<Arc<Selection>>,
    events: broadcast::Sender<SessionEvent>,
}

impl ExplorerSession {
    /// Load the artifacts of a prepared paper directory.
    ///
    /// Fails when the table, the index and the documents on disk do not
    /// describe the same corpus.
    pub fn open(dir: &Path) -> Result<Self> {
        let paths = PaperPaths::new(dir);
        let (table, table_manifest) = load_table(&paths)?;
        let index_manifest = load_manifest(&paths.index_manifest())?;
        table_manifest.check_aligned(&index_manifest)?;

        let papers = Paperset::open(dir)?;
        if papers.len() < table.len() || papers.fingerprint(Some(table.len())) != table_manifest.fingerprint {
            return Err(GalenError::Misaligned("documents changed since the table was built".into()).into());
        }
        let index = PaperIndex::open(&paths.index_dir())?;
        Self::from_parts(table, index, papers)
    }

    pub fn from_parts(table: ProjectionTable, index: PaperIndex, papers: Paperset) -> Result<Self> {
        let frame = Arc::new(render_frame(&table, &HashSet::new(), "", BLUE)?);
        let points = KdTree::build(table.points());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        tracing::info!(points = table.len(), indexed = index.num_docs(), "explorer session ready");
        Ok(Self {
            table,
            index,
            papers: Arc::new(papers),
            points,
            query: String::new(),
            coloring: BLUE.to_string(),
            frame,
            selection: None,
            events,
        })
    }

    /// Add the score columns in `path` as color selector options.
    pub fn load_scores(&mut self, path: &Path) -> Result<()> {
        attach_scores(&mut self.table, path)
    }

    pub fn table(&self) -> &ProjectionTable {
        &self.table
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn coloring(&self) -> &str {
        &self.coloring
    }

    pub fn coloring_options(&self) -> Vec<String> {
        std::iter::once(BLUE).chain(self.table.column_names()).map(str::to_string).collect()
    }

    pub fn frame(&self) -> Arc<Frame> {
        self.frame.clone()
    }

    pub fn selection(&self) -> Option<Arc<Selection>> {
        self.selection.clone()
    }

    /// Shared handle on the corpus, for loading documents without holding
    /// the session.
    pub fn papers(&self) -> Arc<Paperset> {
        self.papers.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Change the search string and re-partition the points.
    pub fn set_query(&mut self, query: impl Into<String>) -> Result<Arc<Frame>> {
        let query = query.into();
        if query == self.query {
            return Ok(self.frame());
        }
        self.update(query, self.coloring.clone())
    }

    /// Change the color selector; must be `Blue` or a table column.
    pub fn set_coloring(&mut self, coloring: impl Into<String>) -> Result<Arc<Frame>> {
        let coloring = coloring.into();
        if coloring == self.coloring {
            return Ok(self.frame());
        }
        if coloring != BLUE {
            self.table.column(&coloring)?;
        }
        self.update(self.query.clone(), coloring)
    }

    fn update(&mut self, query: String, coloring: String) -> Result<Arc<Frame>> {
        let matched = self.index.matching_ids(&query)?;
        let frame = Arc::new(render_frame(&self.table, &matched, &query, &coloring)?);
        tracing::debug!(query = %query, coloring = %coloring, matched = frame.matched.len(), "re-rendered");
        self.query = query;
        self.coloring = coloring;
        self.frame = frame.clone();
        // no subscribers is fine
        let _ = self.events.send(SessionEvent::Frame(frame.clone()));
        Ok(frame)
    }

    /// Resolve a click to the nearest document and load it.
    pub fn click(&mut self, x: f32, y: f32) -> Result<Option<Arc<Selection>>> {
        let Some(row) = self.points.nearest([x, y]) else {
            return Ok(None);
        };
        let doc = self.document(row as DocId)?;
        let selection = Arc::new(Selection {
            x,
            y,
            doc_id: doc.id,
            preview: preview(&doc.text),
            paper_id: doc.paper_id,
            title: doc.title,
            text: doc.text,
        });
        tracing::debug!(x, y, doc_id = selection.doc_id, "selected document");
        self.selection = Some(selection.clone());
        let _ = self.events.send(SessionEvent::Selection(selection.clone()));
        Ok(Some(selection))
    }

    pub fn document(&self, doc_id: DocId) -> Result<Document> {
        if self.table.row(doc_id).is_none() {
            return Err(GalenError::NoSuchDocument(doc_id).into());
        }
        self.papers.get(doc_id)
    }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.index.search(query, limit)
    }
}
