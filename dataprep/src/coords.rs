use anyhow::{Context, Result};
use galen_core::corpus::Paperset;
use galen_core::persist::{save_table, Manifest, PaperPaths};
use galen_core::projection::{project, ProjectionConfig};
use galen_core::table::{ProjectionTable, TableRow};
use galen_core::tfidf::{try_fit_transform, TfidfConfig};
use galen_core::{DocId, Point};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct CoordsOptions {
    /// Process only the first `num_docs` documents.
    pub num_docs: Option<usize>,
    /// Persist the projection table and its manifest in the paper directory.
    pub write_table: bool,
    pub tfidf: TfidfConfig,
    pub projection: ProjectionConfig,
}

/// Vectorize every document and project it to 2D.
///
/// Returns one point per processed document, in enumeration order.
pub fn make_coords(paper_dir: &Path, options: &CoordsOptions) -> Result<Vec<Point>> {
    let papers = Paperset::open(paper_dir)?;
    let total = papers.capped_len(options.num_docs);
    tracing::info!(documents = total, dir = %paper_dir.display(), "making coordinates");

    let mut meta: Vec<(String, String)> = Vec::with_capacity(total);
    let texts = papers.iter(options.num_docs).map(|doc| {
        doc.map(|d| {
            let text = d.titled_text();
            meta.push((d.paper_id, d.title));
            text
        })
    });
    let matrix = try_fit_transform(texts, &options.tfidf).context("vectorizing documents")?;
    let points = project(&matrix.rows, &options.projection);

    if options.write_table {
        let rows = meta
            .into_iter()
            .zip(&points)
            .enumerate()
            .map(|(i, ((paper_id, title), p))| TableRow { doc_id: i as DocId, paper_id, title, x: p[0], y: p[1] })
            .collect();
        let table = ProjectionTable::new(rows)?;
        let manifest = Manifest::new(total, papers.fingerprint(options.num_docs));
        let paths = PaperPaths::new(paper_dir);
        save_table(&paths, &table, &manifest)?;
        tracing::info!(rows = table.len(), path = %paths.table().display(), "wrote projection table");
    }
    Ok(points)
}
