use anyhow::Result;
use galen_core::corpus::Paperset;
use galen_core::persist::{save_manifest, Manifest, PaperPaths};
use galen_core::search::IndexBuilder;
use std::path::Path;

/// Build the full-text index under `<paper_dir>/index`.
///
/// Documents are committed in one batch at the end; an interrupted run
/// leaves no usable index. Returns the number of indexed documents.
pub fn make_index(paper_dir: &Path, num_docs: Option<usize>) -> Result<usize> {
    let papers = Paperset::open(paper_dir)?;
    let paths = PaperPaths::new(paper_dir);
    let mut builder = IndexBuilder::create(&paths.index_dir())?;

    for doc in papers.iter(num_docs) {
        let doc = doc?;
        builder.add(doc.id, &doc.paper_id, &doc.title, &doc.text)?;
        let done = builder.added();
        if done % 100 == 0 {
            eprint!(".");
        }
        if done % 1000 == 0 {
            eprintln!();
        }
    }
    eprintln!();
    tracing::info!(documents = builder.added(), "committing index");
    let added = builder.commit()?;

    let manifest = Manifest::new(added, papers.fingerprint(num_docs));
    save_manifest(&paths.index_manifest(), &manifest)?;
    tracing::info!(documents = added, path = %paths.index_dir().display(), "done indexing");
    Ok(added)
}
