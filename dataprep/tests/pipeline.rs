use galen_core::persist::{load_manifest, load_table, PaperPaths};
use galen_core::search::PaperIndex;
use galen_core::tfidf::TfidfConfig;
use galen_dataprep::{make_coords, make_index, CoordsOptions};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

fn write_paper(dir: &Path, paper_id: &str, title: &str, text: &str) {
    let body = if text.is_empty() { vec![] } else { vec![serde_json::json!({ "text": text })] };
    let json = serde_json::json!({ "paper_id": paper_id, "metadata": { "title": title }, "body_text": body });
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(format!("{paper_id}.json")), json.to_string()).unwrap();
}

fn fruit_corpus(root: &Path) {
    let sub = root.join("comm_use_subset");
    write_paper(&sub, "a", "A", "apple pie");
    write_paper(&sub, "b", "B", "banana split");
    write_paper(&sub, "c", "Cherry", "");
}

fn options(num_docs: Option<usize>) -> CoordsOptions {
    CoordsOptions { num_docs, write_table: true, tfidf: TfidfConfig { min_df: 1, ..TfidfConfig::default() }, ..CoordsOptions::default() }
}

#[test]
fn coordinates_follow_enumeration_order() {
    let dir = tempfile::tempdir().unwrap();
    fruit_corpus(dir.path());
    let points = make_coords(dir.path(), &options(None)).unwrap();
    assert_eq!(points.len(), 3);

    let (table, manifest) = load_table(&PaperPaths::new(dir.path())).unwrap();
    assert_eq!(manifest.num_docs, 3);
    let titles: Vec<&str> = table.rows().iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["A", "B", "Cherry"]);
    assert_eq!(table.points(), points);
}

#[test]
fn cap_limits_both_stages() {
    let dir = tempfile::tempdir().unwrap();
    fruit_corpus(dir.path());
    let points = make_coords(dir.path(), &options(Some(2))).unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(make_index(dir.path(), Some(2)).unwrap(), 2);

    let paths = PaperPaths::new(dir.path());
    let (_, table_manifest) = load_table(&paths).unwrap();
    let index_manifest = load_manifest(&paths.index_manifest()).unwrap();
    table_manifest.check_aligned(&index_manifest).unwrap();
}

#[test]
fn index_ids_match_table_rows() {
    let dir = tempfile::tempdir().unwrap();
    fruit_corpus(dir.path());
    make_coords(dir.path(), &options(None)).unwrap();
    assert_eq!(make_index(dir.path(), None).unwrap(), 3);

    let paths = PaperPaths::new(dir.path());
    let (table, _) = load_table(&paths).unwrap();
    let index = PaperIndex::open(&paths.index_dir()).unwrap();
    for (term, expected) in [("banana", 1u32), ("cherry", 2)] {
        let hits = index.search(term, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, expected);
        assert_eq!(table.row(expected).unwrap().paper_id, hits[0].paper_sha);
    }
    assert_eq!(index.matching_ids("").unwrap(), HashSet::new());
}

#[test]
fn default_min_df_rejects_tiny_corpora() {
    let dir = tempfile::tempdir().unwrap();
    fruit_corpus(dir.path());
    let opts = CoordsOptions { write_table: true, ..CoordsOptions::default() };
    assert!(make_coords(dir.path(), &opts).is_err());
    assert!(!PaperPaths::new(dir.path()).table().exists());
}
