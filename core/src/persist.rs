use crate::table::ProjectionTable;
use crate::GalenError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const MANIFEST_VERSION: u32 = 1;

/// Identity of the corpus prefix an artifact was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub num_docs: u32,
    pub fingerprint: String,
    pub created_at: String,
    pub version: u32,
}

impl Manifest {
    pub fn new(num_docs: usize, fingerprint: String) -> Self {
        let created_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        Self { num_docs: num_docs as u32, fingerprint, created_at, version: MANIFEST_VERSION }
    }

    /// Fails unless both artifacts describe the same documents.
    pub fn check_aligned(&self, other: &Manifest) -> Result<()> {
        if self.num_docs != other.num_docs {
            return Err(GalenError::Misaligned(format!(
                "table has {} documents, index has {}",
                self.num_docs, other.num_docs
            ))
            .into());
        }
        if self.fingerprint != other.fingerprint {
            return Err(GalenError::Misaligned("table and index were built from different corpora".into()).into());
        }
        Ok(())
    }
}

/// Well-known artifact locations inside a paper directory.
#[derive(Debug, Clone)]
pub struct PaperPaths {
    pub root: PathBuf,
}

impl PaperPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn metadata_csv(&self) -> PathBuf { self.root.join("metadata.csv") }
    pub fn table(&self) -> PathBuf { self.root.join("metadata.table.bin") }
    pub fn table_manifest(&self) -> PathBuf { self.root.join("metadata.table.json") }
    pub fn index_dir(&self) -> PathBuf { self.root.join("index") }
    pub fn index_manifest(&self) -> PathBuf { self.root.join("index.manifest.json") }
}

pub fn save_table(paths: &PaperPaths, table: &ProjectionTable, manifest: &Manifest) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.table())?;
    let bytes = bincode::serialize(table)?;
    f.write_all(&bytes)?;
    save_manifest(&paths.table_manifest(), manifest)
}

pub fn load_table(paths: &PaperPaths) -> Result<(ProjectionTable, Manifest)> {
    let path = paths.table();
    let mut f = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let table: ProjectionTable = bincode::deserialize(&buf)?;
    table.validate()?;
    let manifest = load_manifest(&paths.table_manifest())?;
    Ok((table, manifest))
}

pub fn save_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    let mut f = File::create(path)?;
    let json = serde_json::to_string_pretty(manifest)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let mut f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let manifest: Manifest = serde_json::from_str(&buf)?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableRow;

    #[test]
    fn table_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PaperPaths::new(dir.path());
        let rows = vec![
            TableRow { doc_id: 0, paper_id: "a".into(), title: "A".into(), x: 0.5, y: -1.0 },
            TableRow { doc_id: 1, paper_id: "b".into(), title: "B".into(), x: 2.0, y: 3.0 },
        ];
        let mut table = ProjectionTable::new(rows).unwrap();
        table.add_column("citations", vec![3.0, 7.0]).unwrap();
        let manifest = Manifest::new(2, "abc".into());
        save_table(&paths, &table, &manifest).unwrap();

        let (loaded, loaded_manifest) = load_table(&paths).unwrap();
        assert_eq!(loaded.rows(), table.rows());
        assert_eq!(loaded.column("citations").unwrap(), &[3.0, 7.0]);
        assert_eq!(loaded_manifest, manifest);
    }

    #[test]
    fn manifests_detect_misalignment() {
        let a = Manifest::new(3, "one".into());
        assert!(a.check_aligned(&Manifest::new(3, "one".into())).is_ok());
        assert!(a.check_aligned(&Manifest::new(4, "one".into())).is_err());
        assert!(a.check_aligned(&Manifest::new(3, "two".into())).is_err());
    }
}
