//! TF-IDF weighting of tokenized documents into sparse, L2-normalized rows.

use crate::tokenizer::terms;
use crate::{GalenError, SparseVec, TermId};
use anyhow::Result;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct TfidfConfig {
    /// Terms present in fewer documents than this are dropped.
    pub min_df: usize,
    /// Use `ln((1 + n) / (1 + df)) + 1` instead of `ln(n / df) + 1`.
    pub smooth_idf: bool,
    /// Use `1 + ln(tf)` instead of raw counts.
    pub sublinear_tf: bool,
}

impl Default for TfidfConfig {
    fn default() -> Self {
        Self { min_df: 20, smooth_idf: true, sublinear_tf: false }
    }
}

#[derive(Debug, Clone)]
pub struct TfidfMatrix {
    /// Retained terms, with ids assigned in lexicographic order.
    pub vocabulary: HashMap<String, TermId>,
    pub idf: Vec<f32>,
    /// One row per input document, in input order.
    pub rows: Vec<SparseVec>,
}

impl TfidfMatrix {
    pub fn num_docs(&self) -> usize {
        self.rows.len()
    }

    pub fn num_terms(&self) -> usize {
        self.vocabulary.len()
    }
}

/// Vectorize `texts`, one row per text.
pub fn fit_transform<I, S>(texts: I, config: &TfidfConfig) -> Result<TfidfMatrix>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    try_fit_transform(texts.into_iter().map(Ok), config)
}

/// Like [`fit_transform`], for texts that are loaded lazily and may fail.
/// The first error aborts vectorization.
pub fn try_fit_transform<I, S>(texts: I, config: &TfidfConfig) -> Result<TfidfMatrix>
where
    I: IntoIterator<Item = Result<S>>,
    S: AsRef<str>,
{
    let mut next_term_id: TermId = 0;
    let mut dictionary: HashMap<String, TermId> = HashMap::new();
    let mut df: Vec<u32> = Vec::new();
    let mut counts: Vec<Vec<(TermId, u32)>> = Vec::new();

    for text in texts {
        let text = text?;
        let mut tf_counts: HashMap<TermId, u32> = HashMap::new();
        for term in terms(text.as_ref()) {
            let tid = *dictionary.entry(term).or_insert_with(|| {
                let id = next_term_id;
                next_term_id += 1;
                id
            });
            *tf_counts.entry(tid).or_insert(0) += 1;
        }
        df.resize(next_term_id as usize, 0);
        for tid in tf_counts.keys() {
            df[*tid as usize] += 1;
        }
        counts.push(tf_counts.into_iter().collect());
    }

    let num_docs = counts.len();
    let min_df = config.min_df.max(1) as u32;

    // Prune rare terms and renumber the survivors in sorted order.
    let mut kept: Vec<(String, TermId)> = dictionary
        .into_iter()
        .filter(|(_, tid)| df[*tid as usize] >= min_df)
        .collect();
    if kept.is_empty() {
        return Err(GalenError::EmptyVocabulary { min_df: config.min_df, num_docs }.into());
    }
    kept.sort_by(|a, b| a.0.cmp(&b.0));

    let mut remap: HashMap<TermId, TermId> = HashMap::with_capacity(kept.len());
    let mut vocabulary: HashMap<String, TermId> = HashMap::with_capacity(kept.len());
    let mut idf: Vec<f32> = Vec::with_capacity(kept.len());
    let n = num_docs as f32;
    for (new_id, (term, old_id)) in kept.into_iter().enumerate() {
        let df_t = df[old_id as usize] as f32;
        let w = if config.smooth_idf { ((1.0 + n) / (1.0 + df_t)).ln() + 1.0 } else { (n / df_t).ln() + 1.0 };
        remap.insert(old_id, new_id as TermId);
        vocabulary.insert(term, new_id as TermId);
        idf.push(w);
    }

    let mut rows: Vec<SparseVec> = Vec::with_capacity(num_docs);
    for doc in counts {
        let mut row: SparseVec = doc
            .into_iter()
            .filter_map(|(old, tf_raw)| {
                let tid = *remap.get(&old)?;
                let tf = if config.sublinear_tf { 1.0 + (tf_raw as f32).ln() } else { tf_raw as f32 };
                Some((tid, tf * idf[tid as usize]))
            })
            .collect();
        let mut norm = row.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm == 0.0 {
            norm = 1.0;
        }
        for (_, w) in row.iter_mut() {
            *w /= norm;
        }
        row.sort_by_key(|(tid, _)| *tid);
        rows.push(row);
    }

    tracing::info!(num_docs, num_terms = vocabulary.len(), min_df = config.min_df, "vectorized documents");
    Ok(TfidfMatrix { vocabulary, idf, rows })
}

/// Euclidean distance between two sorted sparse rows.
pub fn sparse_distance(a: &[(TermId, f32)], b: &[(TermId, f32)]) -> f32 {
    let (mut i, mut j) = (0, 0);
    let mut sum = 0.0f32;
    while i < a.len() && j < b.len() {
        let (ta, wa) = a[i];
        let (tb, wb) = b[j];
        if ta == tb {
            sum += (wa - wb) * (wa - wb);
            i += 1;
            j += 1;
        } else if ta < tb {
            sum += wa * wa;
            i += 1;
        } else {
            sum += wb * wb;
            j += 1;
        }
    }
    sum += a[i..].iter().map(|(_, w)| w * w).sum::<f32>();
    sum += b[j..].iter().map(|(_, w)| w * w).sum::<f32>();
    sum.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min_df: usize) -> TfidfConfig {
        TfidfConfig { min_df, ..TfidfConfig::default() }
    }

    #[test]
    fn rows_follow_input_order_and_are_normalized() {
        let m = fit_transform(["apple pie", "banana split", "apple banana"], &config(1)).unwrap();
        assert_eq!(m.num_docs(), 3);
        for row in &m.rows {
            let norm: f32 = row.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
        let first: Vec<TermId> = m.rows[0].iter().map(|(t, _)| *t).collect();
        assert_eq!(first, vec![m.vocabulary["appl"], m.vocabulary["pie"]]);
    }

    #[test]
    fn rare_terms_are_pruned() {
        let m = fit_transform(["virus spike", "virus host", "virus cell"], &config(2)).unwrap();
        assert_eq!(m.num_terms(), 1);
        assert!(m.vocabulary.contains_key("virus"));
        assert!(m.rows.iter().all(|r| r.len() == 1));
    }

    #[test]
    fn empty_vocabulary_is_an_error() {
        let err = fit_transform(["alpha", "beta"], &config(20)).unwrap_err();
        assert!(matches!(err.downcast_ref::<GalenError>(), Some(GalenError::EmptyVocabulary { .. })));
    }

    #[test]
    fn documents_without_terms_get_empty_rows() {
        let m = fit_transform(["virus host", "", "virus"], &config(1)).unwrap();
        assert!(m.rows[1].is_empty());
    }

    #[test]
    fn smoothed_idf_matches_formula() {
        let m = fit_transform(["virus host", "virus"], &config(1)).unwrap();
        let host = m.vocabulary["host"] as usize;
        let expected = (3.0f32 / 2.0).ln() + 1.0;
        assert!((m.idf[host] - expected).abs() < 1e-6);
    }

    #[test]
    fn unsmoothed_idf_and_sublinear_tf() {
        let cfg = TfidfConfig { min_df: 1, smooth_idf: false, sublinear_tf: true };
        let m = fit_transform(["virus virus virus host", "virus"], &cfg).unwrap();
        let (virus, host) = (m.vocabulary["virus"], m.vocabulary["host"]);
        assert!((m.idf[virus as usize] - 1.0).abs() < 1e-6);
        assert!((m.idf[host as usize] - (2f32.ln() + 1.0)).abs() < 1e-6);

        let tf = 1.0 + 3f32.ln();
        let (v, h) = (tf * m.idf[virus as usize], m.idf[host as usize]);
        let norm = (v * v + h * h).sqrt();
        let row: HashMap<TermId, f32> = m.rows[0].iter().copied().collect();
        assert!((row[&virus] - v / norm).abs() < 1e-5);
        assert!((row[&host] - h / norm).abs() < 1e-5);
    }

    #[test]
    fn sparse_distance_handles_disjoint_and_shared_terms() {
        let a = vec![(0, 1.0), (2, 0.0)];
        let b = vec![(1, 1.0)];
        assert!((sparse_distance(&a, &b) - 2f32.sqrt()).abs() < 1e-6);
        assert_eq!(sparse_distance(&a, &a), 0.0);
        assert!((sparse_distance(&[], &b) - 1.0).abs() < 1e-6);
    }
}
