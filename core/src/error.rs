use crate::DocId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GalenError {
    #[error("index schema is missing field `{0}`")]
    MissingField(&'static str),

    #[error("no terms remain after pruning (min_df = {min_df}, documents = {num_docs})")]
    EmptyVocabulary { min_df: usize, num_docs: usize },

    #[error("artifacts are out of sync: {0}")]
    Misaligned(String),

    #[error("unknown color column `{0}`")]
    UnknownColumn(String),

    #[error("column `{name}` has {got} values but the table has {expected} rows")]
    ColumnLength { name: String, expected: usize, got: usize },

    #[error("document {0} is out of range")]
    NoSuchDocument(DocId),
}
