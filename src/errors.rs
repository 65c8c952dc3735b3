//! The error type shared by every stage of dataset generation.
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort a generation run.
///
/// Per-sentence problems (a sentence no variant accepts, an ambiguous sentence, an unpaired
/// example) never show up here; they are counted in [`crate::RunSummary`] instead.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("unknown template `{0}`")]
    UnknownTemplate(String),

    #[error("template `{template}` tracks {tracked} nouns, only 1 to {max} are supported")]
    TooManyTrackedNouns {
        template: String,
        tracked: usize,
        max: usize,
    },

    #[error("template `{template}` needs the `{category}` vocabulary")]
    MissingCategory { template: String, category: String },

    #[error("vocabulary file {} does not exist", path.display())]
    VocabularyNotFound { path: PathBuf },

    #[error("vocabulary `{category}` has no `{column}` column")]
    MissingColumn { category: String, column: String },

    #[error("vocabulary `{category}` has an empty `{column}` column")]
    EmptyBucket { category: String, column: String },

    #[error("vocabulary `{category}` contains `{value}`, which cannot be used as a terminal")]
    InvalidLiteral { category: String, value: String },

    #[error("vocabulary `{category}` lists `{value}` twice in column `{column}`")]
    DuplicateEntry {
        category: String,
        column: String,
        value: String,
    },

    #[error("vocabulary `{category}` line {line} fills only some of the numbered columns")]
    RaggedRow { category: String, line: usize },

    #[error("vocabulary `{category}` has {singular} singular but {plural} plural forms")]
    UnalignedColumns {
        category: String,
        singular: usize,
        plural: usize,
    },

    #[error("cannot sample 0 rows from vocabulary `{category}`")]
    InvalidSampleSize { category: String },

    #[error("grammar syntax error on line {line}: {message}")]
    GrammarSyntax { line: usize, message: String },

    #[error("non-terminal `{0}` is used but never defined")]
    UndefinedNonterminal(String),

    #[error("feature `{0}` is only ever bound to variables")]
    UnboundFeature(String),

    #[error("enumeration stopped at the cap of {0} sentences before exhausting the grammar")]
    CapReached(usize),

    #[error("condition {condition} has no usable sentence pairs, the dataset cannot be balanced")]
    ImbalancedTemplate { condition: String },

    #[error("sentence `{sentence}` has no `{marker}` marker")]
    MissingMarker { sentence: String, marker: String },

    #[error("the `{marker}` marker opens sentence `{sentence}`, so it marks no word")]
    MarkerWithoutWord { sentence: String, marker: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("generation was cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T, E = GenerationError> = std::result::Result<T, E>;
