//! Generation of labeled subject-verb number agreement datasets from feature grammars.
//!
//! A [template](templates::Template) describes the constituent order of one syntactic
//! construction. Combined with a [`Vocabulary`] it yields one start rule per agreement condition
//! and correctness. Every sentence of the (feature-erased) reference grammar is enumerated and
//! classified by parsing it under all of those variants, and the result is paired, balanced and
//! written as a tab-separated dataset.
//!
//! ```no_run
//! use agreement_grammar::{CancellationToken, GenerationConfig, Vocabulary, generate_dataset};
//! use rand::SeedableRng;
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let config = GenerationConfig::default();
//! let vocabulary = Vocabulary::load_dir("vocabulary", &config.sample_caps, &mut rng)?;
//! let dataset = generate_dataset(
//!     "nounpp",
//!     &vocabulary,
//!     &config,
//!     &CancellationToken::new(),
//!     &mut rng,
//! )?;
//! dataset.write_tsv("tasks/nounpp.tsv")?;
//! # Ok::<(), agreement_grammar::GenerationError>(())
//! ```
use std::collections::BTreeMap;
use std::fmt::Display;

use itertools::Itertools;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tinyvec::ArrayVec;
use tracing::{info, warn};

pub use cancellation::CancellationToken;
pub use classify::{AmbiguityPolicy, ClassificationStrategy, Classifier};
pub use dataset::{Dataset, DatasetRow};
pub use errors::{GenerationError, Result};
pub use lexicon::{LexicalCategory, Vocabulary};
pub use parsing::{ChartParser, CompiledGrammar};
pub use templates::{GrammarSpec, Template};

///Terminal placed right after the noun whose number is tracked.
pub const SUBJECT_MARKER: &str = "*";
///Terminal placed right after the critical verb.
pub const VERB_MARKER: &str = "^";
///Templates tracking more nouns than this are too large to enumerate by brute force.
pub const MAX_TRACKED: usize = 3;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Number {
    #[default]
    Singular,
    Plural,
}

impl Number {
    pub const ALL: [Number; 2] = [Number::Singular, Number::Plural];

    ///The value of the `AGR` feature in grammar rules.
    pub fn feature(&self) -> &'static str {
        match self {
            Number::Singular => "sg",
            Number::Plural => "pl",
        }
    }

    ///The name used for vocabulary columns and dataset labels.
    pub fn label(&self) -> &'static str {
        match self {
            Number::Singular => "singular",
            Number::Plural => "plural",
        }
    }

    ///The only other value of the domain.
    pub fn opposite(&self) -> Self {
        let mut others = Number::ALL.into_iter().filter(|x| x != self);
        match (others.next(), others.next()) {
            (Some(other), None) => other,
            _ => unreachable!("the number domain must have exactly two values"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Correctness {
    Correct,
    Incorrect,
}

///The numbers of all tracked nouns of a sentence, in template slot order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Condition(ArrayVec<[Number; MAX_TRACKED]>);

impl Condition {
    pub fn new(numbers: &[Number]) -> Result<Self> {
        let mut v = ArrayVec::new();
        for n in numbers {
            if v.try_push(*n).is_some() {
                return Err(GenerationError::InvalidConfig(format!(
                    "a condition holds at most {MAX_TRACKED} numbers"
                )));
            }
        }
        Ok(Condition(v))
    }

    ///Every condition over `tracked` nouns, first slot varying slowest.
    pub fn all(tracked: usize) -> Result<Vec<Self>> {
        itertools::repeat_n(Number::ALL.into_iter(), tracked)
            .multi_cartesian_product()
            .map(|numbers| Condition::new(&numbers))
            .collect()
    }

    pub fn numbers(&self) -> &[Number] {
        self.0.as_slice()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.iter().map(|n| n.feature()).join("_"))
    }
}

///Identifies one start-rule variant of a template.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariantKey {
    pub condition: Condition,
    pub correctness: Correctness,
}

impl Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = match self.correctness {
            Correctness::Correct => "correct",
            Correctness::Incorrect => "incorrect",
        };
        write!(f, "{}/{c}", self.condition)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    ///Maximum number of sentences enumerated from the reference grammar.
    pub max_sentences: usize,
    ///Maximum derivation depth while enumerating.
    pub max_depth: usize,
    ///Rows requested per condition. The dataset never has more than the smallest condition
    ///supports; `None` takes all of it.
    pub rows_per_condition: Option<usize>,
    ///Fail instead of warning when `max_sentences` is reached.
    pub strict_cap: bool,
    pub ambiguity: AmbiguityPolicy,
    pub strategy: ClassificationStrategy,
    ///Sentences classified per parallel batch.
    pub chunk_size: usize,
    ///Worker threads for classification, the global rayon pool when unset.
    pub threads: Option<usize>,
    ///Maximum number of rows sampled from each vocabulary category.
    pub sample_caps: BTreeMap<String, usize>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            max_sentences: 1_000_000,
            max_depth: 64,
            rows_per_condition: None,
            strict_cap: false,
            ambiguity: AmbiguityPolicy::Report,
            strategy: ClassificationStrategy::Unified,
            chunk_size: 4096,
            threads: None,
            sample_caps: BTreeMap::new(),
        }
    }
}

impl GenerationConfig {
    pub fn new(max_sentences: usize, rows_per_condition: Option<usize>) -> Self {
        GenerationConfig {
            max_sentences,
            rows_per_condition,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |x: &str| Err(GenerationError::InvalidConfig(x.to_string()));
        if self.max_sentences == 0 {
            return invalid("max_sentences must be positive");
        }
        if self.max_depth == 0 {
            return invalid("max_depth must be positive");
        }
        if self.chunk_size == 0 {
            return invalid("chunk_size must be positive");
        }
        if self.rows_per_condition == Some(0) {
            return invalid("rows_per_condition must be positive");
        }
        if self.threads == Some(0) {
            return invalid("threads must be positive");
        }
        Ok(())
    }
}

///End-of-run statistics. Per-sentence problems only ever surface here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub template: String,
    pub conditions: usize,
    pub enumerated: usize,
    ///The enumeration cap was reached, so some sentences may be missing.
    pub truncated: bool,
    ///Derivations abandoned at the depth limit.
    pub pruned: usize,
    pub agreement: usize,
    pub disagreement: usize,
    ///Sentences no variant accepted.
    pub unclassifiable: usize,
    ///Sentences more than one variant accepted.
    pub ambiguous: usize,
    ///Ambiguous sentences dropped under [`AmbiguityPolicy::Discard`].
    pub discarded: usize,
    ///Examples left without a partner of the opposite correctness.
    pub unpaired: usize,
    ///Pairs dropped because their sentences differ somewhere other than the critical verb.
    pub misaligned: usize,
    pub rows_per_condition: usize,
}

///Runs the whole pipeline for one template: assemble, compile, enumerate, classify, balance.
pub fn generate_dataset<R: Rng + ?Sized>(
    template: &str,
    vocabulary: &Vocabulary,
    config: &GenerationConfig,
    cancellation: &CancellationToken,
    rng: &mut R,
) -> Result<Dataset> {
    config.validate()?;
    let spec = templates::build(template, vocabulary)?;
    info!(
        template = spec.template().name,
        variants = spec.variants().len(),
        "assembled grammar"
    );

    let reference = CompiledGrammar::compile(&spec, spec.reference_key())?;
    if reference.grammar().is_recursive() {
        warn!(
            max_depth = config.max_depth,
            "grammar is recursive, enumeration stops at the depth limit"
        );
    }
    let classifier = Classifier::new(&spec, config.strategy, config.ambiguity)?;
    let mut sentences = generation::Sentences::new(
        reference.grammar(),
        config.max_sentences,
        config.max_depth,
    );
    let outcome = classifier.classify_all(&mut sentences, config, cancellation)?;

    if sentences.truncated() {
        if config.strict_cap {
            return Err(GenerationError::CapReached(config.max_sentences));
        }
        warn!(
            cap = config.max_sentences,
            "enumeration cap reached, some sentences were never generated"
        );
    }

    let summary = RunSummary {
        template: spec.template().name.to_string(),
        conditions: spec.conditions().len(),
        enumerated: outcome.enumerated,
        truncated: sentences.truncated(),
        pruned: sentences.pruned(),
        unclassifiable: outcome.unclassifiable,
        ambiguous: outcome.ambiguous,
        discarded: outcome.discarded,
        ..Default::default()
    };
    let dataset = dataset::finalize(
        &spec,
        outcome.pools,
        config.rows_per_condition,
        summary,
        rng,
    )?;
    let summary = dataset.summary();
    info!(
        template = %summary.template,
        enumerated = summary.enumerated,
        unclassifiable = summary.unclassifiable,
        ambiguous = summary.ambiguous,
        rows_per_condition = summary.rows_per_condition,
        "generated dataset"
    );
    Ok(dataset)
}

mod cancellation;
pub mod classify;
pub mod dataset;
mod errors;
pub mod generation;
pub mod grammar;
pub mod grammars;
pub mod lexicon;
pub mod parsing;
pub mod templates;
