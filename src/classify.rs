//! Sorting enumerated sentences into the variants of a template by parsing them.
use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cancellation::CancellationToken;
use crate::errors::{GenerationError, Result};
use crate::generation::Sentences;
use crate::parsing::CompiledGrammar;
use crate::templates::GrammarSpec;
use crate::{Condition, Correctness, GenerationConfig, VariantKey};

///What to do with a sentence that more than one variant accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguityPolicy {
    ///Stop at the first accepting variant without looking further.
    FirstMatch,
    ///Keep the first accepting variant, but count and log the ambiguity.
    #[default]
    Report,
    ///Drop the sentence.
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassificationStrategy {
    ///One recognizer per variant, tried in variant order.
    PerVariant,
    ///A single recognizer whose start productions are all variants.
    #[default]
    Unified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    ///The index of the only (or, under [`AmbiguityPolicy::FirstMatch`], the first) accepting
    ///variant.
    Accepted(usize),
    ///Several variants accept the sentence; the index is the first of them.
    Ambiguous(usize),
    ///Several variants accept the sentence and it was dropped.
    Discarded,
    Unclassifiable,
}

#[derive(Debug, Clone)]
enum Recognizers {
    PerVariant(Vec<CompiledGrammar>),
    Unified(CompiledGrammar),
}

#[derive(Debug, Clone)]
pub struct Classifier {
    variants: Vec<VariantKey>,
    recognizers: Recognizers,
    policy: AmbiguityPolicy,
}

///Classified sentences of one condition, in generation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pools<'g> {
    pub agreement: Vec<Vec<&'g str>>,
    pub disagreement: Vec<Vec<&'g str>>,
}

#[derive(Debug, Clone, Default)]
pub struct Outcome<'g> {
    pub pools: BTreeMap<Condition, Pools<'g>>,
    pub enumerated: usize,
    pub unclassifiable: usize,
    pub ambiguous: usize,
    pub discarded: usize,
}

impl<'g> Outcome<'g> {
    fn record(&mut self, variants: &[VariantKey], sentence: Vec<&'g str>, verdict: Verdict) {
        let i = match verdict {
            Verdict::Accepted(i) => i,
            Verdict::Ambiguous(i) => {
                self.ambiguous += 1;
                debug!(sentence = %sentence.join(" "), variant = %variants[i], "ambiguous sentence");
                i
            }
            Verdict::Discarded => {
                self.ambiguous += 1;
                self.discarded += 1;
                debug!(sentence = %sentence.join(" "), "discarded ambiguous sentence");
                return;
            }
            Verdict::Unclassifiable => {
                self.unclassifiable += 1;
                debug!(sentence = %sentence.join(" "), "no variant accepts sentence");
                return;
            }
        };
        let key = &variants[i];
        let pools = self.pools.entry(key.condition.clone()).or_default();
        match key.correctness {
            Correctness::Correct => pools.agreement.push(sentence),
            Correctness::Incorrect => pools.disagreement.push(sentence),
        }
    }
}

impl Classifier {
    pub fn new(
        spec: &GrammarSpec,
        strategy: ClassificationStrategy,
        policy: AmbiguityPolicy,
    ) -> Result<Self> {
        let variants: Vec<VariantKey> = spec.variants().iter().map(|(k, _)| k.clone()).collect();
        let recognizers = match strategy {
            ClassificationStrategy::PerVariant => Recognizers::PerVariant(
                variants
                    .iter()
                    .map(|key| CompiledGrammar::compile(spec, key))
                    .collect::<Result<Vec<_>>>()?,
            ),
            ClassificationStrategy::Unified => {
                let grammar = CompiledGrammar::compile_unified(spec)?;
                if grammar.parser().n_start_productions() != variants.len() {
                    return Err(GenerationError::InvalidConfig(format!(
                        "the rules of template `{}` must not define the start symbol",
                        spec.template().name
                    )));
                }
                Recognizers::Unified(grammar)
            }
        };
        Ok(Classifier {
            variants,
            recognizers,
            policy,
        })
    }

    pub fn variants(&self) -> &[VariantKey] {
        &self.variants
    }

    pub fn variant(&self, i: usize) -> &VariantKey {
        &self.variants[i]
    }

    pub fn policy(&self) -> AmbiguityPolicy {
        self.policy
    }

    ///Decides which variant a sentence belongs to.
    pub fn classify(&self, tokens: &[&str]) -> Verdict {
        let (first, matches) = match &self.recognizers {
            Recognizers::Unified(grammar) => {
                let accepted = grammar.parser().accepted_productions(tokens);
                (accepted.first_one(), accepted.count_ones())
            }
            Recognizers::PerVariant(grammars) => {
                let mut accepting = grammars
                    .iter()
                    .enumerate()
                    .filter(|(_, g)| g.accepts(tokens))
                    .map(|(i, _)| i);
                match self.policy {
                    AmbiguityPolicy::FirstMatch => {
                        let first = accepting.next();
                        (first, usize::from(first.is_some()))
                    }
                    _ => {
                        let first = accepting.next();
                        (first, first.map_or(0, |_| 1 + accepting.count()))
                    }
                }
            }
        };
        match (first, matches, self.policy) {
            (None, _, _) => Verdict::Unclassifiable,
            (Some(i), 1, _) | (Some(i), _, AmbiguityPolicy::FirstMatch) => Verdict::Accepted(i),
            (Some(i), _, AmbiguityPolicy::Report) => Verdict::Ambiguous(i),
            (Some(_), _, AmbiguityPolicy::Discard) => Verdict::Discarded,
        }
    }

    ///Classifies every sentence of `sentences`, in parallel batches of `config.chunk_size`.
    ///
    ///Results are merged in generation order, so the pools do not depend on the number of
    ///threads.
    pub fn classify_all<'g>(
        &self,
        sentences: &mut Sentences<'g>,
        config: &GenerationConfig,
        cancellation: &CancellationToken,
    ) -> Result<Outcome<'g>> {
        let mut run = || -> Result<Outcome<'g>> {
            let mut outcome = Outcome::default();
            loop {
                let mut chunk = Vec::with_capacity(config.chunk_size);
                for sentence in sentences.by_ref() {
                    if cancellation.is_cancelled() {
                        return Err(GenerationError::Cancelled);
                    }
                    chunk.push(sentence);
                    if chunk.len() == config.chunk_size {
                        break;
                    }
                }
                if chunk.is_empty() {
                    break;
                }
                outcome.enumerated += chunk.len();

                let verdicts = chunk
                    .par_iter()
                    .map(|sentence| {
                        if cancellation.is_cancelled() {
                            return Err(GenerationError::Cancelled);
                        }
                        Ok(self.classify(sentence))
                    })
                    .collect::<Result<Vec<_>>>()?;
                for (sentence, verdict) in chunk.into_iter().zip(verdicts) {
                    outcome.record(&self.variants, sentence, verdict);
                }
                debug!(enumerated = outcome.enumerated, "classified batch");
            }
            Ok(outcome)
        };

        let outcome = match config.threads {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()?
                .install(run)?,
            None => run()?,
        };
        if outcome.ambiguous > 0 {
            warn!(
                ambiguous = outcome.ambiguous,
                discarded = outcome.discarded,
                "some sentences are accepted by more than one variant"
            );
        }
        if outcome.unclassifiable > 0 {
            warn!(
                unclassifiable = outcome.unclassifiable,
                "some sentences are accepted by no variant"
            );
        }
        Ok(outcome)
    }
}
