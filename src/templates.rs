//! The registry of sentence templates and the assembly of their grammars.
//!
//! A template fixes the order of constituents of one construction and which nouns have their
//! number tracked. Assembling it against a [`Vocabulary`] produces one start rule for every
//! combination of tracked numbers, once with the critical verb agreeing and once with it
//! disagreeing, all sharing the same body of phrase and lexical rules.
use std::fmt::Display;

use crate::errors::{GenerationError, Result};
use crate::grammars::STRUCTURAL_RULES;
use crate::lexicon::{
    ADVERBS, COMPLEMENTS, CONJUNCTIONS, OBJECT_NOUNS, POSITION_NOUNS, PREPOSITIONS, PROPER_NOUNS,
    QUANTITY_NOUNS, QUANTITY_SUBJECT_NOUNS, RELATIVE_PRONOUNS, SUBJECT_NOUNS, TEMPORAL_ADVERBS,
    VERBS_INTRANSITIVE, VERBS_MODAL, VERBS_TRANSITIVE, Vocabulary,
};
use crate::{
    Condition, Correctness, MAX_TRACKED, Number, SUBJECT_MARKER, VERB_MARKER, VariantKey,
};

///Which number the critical verb must have to agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agreement {
    ///The verb agrees with the tracked noun in this slot.
    Slot(usize),
    ///The verb always has this number, as with conjoined subjects.
    Fixed(Number),
}

///One symbol of a template's start rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece {
    ///A category without constraints.
    Category(&'static str),
    ///A category with the number of a tracked slot.
    Slot(&'static str, usize),
    ///A category with the number of the critical verb.
    Verb(&'static str),
    ///A literal word.
    Word(&'static str),
    SubjectMarker,
    VerbMarker,
    ///The complement, left out when the vocabulary has none.
    Complement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub name: &'static str,
    ///How many nouns have their number tracked; conditions have this many slots.
    pub tracked: usize,
    pub agreement: Agreement,
    ///Vocabulary categories the start rule needs, directly or through phrase rules.
    pub requires: &'static [&'static str],
    pub layout: &'static [Piece],
}

use Piece::*;

const NOUN_VERB: &[&str] = &[SUBJECT_NOUNS, VERBS_TRANSITIVE];
const NOUN_VERB_ADV: &[&str] = &[SUBJECT_NOUNS, VERBS_TRANSITIVE, ADVERBS];
const NOUN_PP: &[&str] = &[SUBJECT_NOUNS, VERBS_TRANSITIVE, PREPOSITIONS, POSITION_NOUNS];
const QNTY: &[&str] = &[QUANTITY_NOUNS, QUANTITY_SUBJECT_NOUNS, VERBS_TRANSITIVE];
const THAT: &[&str] = &[OBJECT_NOUNS, VERBS_MODAL, SUBJECT_NOUNS, VERBS_TRANSITIVE];
const THAT_PP: &[&str] = &[
    OBJECT_NOUNS,
    VERBS_MODAL,
    SUBJECT_NOUNS,
    VERBS_TRANSITIVE,
    PREPOSITIONS,
    POSITION_NOUNS,
];

pub static TEMPLATES: [Template; 18] = [
    Template {
        name: "simple",
        tracked: 1,
        agreement: Agreement::Slot(0),
        requires: NOUN_VERB,
        layout: &[Slot("NP", 0), SubjectMarker, Verb("VP"), VerbMarker, Complement],
    },
    Template {
        name: "adv",
        tracked: 1,
        agreement: Agreement::Slot(0),
        requires: NOUN_VERB_ADV,
        layout: &[
            Slot("NP", 0),
            SubjectMarker,
            Verb("VP"),
            VerbMarker,
            Complement,
            Category("ADV"),
        ],
    },
    Template {
        name: "adv_adv",
        tracked: 1,
        agreement: Agreement::Slot(0),
        requires: &[SUBJECT_NOUNS, VERBS_TRANSITIVE, ADVERBS, TEMPORAL_ADVERBS],
        layout: &[
            Slot("NP", 0),
            SubjectMarker,
            Verb("VP"),
            VerbMarker,
            Complement,
            Category("ADV_temp"),
            Category("ADV"),
        ],
    },
    Template {
        name: "adv_conjunction",
        tracked: 1,
        agreement: Agreement::Slot(0),
        requires: &[SUBJECT_NOUNS, VERBS_TRANSITIVE, ADVERBS, CONJUNCTIONS],
        layout: &[
            Slot("NP", 0),
            SubjectMarker,
            Verb("VP"),
            VerbMarker,
            Complement,
            Category("ADV"),
            Category("CONJ"),
            Category("ADV"),
        ],
    },
    Template {
        name: "namepp",
        tracked: 1,
        agreement: Agreement::Slot(0),
        requires: &[SUBJECT_NOUNS, VERBS_TRANSITIVE, PREPOSITIONS, PROPER_NOUNS],
        layout: &[
            Slot("NP", 0),
            SubjectMarker,
            Category("PP_pn"),
            Verb("VP"),
            VerbMarker,
            Complement,
        ],
    },
    Template {
        name: "nounpp",
        tracked: 2,
        agreement: Agreement::Slot(0),
        requires: NOUN_PP,
        layout: &[
            Slot("NP", 0),
            SubjectMarker,
            Slot("PP", 1),
            Verb("VP"),
            VerbMarker,
            Complement,
        ],
    },
    Template {
        name: "nounpp_adv",
        tracked: 2,
        agreement: Agreement::Slot(0),
        requires: &[
            SUBJECT_NOUNS,
            VERBS_TRANSITIVE,
            PREPOSITIONS,
            POSITION_NOUNS,
            ADVERBS,
        ],
        layout: &[
            Slot("NP", 0),
            SubjectMarker,
            Slot("PP", 1),
            Verb("VP"),
            VerbMarker,
            Complement,
            Category("ADV"),
        ],
    },
    Template {
        name: "qnty_simple",
        tracked: 1,
        agreement: Agreement::Slot(0),
        requires: QNTY,
        layout: &[
            Slot("QNTY", 0),
            SubjectMarker,
            Category("QNTY_subj"),
            Verb("VP"),
            VerbMarker,
            Complement,
        ],
    },
    Template {
        name: "qnty_namepp",
        tracked: 1,
        agreement: Agreement::Slot(0),
        requires: &[
            QUANTITY_NOUNS,
            QUANTITY_SUBJECT_NOUNS,
            VERBS_TRANSITIVE,
            PREPOSITIONS,
            PROPER_NOUNS,
        ],
        layout: &[
            Slot("QNTY", 0),
            SubjectMarker,
            Category("QNTY_subj"),
            Category("PP_pn"),
            Verb("VP"),
            VerbMarker,
            Complement,
        ],
    },
    Template {
        name: "qnty_nounpp",
        tracked: 2,
        agreement: Agreement::Slot(0),
        requires: &[
            QUANTITY_NOUNS,
            QUANTITY_SUBJECT_NOUNS,
            VERBS_TRANSITIVE,
            PREPOSITIONS,
            POSITION_NOUNS,
        ],
        layout: &[
            Slot("QNTY", 0),
            SubjectMarker,
            Category("QNTY_subj"),
            Slot("PP", 1),
            Verb("VP"),
            VerbMarker,
            Complement,
        ],
    },
    Template {
        name: "rel_clause",
        tracked: 2,
        agreement: Agreement::Slot(0),
        requires: &[
            SUBJECT_NOUNS,
            VERBS_TRANSITIVE,
            RELATIVE_PRONOUNS,
            OBJECT_NOUNS,
            VERBS_INTRANSITIVE,
        ],
        layout: &[
            Slot("NP", 0),
            SubjectMarker,
            Slot("REL_poss", 1),
            Verb("VP"),
            VerbMarker,
            Complement,
        ],
    },
    Template {
        name: "that",
        tracked: 2,
        agreement: Agreement::Slot(0),
        requires: &[OBJECT_NOUNS, VERBS_MODAL, SUBJECT_NOUNS, VERBS_INTRANSITIVE],
        layout: &[
            Slot("NP_obj", 1),
            Slot("V_that", 1),
            Slot("NP", 0),
            SubjectMarker,
            Verb("VP_intrans"),
            VerbMarker,
        ],
    },
    Template {
        name: "that_compl",
        tracked: 2,
        agreement: Agreement::Slot(0),
        requires: THAT,
        layout: &[
            Slot("NP_obj", 1),
            Slot("V_that", 1),
            Slot("NP", 0),
            SubjectMarker,
            Complement,
            Verb("VP"),
            VerbMarker,
        ],
    },
    Template {
        name: "that_adv",
        tracked: 2,
        agreement: Agreement::Slot(0),
        requires: &[
            OBJECT_NOUNS,
            VERBS_MODAL,
            SUBJECT_NOUNS,
            VERBS_TRANSITIVE,
            ADVERBS,
        ],
        layout: &[
            Slot("NP_obj", 1),
            Slot("V_that", 1),
            Slot("NP", 0),
            SubjectMarker,
            Category("ADV"),
            Complement,
            Verb("VP"),
            VerbMarker,
        ],
    },
    Template {
        name: "that_nounpp",
        tracked: 3,
        agreement: Agreement::Slot(0),
        requires: THAT_PP,
        layout: &[
            Slot("NP_obj", 1),
            Slot("V_that", 1),
            Slot("NP", 0),
            SubjectMarker,
            Slot("PP", 2),
            Complement,
            Verb("VP"),
            VerbMarker,
        ],
    },
    Template {
        name: "that_nounpp_adv",
        tracked: 3,
        agreement: Agreement::Slot(0),
        requires: &[
            OBJECT_NOUNS,
            VERBS_MODAL,
            SUBJECT_NOUNS,
            VERBS_TRANSITIVE,
            PREPOSITIONS,
            POSITION_NOUNS,
            ADVERBS,
        ],
        layout: &[
            Slot("NP_obj", 1),
            Slot("V_that", 1),
            Slot("NP", 0),
            SubjectMarker,
            Slot("PP", 2),
            Category("ADV"),
            Complement,
            Verb("VP"),
            VerbMarker,
        ],
    },
    Template {
        name: "noun_conj",
        tracked: 2,
        agreement: Agreement::Fixed(Number::Plural),
        requires: NOUN_VERB,
        layout: &[
            Slot("NP", 0),
            Word("en"),
            Slot("NP", 1),
            SubjectMarker,
            Verb("VP"),
            VerbMarker,
            Complement,
        ],
    },
    Template {
        name: "s_conj",
        tracked: 2,
        agreement: Agreement::Slot(1),
        requires: NOUN_VERB,
        layout: &[
            Slot("NP", 0),
            Slot("VP", 0),
            Word("en"),
            Slot("NP", 1),
            SubjectMarker,
            Verb("VP"),
            VerbMarker,
            Complement,
        ],
    },
];

pub fn get(name: &str) -> Result<&'static Template> {
    TEMPLATES
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| GenerationError::UnknownTemplate(name.to_string()))
}

pub fn names() -> impl Iterator<Item = &'static str> {
    TEMPLATES.iter().map(|t| t.name)
}

///Assembles the grammar of a registered template.
pub fn build(name: &str, vocabulary: &Vocabulary) -> Result<GrammarSpec> {
    get(name)?.assemble(vocabulary)
}

impl Template {
    ///The number the verb has in the given variant.
    pub fn verb_number(&self, condition: &Condition, correctness: Correctness) -> Number {
        let agreeing = match self.agreement {
            Agreement::Slot(i) => condition.numbers()[i],
            Agreement::Fixed(n) => n,
        };
        match correctness {
            Correctness::Correct => agreeing,
            Correctness::Incorrect => agreeing.opposite(),
        }
    }

    ///Renders the start rule of one variant.
    pub fn start_rule(
        &self,
        condition: &Condition,
        correctness: Correctness,
        complement: bool,
    ) -> String {
        let agr = |n: Number| format!("[AGR='{}']", n.feature());
        let verb = self.verb_number(condition, correctness);
        let rhs: Vec<String> = self
            .layout
            .iter()
            .filter_map(|piece| match piece {
                Category(c) => Some(c.to_string()),
                Slot(c, i) => Some(format!("{c}{}", agr(condition.numbers()[*i]))),
                Verb(c) => Some(format!("{c}{}", agr(verb))),
                Word(w) => Some(format!("'{w}'")),
                SubjectMarker => Some(format!("'{SUBJECT_MARKER}'")),
                VerbMarker => Some(format!("'{VERB_MARKER}'")),
                Complement => complement.then(|| "COMPL".to_string()),
            })
            .collect();
        format!("S -> {}", rhs.join(" "))
    }

    pub fn assemble(&self, vocabulary: &Vocabulary) -> Result<GrammarSpec> {
        if self.tracked == 0 || self.tracked > MAX_TRACKED {
            return Err(GenerationError::TooManyTrackedNouns {
                template: self.name.to_string(),
                tracked: self.tracked,
                max: MAX_TRACKED,
            });
        }
        if let Some(missing) = self.requires.iter().find(|c| !vocabulary.contains(c)) {
            return Err(GenerationError::MissingCategory {
                template: self.name.to_string(),
                category: missing.to_string(),
            });
        }

        let complement = vocabulary.contains(COMPLEMENTS);
        let conditions = Condition::all(self.tracked)?;
        let mut variants = Vec::with_capacity(conditions.len() * 2);
        for condition in conditions.iter() {
            for correctness in [Correctness::Correct, Correctness::Incorrect] {
                let rule = self.start_rule(condition, correctness, complement);
                variants.push((
                    VariantKey {
                        condition: condition.clone(),
                        correctness,
                    },
                    rule,
                ));
            }
        }

        let mut body = vec![STRUCTURAL_RULES.to_string()];
        body.extend(vocabulary.lexical_rules()?);
        Ok(GrammarSpec {
            template: *self,
            body: body.join("\n"),
            conditions,
            variants,
        })
    }
}

///A template assembled against a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarSpec {
    template: Template,
    body: String,
    conditions: Vec<Condition>,
    variants: Vec<(VariantKey, String)>,
}

impl GrammarSpec {
    pub fn template(&self) -> &Template {
        &self.template
    }

    ///Every rule but the start rules.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    ///Start rules in classification order: each condition's correct variant, then its
    ///incorrect one.
    pub fn variants(&self) -> &[(VariantKey, String)] {
        &self.variants
    }

    ///The variant whose grammar is enumerated; its feature-erased language is the same as any
    ///other's.
    pub fn reference_key(&self) -> &VariantKey {
        &self.variants[0].0
    }

    pub fn start_rule(&self, key: &VariantKey) -> Option<&str> {
        self.variants
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, rule)| rule.as_str())
    }
}

impl Display for GrammarSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "# {}", self.template.name)?;
        for (key, rule) in self.variants.iter() {
            writeln!(f, "# {key}")?;
            writeln!(f, "{rule}")?;
        }
        write!(f, "{}", self.body)
    }
}
