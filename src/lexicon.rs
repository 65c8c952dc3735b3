//! Vocabulary files: one CSV per lexical category, one column per word form.
//!
//! Columns of numbered categories (nouns and verbs) are named `singular` and `plural`, and a row
//! holds the two forms of one word, so sampling keeps whole rows in file order.
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;

use ahash::AHashSet;
use itertools::Itertools;
use rand::Rng;
use tracing::{debug, warn};

use crate::errors::{GenerationError, Result};
use crate::{Number, SUBJECT_MARKER, VERB_MARKER};

///A category the grammar knows how to use, and the non-terminal its words are rendered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownCategory {
    pub name: &'static str,
    pub nonterminal: &'static str,
    ///Single-column categories name their column, numbered ones have `singular` and `plural`.
    pub column: Option<&'static str>,
}

impl KnownCategory {
    const fn numbered(name: &'static str, nonterminal: &'static str) -> Self {
        KnownCategory {
            name,
            nonterminal,
            column: None,
        }
    }

    const fn single(name: &'static str, nonterminal: &'static str, column: &'static str) -> Self {
        KnownCategory {
            name,
            nonterminal,
            column: Some(column),
        }
    }

    pub fn columns(&self) -> Vec<&'static str> {
        match self.column {
            Some(c) => vec![c],
            None => Number::ALL.iter().map(|n| n.label()).collect(),
        }
    }
}

pub const SUBJECT_NOUNS: &str = "subject_nouns";
pub const OBJECT_NOUNS: &str = "object_nouns";
pub const POSITION_NOUNS: &str = "position_nouns";
pub const QUANTITY_NOUNS: &str = "quantity_nouns";
pub const QUANTITY_SUBJECT_NOUNS: &str = "quantity_subject_nouns";
pub const PROPER_NOUNS: &str = "proper_nouns";
pub const PREPOSITIONS: &str = "prepositions";
pub const ADVERBS: &str = "adverbs";
pub const TEMPORAL_ADVERBS: &str = "temporal_adverbs";
pub const CONJUNCTIONS: &str = "conjunctions";
pub const RELATIVE_PRONOUNS: &str = "relative_pronouns";
pub const VERBS_TRANSITIVE: &str = "verbs_transitive";
pub const VERBS_INTRANSITIVE: &str = "verbs_intransitive";
pub const VERBS_MODAL: &str = "verbs_modal";
pub const COMPLEMENTS: &str = "complements";

pub const CATEGORIES: [KnownCategory; 15] = [
    KnownCategory::numbered(SUBJECT_NOUNS, "NP"),
    KnownCategory::numbered(OBJECT_NOUNS, "NP_obj"),
    KnownCategory::numbered(POSITION_NOUNS, "NP_pos"),
    KnownCategory::numbered(QUANTITY_NOUNS, "QNTY"),
    KnownCategory::single(QUANTITY_SUBJECT_NOUNS, "QNTY_subj", "noun"),
    KnownCategory::single(PROPER_NOUNS, "PN", "proper_noun"),
    KnownCategory::single(PREPOSITIONS, "P", "preposition"),
    KnownCategory::single(ADVERBS, "ADV", "adverb"),
    KnownCategory::single(TEMPORAL_ADVERBS, "ADV_temp", "adverb"),
    KnownCategory::single(CONJUNCTIONS, "CONJ", "conjunction"),
    KnownCategory::single(RELATIVE_PRONOUNS, "REL_pn", "relative_pronoun"),
    KnownCategory::numbered(VERBS_TRANSITIVE, "V"),
    KnownCategory::numbered(VERBS_INTRANSITIVE, "V_intrans"),
    KnownCategory::numbered(VERBS_MODAL, "V_that"),
    KnownCategory::single(COMPLEMENTS, "COMPL", "complement"),
];

pub fn known_category(name: &str) -> Option<&'static KnownCategory> {
    CATEGORIES.iter().find(|c| c.name == name)
}

///The word forms of one category, column by column in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalCategory {
    name: String,
    columns: Vec<(String, Vec<String>)>,
}

impl LexicalCategory {
    ///Builds a category from its columns, checking every value can be written as a quoted
    ///terminal and that no column is empty or repeats a value.
    pub fn new(name: impl Into<String>, columns: Vec<(String, Vec<String>)>) -> Result<Self> {
        let name = name.into();
        for (column, values) in columns.iter() {
            if values.is_empty() {
                return Err(GenerationError::EmptyBucket {
                    category: name,
                    column: column.clone(),
                });
            }
            let mut seen = AHashSet::new();
            for value in values {
                if value.contains(['\'', '\n'])
                    || value
                        .split_whitespace()
                        .any(|w| w == SUBJECT_MARKER || w == VERB_MARKER)
                {
                    return Err(GenerationError::InvalidLiteral {
                        category: name,
                        value: value.clone(),
                    });
                }
                if !seen.insert(value.as_str()) {
                    return Err(GenerationError::DuplicateEntry {
                        category: name,
                        column: column.clone(),
                        value: value.clone(),
                    });
                }
            }
        }
        Ok(LexicalCategory { name, columns })
    }

    ///Reads a comma-delimited file with a header row.
    ///
    ///With `max_count` smaller than the number of rows, that many rows are sampled uniformly
    ///without replacement and kept in file order.
    pub fn load<R: Rng + ?Sized>(
        path: impl AsRef<Path>,
        name: &str,
        max_count: Option<usize>,
        rng: &mut R,
    ) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(GenerationError::VocabularyNotFound {
                path: path.to_path_buf(),
            });
        }
        if max_count == Some(0) {
            return Err(GenerationError::InvalidSampleSize {
                category: name.to_string(),
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)?;
        let header: Vec<String> = reader.headers()?.iter().map(|x| x.to_string()).collect();
        let numbered = known_category(name).is_some_and(|c| c.column.is_none());
        let mut rows = vec![];
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let row: Vec<String> = record.iter().map(|x| x.to_string()).collect();
            let filled = (0..header.len())
                .filter(|j| row.get(*j).is_some_and(|x| !x.is_empty()))
                .count();
            if filled == 0 {
                continue;
            }
            //Numbered rows pair a singular with its plural, so a half-filled row cannot be kept.
            if numbered && filled < header.len() {
                return Err(GenerationError::RaggedRow {
                    category: name.to_string(),
                    line: i + 2,
                });
            }
            rows.push(row);
        }

        if let Some(k) = max_count.filter(|k| *k < rows.len()) {
            let mut keep = rand::seq::index::sample(rng, rows.len(), k).into_vec();
            keep.sort_unstable();
            let sampled: Vec<Vec<String>> =
                keep.into_iter().map(|i| std::mem::take(&mut rows[i])).collect();
            rows = sampled;
        }

        let columns = header
            .into_iter()
            .enumerate()
            .map(|(i, column)| {
                let values = rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .filter(|x| !x.is_empty())
                    .cloned()
                    .collect();
                (column, values)
            })
            .collect();
        LexicalCategory::new(name, columns)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(c, _)| c.as_str())
    }

    pub fn bucket(&self, column: &str) -> Result<&[String]> {
        self.columns
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, values)| values.as_slice())
            .ok_or_else(|| GenerationError::MissingColumn {
                category: self.name.clone(),
                column: column.to_string(),
            })
    }

    ///Renders a column as alternatives of a production, e.g. `'de man' | 'de vrouw'`.
    pub fn disjunction(&self, column: &str) -> Result<String> {
        Ok(self
            .bucket(column)?
            .iter()
            .map(|x| format!("'{x}'"))
            .join(" | "))
    }
}

///Every lexical category available to the grammars.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    categories: BTreeMap<String, LexicalCategory>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    ///Adds a category, checking known categories have the columns the grammar needs.
    pub fn insert(&mut self, category: LexicalCategory) -> Result<()> {
        if let Some(known) = known_category(category.name()) {
            for column in known.columns() {
                category.bucket(column)?;
            }
            if known.column.is_none() {
                let singular = category.bucket(Number::Singular.label())?.len();
                let plural = category.bucket(Number::Plural.label())?.len();
                if singular != plural {
                    return Err(GenerationError::UnalignedColumns {
                        category: category.name.clone(),
                        singular,
                        plural,
                    });
                }
            }
        }
        self.categories.insert(category.name.clone(), category);
        Ok(())
    }

    pub fn with(mut self, category: LexicalCategory) -> Result<Self> {
        self.insert(category)?;
        Ok(self)
    }

    ///Loads `<category>.csv` for every known category present in `dir`, sampling at most
    ///`caps[category]` rows of each.
    pub fn load_dir<R: Rng + ?Sized>(
        dir: impl AsRef<Path>,
        caps: &BTreeMap<String, usize>,
        rng: &mut R,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(GenerationError::VocabularyNotFound {
                path: dir.to_path_buf(),
            });
        }
        for name in caps.keys() {
            if known_category(name).is_none() {
                warn!(category = %name, "sampling cap for an unknown category");
            }
        }

        let mut vocabulary = Vocabulary::new();
        for known in CATEGORIES.iter() {
            let path = dir.join(format!("{}.csv", known.name));
            if !path.is_file() {
                continue;
            }
            let category =
                LexicalCategory::load(&path, known.name, caps.get(known.name).copied(), rng)?;
            debug!(
                category = known.name,
                rows = category.columns.first().map_or(0, |(_, v)| v.len()),
                "loaded vocabulary"
            );
            vocabulary.insert(category)?;
        }
        Ok(vocabulary)
    }

    pub fn get(&self, name: &str) -> Option<&LexicalCategory> {
        self.categories.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    pub fn categories(&self) -> impl Iterator<Item = &LexicalCategory> {
        self.categories.values()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    ///One production per column of every known category present, e.g.
    ///`NP[AGR='sg'] -> 'de man' | 'de vrouw'`.
    pub fn lexical_rules(&self) -> Result<Vec<String>> {
        let mut rules = vec![];
        for known in CATEGORIES.iter() {
            let Some(category) = self.get(known.name) else {
                continue;
            };
            match known.column {
                Some(column) => rules.push(format!(
                    "{} -> {}",
                    known.nonterminal,
                    category.disjunction(column)?
                )),
                None => {
                    for number in Number::ALL {
                        rules.push(format!(
                            "{}[AGR='{}'] -> {}",
                            known.nonterminal,
                            number.feature(),
                            category.disjunction(number.label())?
                        ));
                    }
                }
            }
        }
        Ok(rules)
    }
}

impl Display for LexicalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        for (column, values) in self.columns.iter() {
            write!(f, " {column}={}", values.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, contents: &str) -> Result<()> {
        let mut f = std::fs::File::create(dir.join(format!("{name}.csv")))?;
        f.write_all(contents.as_bytes())?;
        Ok(())
    }

    #[test]
    fn load_and_render() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_csv(
            dir.path(),
            SUBJECT_NOUNS,
            "singular,plural\nde vrouw , de vrouwen\nde man,de mannen\n",
        )?;
        write_csv(dir.path(), ADVERBS, "adverb\nvaak\nzeker\n")?;
        write_csv(dir.path(), "ignored", "x\ny\n")?;

        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let vocabulary = Vocabulary::load_dir(dir.path(), &BTreeMap::new(), &mut rng)?;
        assert!(vocabulary.contains(SUBJECT_NOUNS));
        assert!(!vocabulary.contains("ignored"));
        assert_eq!(
            vocabulary.get(SUBJECT_NOUNS).unwrap().bucket("singular")?,
            ["de vrouw", "de man"]
        );
        assert_eq!(
            vocabulary.lexical_rules()?,
            vec![
                "NP[AGR='sg'] -> 'de vrouw' | 'de man'",
                "NP[AGR='pl'] -> 'de vrouwen' | 'de mannen'",
                "ADV -> 'vaak' | 'zeker'",
            ]
        );
        Ok(())
    }

    #[test]
    fn sampling_keeps_rows_aligned() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut contents = String::from("singular,plural\n");
        for i in 0..20 {
            contents.push_str(&format!("n{i},n{i}s\n"));
        }
        write_csv(dir.path(), SUBJECT_NOUNS, &contents)?;
        let path = dir.path().join("subject_nouns.csv");

        let mut rng = ChaCha8Rng::seed_from_u64(19);
        let category = LexicalCategory::load(&path, SUBJECT_NOUNS, Some(5), &mut rng)?;
        let singular = category.bucket("singular")?;
        let plural = category.bucket("plural")?;
        assert_eq!(singular.len(), 5);
        for (s, p) in singular.iter().zip(plural) {
            assert_eq!(format!("{s}s"), *p);
        }
        let order: Vec<usize> = singular
            .iter()
            .map(|x| x[1..].parse::<usize>())
            .collect::<std::result::Result<_, _>>()?;
        assert!(order.is_sorted());

        let everything = LexicalCategory::load(&path, SUBJECT_NOUNS, Some(100), &mut rng)?;
        assert_eq!(everything.bucket("plural")?.len(), 20);
        Ok(())
    }

    #[test]
    fn loading_errors() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let missing = dir.path().join("verbs_modal.csv");
        assert!(matches!(
            LexicalCategory::load(&missing, VERBS_MODAL, None, &mut rng),
            Err(GenerationError::VocabularyNotFound { .. })
        ));

        write_csv(dir.path(), ADVERBS, "adverb\nvaak\n")?;
        let path = dir.path().join("adverbs.csv");
        assert!(matches!(
            LexicalCategory::load(&path, ADVERBS, Some(0), &mut rng),
            Err(GenerationError::InvalidSampleSize { .. })
        ));

        write_csv(dir.path(), VERBS_MODAL, "singular\nzegt dat\n")?;
        assert!(matches!(
            Vocabulary::load_dir(dir.path(), &BTreeMap::new(), &mut rng),
            Err(GenerationError::MissingColumn { column, .. }) if column == "plural"
        ));

        write_csv(dir.path(), VERBS_MODAL, "singular,plural\n,\n")?;
        assert!(matches!(
            Vocabulary::load_dir(dir.path(), &BTreeMap::new(), &mut rng),
            Err(GenerationError::EmptyBucket { .. })
        ));
        Ok(())
    }

    #[test]
    fn invalid_values() {
        let column = |values: &[&str]| {
            vec![(
                "adverb".to_string(),
                values.iter().map(|x| x.to_string()).collect(),
            )]
        };
        assert!(LexicalCategory::new(ADVERBS, column(&["vaak", "nu"])).is_ok());
        assert!(matches!(
            LexicalCategory::new(ADVERBS, column(&["'s avonds"])),
            Err(GenerationError::InvalidLiteral { .. })
        ));
        assert!(matches!(
            LexicalCategory::new(ADVERBS, column(&["*"])),
            Err(GenerationError::InvalidLiteral { .. })
        ));
        assert!(matches!(
            LexicalCategory::new(ADVERBS, column(&["kijkt *"])),
            Err(GenerationError::InvalidLiteral { value, .. }) if value == "kijkt *"
        ));
        assert!(matches!(
            LexicalCategory::new(ADVERBS, column(&["^ nu"])),
            Err(GenerationError::InvalidLiteral { .. })
        ));
        assert!(LexicalCategory::new(ADVERBS, column(&["nu*"])).is_ok());
        assert!(matches!(
            LexicalCategory::new(ADVERBS, column(&["vaak", "vaak"])),
            Err(GenerationError::DuplicateEntry { .. })
        ));
    }

    #[test]
    fn numbered_rows_stay_whole() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        write_csv(
            dir.path(),
            VERBS_TRANSITIVE,
            "singular,plural\nbewondert,bewonderen\nkent,\nziet,zien\n",
        )?;
        let path = dir.path().join("verbs_transitive.csv");
        assert!(matches!(
            LexicalCategory::load(&path, VERBS_TRANSITIVE, None, &mut rng),
            Err(GenerationError::RaggedRow { line: 3, .. })
        ));
        assert!(matches!(
            Vocabulary::load_dir(dir.path(), &BTreeMap::new(), &mut rng),
            Err(GenerationError::RaggedRow { .. })
        ));

        write_csv(
            dir.path(),
            VERBS_TRANSITIVE,
            "singular,plural\nbewondert,bewonderen\n\nziet,zien\n,\n",
        )?;
        let verbs = LexicalCategory::load(&path, VERBS_TRANSITIVE, None, &mut rng)?;
        assert_eq!(verbs.bucket("singular")?, ["bewondert", "ziet"]);
        assert_eq!(verbs.bucket("plural")?, ["bewonderen", "zien"]);

        //Single-column categories just skip empty cells.
        write_csv(dir.path(), ADVERBS, "adverb\nvaak\n\nzeker\n")?;
        let adverbs = dir.path().join("adverbs.csv");
        let adverbs = LexicalCategory::load(&adverbs, ADVERBS, None, &mut rng)?;
        assert_eq!(adverbs.bucket("adverb")?, ["vaak", "zeker"]);

        let unaligned = LexicalCategory::new(
            VERBS_TRANSITIVE,
            vec![
                ("singular".to_string(), vec!["kent".to_string(), "ziet".to_string()]),
                ("plural".to_string(), vec!["zien".to_string()]),
            ],
        )?;
        assert!(matches!(
            Vocabulary::new().with(unaligned),
            Err(GenerationError::UnalignedColumns {
                singular: 2,
                plural: 1,
                ..
            })
        ));
        Ok(())
    }
}
