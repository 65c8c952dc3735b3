//! Turning classified sentences into a balanced dataset of agreement pairs.
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use rand::Rng;
use tracing::{debug, info, warn};

use crate::classify::Pools;
use crate::errors::{GenerationError, Result};
use crate::templates::GrammarSpec;
use crate::{Condition, RunSummary, SUBJECT_MARKER, VERB_MARKER};

///A generated sentence with its markers removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed {
    pub words: Vec<String>,
    pub subject_index: usize,
    pub verb_index: usize,
}

impl Processed {
    ///Splits multi-word terminals, removes the markers while remembering the word before each,
    ///and capitalizes the first word.
    pub fn new(tokens: &[&str]) -> Result<Self> {
        let mut words: Vec<String> = vec![];
        let mut subject_index = None;
        let mut verb_index = None;
        for word in tokens.iter().flat_map(|t| t.split_whitespace()) {
            let marked = match word {
                SUBJECT_MARKER => &mut subject_index,
                VERB_MARKER => &mut verb_index,
                _ => {
                    words.push(word.to_string());
                    continue;
                }
            };
            *marked = Some(words.len().checked_sub(1).ok_or_else(|| {
                GenerationError::MarkerWithoutWord {
                    sentence: tokens.join(" "),
                    marker: word.to_string(),
                }
            })?);
        }
        let missing = |marker: &str| GenerationError::MissingMarker {
            sentence: tokens.join(" "),
            marker: marker.to_string(),
        };
        let subject_index = subject_index.ok_or_else(|| missing(SUBJECT_MARKER))?;
        let verb_index = verb_index.ok_or_else(|| missing(VERB_MARKER))?;

        if let Some(first) = words.first_mut() {
            let mut chars = first.chars();
            if let Some(c) = chars.next() {
                *first = c.to_uppercase().chain(chars).collect();
            }
        }
        Ok(Processed {
            words,
            subject_index,
            verb_index,
        })
    }

    pub fn verb(&self) -> &str {
        &self.words[self.verb_index]
    }

    ///The words up to and including the critical verb.
    pub fn incomplete(&self) -> String {
        self.words[..=self.verb_index].join(" ")
    }

    pub fn completed(&self) -> String {
        format!("{}.", self.words.join(" "))
    }

    ///Whether `other` is the same sentence except for the critical verb.
    pub fn is_minimal_pair(&self, other: &Processed) -> bool {
        self.verb_index == other.verb_index
            && self.words.len() == other.words.len()
            && self
                .words
                .iter()
                .zip(other.words.iter())
                .enumerate()
                .all(|(i, (a, b))| i == self.verb_index || a == b)
    }
}

///One line of the dataset: an agreeing and a disagreeing sentence of the same condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRow {
    ///The agreeing sentence up to the critical verb.
    pub agreement: String,
    ///The disagreeing sentence up to the critical verb.
    pub disagreement: String,
    pub correct_verb: String,
    pub incorrect_verb: String,
    pub subject_index: usize,
    pub verb_index: usize,
    pub numbers: Condition,
    ///The full agreeing sentence.
    pub completed: String,
}

impl DatasetRow {
    pub fn new(agreement: &Processed, disagreement: &Processed, numbers: Condition) -> Self {
        DatasetRow {
            agreement: agreement.incomplete(),
            disagreement: disagreement.incomplete(),
            correct_verb: agreement.verb().to_string(),
            incorrect_verb: disagreement.verb().to_string(),
            subject_index: agreement.subject_index,
            verb_index: agreement.verb_index,
            numbers,
            completed: agreement.completed(),
        }
    }

    pub fn header(tracked: usize) -> Vec<String> {
        let mut header: Vec<String> = [
            "agreement",
            "disagreement",
            "correct_verb",
            "incorrect_verb",
            "subject_index",
            "verb_index",
        ]
        .iter()
        .map(|x| x.to_string())
        .collect();
        header.extend((1..=tracked).map(|i| format!("number{i}")));
        header.push("completed".to_string());
        header
    }

    pub fn record(&self) -> Vec<String> {
        let mut record = vec![
            self.agreement.clone(),
            self.disagreement.clone(),
            self.correct_verb.clone(),
            self.incorrect_verb.clone(),
            self.subject_index.to_string(),
            self.verb_index.to_string(),
        ];
        record.extend(self.numbers.numbers().iter().map(|n| n.label().to_string()));
        record.push(self.completed.clone());
        record
    }
}

///A balanced dataset for one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    tracked: usize,
    rows: Vec<DatasetRow>,
    summary: RunSummary,
}

impl Dataset {
    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn tracked(&self) -> usize {
        self.tracked
    }

    ///Rows of one condition, in dataset order.
    pub fn rows_for<'a>(&'a self, condition: &'a Condition) -> impl Iterator<Item = &'a DatasetRow> {
        self.rows.iter().filter(move |r| &r.numbers == condition)
    }

    pub fn write_tsv_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);
        writer.write_record(DatasetRow::header(self.tracked))?;
        for row in self.rows.iter() {
            writer.write_record(row.record())?;
        }
        writer.flush()?;
        Ok(())
    }

    ///Writes the dataset as tab-separated text. The file only appears once it is complete.
    pub fn write_tsv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let file = tempfile::NamedTempFile::new_in(dir)?;
        self.write_tsv_to(file.as_file())?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| e.error)?;
        info!(path = %path.display(), rows = self.rows.len(), "wrote dataset");
        Ok(())
    }
}

///Pairs, balances and post-processes the classified sentences of every condition of `spec`.
///
///The i-th agreeing sentence of a condition is paired with its i-th disagreeing sentence, and
///pairs that differ anywhere but the critical verb are dropped. Every condition then contributes
///the same number of pairs: `requested` if given, but never more than the condition with the
///fewest pairs has.
pub fn finalize<R: Rng + ?Sized>(
    spec: &GrammarSpec,
    mut pools: BTreeMap<Condition, Pools<'_>>,
    requested: Option<usize>,
    mut summary: RunSummary,
    rng: &mut R,
) -> Result<Dataset> {
    let mut paired = Vec::with_capacity(spec.conditions().len());
    for condition in spec.conditions() {
        let Pools {
            agreement,
            disagreement,
        } = pools.remove(condition).unwrap_or_default();
        summary.agreement += agreement.len();
        summary.disagreement += disagreement.len();
        summary.unpaired += agreement.len().abs_diff(disagreement.len());

        let mut pairs = Vec::with_capacity(agreement.len().min(disagreement.len()));
        for (agreement, disagreement) in agreement.iter().zip(disagreement.iter()) {
            let agreement = Processed::new(agreement)?;
            let disagreement = Processed::new(disagreement)?;
            if agreement.is_minimal_pair(&disagreement) {
                pairs.push((agreement, disagreement));
            } else {
                summary.misaligned += 1;
                debug!(
                    agreement = %agreement.completed(),
                    disagreement = %disagreement.completed(),
                    "dropped pair that differs outside the critical verb"
                );
            }
        }
        if pairs.is_empty() {
            return Err(GenerationError::ImbalancedTemplate {
                condition: condition.to_string(),
            });
        }
        debug!(%condition, pairs = pairs.len(), "paired sentences");
        paired.push((condition, pairs));
    }
    if summary.misaligned > 0 {
        warn!(
            misaligned = summary.misaligned,
            "dropped pairs that are not minimal pairs"
        );
    }

    let available = paired.iter().map(|(_, p)| p.len()).min().unwrap_or(0);
    let per_condition = requested.map_or(available, |r| r.min(available));
    if requested.is_some_and(|r| r > available) {
        warn!(
            requested = ?requested,
            available, "fewer pairs than requested for some condition"
        );
    }

    let mut rows = Vec::with_capacity(per_condition * paired.len());
    for (condition, pairs) in paired {
        let mut keep = rand::seq::index::sample(rng, pairs.len(), per_condition).into_vec();
        keep.sort_unstable();
        for i in keep {
            let (agreement, disagreement) = &pairs[i];
            rows.push(DatasetRow::new(agreement, disagreement, condition.clone()));
        }
    }
    summary.rows_per_condition = per_condition;
    Ok(Dataset {
        tracked: spec.template().tracked,
        rows,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::{LexicalCategory, SUBJECT_NOUNS, VERBS_TRANSITIVE, Vocabulary};
    use crate::{Number, templates};
    use anyhow::Result;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn spec() -> Result<GrammarSpec> {
        let numbered = |name: &str, sg: &str, pl: &str| {
            LexicalCategory::new(
                name,
                vec![
                    ("singular".to_string(), vec![sg.to_string()]),
                    ("plural".to_string(), vec![pl.to_string()]),
                ],
            )
        };
        let vocabulary = Vocabulary::new()
            .with(numbered(SUBJECT_NOUNS, "cat", "cats")?)?
            .with(numbered(VERBS_TRANSITIVE, "sleeps", "sleep")?)?;
        Ok(templates::build("simple", &vocabulary)?)
    }

    fn pools<'a>(agreement: &[&[&'a str]], disagreement: &[&[&'a str]]) -> Pools<'a> {
        Pools {
            agreement: agreement.iter().map(|x| x.to_vec()).collect(),
            disagreement: disagreement.iter().map(|x| x.to_vec()).collect(),
        }
    }

    #[test]
    fn post_processing() -> Result<()> {
        let p = Processed::new(&[
            "de vrouw",
            "*",
            "bij",
            "de tafels",
            "bewondert",
            "^",
            "de persoon",
        ])?;
        assert_eq!(
            p.words,
            ["De", "vrouw", "bij", "de", "tafels", "bewondert", "de", "persoon"]
        );
        assert_eq!((p.subject_index, p.verb_index), (1, 5));
        assert_eq!(p.verb(), "bewondert");
        assert_eq!(p.incomplete(), "De vrouw bij de tafels bewondert");
        assert_eq!(p.completed(), "De vrouw bij de tafels bewondert de persoon.");

        let q = Processed::new(&["ëlla", "*", "slaapt", "^"])?;
        assert_eq!(q.words[0], "Ëlla");

        assert!(matches!(
            Processed::new(&["cat", "sleeps", "^"]),
            Err(GenerationError::MissingMarker { marker, .. }) if marker == SUBJECT_MARKER
        ));
        assert!(matches!(
            Processed::new(&["cat", "*", "sleeps"]),
            Err(GenerationError::MissingMarker { marker, .. }) if marker == VERB_MARKER
        ));
        assert!(matches!(
            Processed::new(&["^", "cat", "*"]),
            Err(GenerationError::MarkerWithoutWord { marker, .. }) if marker == VERB_MARKER
        ));
        assert!(matches!(
            Processed::new(&["*", "cat", "sleeps", "^"]),
            Err(GenerationError::MarkerWithoutWord { marker, .. }) if marker == SUBJECT_MARKER
        ));
        Ok(())
    }

    #[test]
    fn minimal_pairs() -> Result<()> {
        let a = Processed::new(&["cat", "*", "sleeps", "^", "now"])?;
        assert!(a.is_minimal_pair(&Processed::new(&["cat", "*", "sleep", "^", "now"])?));
        assert!(!a.is_minimal_pair(&Processed::new(&["cat", "*", "sleep", "^", "then"])?));
        assert!(!a.is_minimal_pair(&Processed::new(&["the cat", "*", "sleep", "^", "now"])?));
        Ok(())
    }

    #[test]
    fn rows_and_header() -> Result<()> {
        let a = Processed::new(&["cat", "*", "sleeps", "^"])?;
        let d = Processed::new(&["cat", "*", "sleep", "^"])?;
        let row = DatasetRow::new(&a, &d, Condition::new(&[Number::Singular])?);
        assert_eq!(
            row.record(),
            ["Cat sleeps", "Cat sleep", "sleeps", "sleep", "0", "1", "singular", "Cat sleeps."]
        );
        assert_eq!(
            DatasetRow::header(3)[6..],
            ["number1", "number2", "number3", "completed"]
        );
        Ok(())
    }

    #[test]
    fn balancing() -> Result<()> {
        let spec = spec()?;
        let sg = Condition::new(&[Number::Singular])?;
        let pl = Condition::new(&[Number::Plural])?;
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let mut classified = BTreeMap::new();
        classified.insert(
            sg.clone(),
            pools(
                &[&["cat", "*", "sleeps", "^"], &["cat", "*", "sleeps", "^", "x"]],
                &[&["cat", "*", "sleep", "^"]],
            ),
        );
        assert!(matches!(
            finalize(&spec, classified.clone(), None, RunSummary::default(), &mut rng),
            Err(GenerationError::ImbalancedTemplate { condition }) if condition == "pl"
        ));

        classified.insert(
            pl.clone(),
            pools(
                &[&["cats", "*", "sleep", "^"], &["cats", "*", "sleep", "^"]],
                &[&["cats", "*", "sleeps", "^"], &["cats", "*", "sleeps", "^"]],
            ),
        );
        let dataset = finalize(&spec, classified, Some(600), RunSummary::default(), &mut rng)?;
        let summary = dataset.summary();
        assert_eq!(summary.rows_per_condition, 1);
        assert_eq!(summary.unpaired, 1);
        assert_eq!((summary.agreement, summary.disagreement), (4, 3));
        assert_eq!(dataset.rows_for(&sg).count(), 1);
        assert_eq!(dataset.rows_for(&pl).count(), 1);
        assert_eq!(dataset.rows()[0].completed, "Cat sleeps.");
        assert_eq!(dataset.rows()[1].agreement, "Cats sleep");
        assert_eq!(dataset.rows()[1].incorrect_verb, "sleeps");
        Ok(())
    }

    #[test]
    fn non_minimal_pairs_are_dropped() -> Result<()> {
        let spec = spec()?;
        let sg = Condition::new(&[Number::Singular])?;
        let pl = Condition::new(&[Number::Plural])?;
        let mut classified = BTreeMap::new();
        classified.insert(
            sg.clone(),
            pools(
                &[
                    &["the cat", "*", "sees", "^", "me"],
                    &["a cat", "*", "sees", "^", "me"],
                    &["a cat", "*", "knows", "^", "me"],
                ],
                &[
                    &["the cat", "*", "see", "^", "me"],
                    &["the dog", "*", "see", "^", "me"],
                    &["a cat", "*", "know", "^", "you"],
                ],
            ),
        );
        classified.insert(
            pl.clone(),
            pools(
                &[&["cats", "*", "see", "^", "me"]],
                &[&["cats", "*", "sees", "^", "me"]],
            ),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let dataset = finalize(&spec, classified.clone(), None, RunSummary::default(), &mut rng)?;
        assert_eq!(dataset.summary().misaligned, 2);
        assert_eq!(dataset.summary().rows_per_condition, 1);
        let row = dataset.rows_for(&sg).next();
        assert_eq!(row.map(|r| r.disagreement.as_str()), Some("The cat see"));
        for row in dataset.rows() {
            let agreement: Vec<&str> = row.agreement.split(' ').collect();
            let disagreement: Vec<&str> = row.disagreement.split(' ').collect();
            assert_eq!(agreement[..row.verb_index], disagreement[..row.verb_index]);
        }

        //A condition left without any minimal pair cannot be balanced.
        classified.insert(
            pl,
            pools(
                &[&["cats", "*", "see", "^", "me"]],
                &[&["dogs", "*", "sees", "^", "me"]],
            ),
        );
        assert!(matches!(
            finalize(&spec, classified, None, RunSummary::default(), &mut rng),
            Err(GenerationError::ImbalancedTemplate { condition }) if condition == "pl"
        ));
        Ok(())
    }

    #[test]
    fn atomic_write() -> Result<()> {
        let spec = spec()?;
        let mut classified = BTreeMap::new();
        for (numbers, agreement, disagreement) in [
            (Number::Singular, ["cat", "*", "sleeps", "^"], ["cat", "*", "sleep", "^"]),
            (Number::Plural, ["cats", "*", "sleep", "^"], ["cats", "*", "sleeps", "^"]),
        ] {
            classified.insert(
                Condition::new(&[numbers])?,
                pools(&[&agreement], &[&disagreement]),
            );
        }
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let dataset = finalize(&spec, classified, None, RunSummary::default(), &mut rng)?;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tasks").join("simple.tsv");
        dataset.write_tsv(&path)?;
        assert_eq!(
            std::fs::read_to_string(&path)?,
            "agreement\tdisagreement\tcorrect_verb\tincorrect_verb\tsubject_index\tverb_index\tnumber1\tcompleted\n\
             Cat sleeps\tCat sleep\tsleeps\tsleep\t0\t1\tsingular\tCat sleeps.\n\
             Cats sleep\tCats sleeps\tsleep\tsleeps\t0\t1\tplural\tCats sleep.\n"
        );

        let blocked = dir.path().join("blocked.tsv");
        std::fs::create_dir(&blocked)?;
        assert!(dataset.write_tsv(&blocked).is_err());
        let entries: Vec<_> = std::fs::read_dir(dir.path())?
            .map(|e| e.map(|e| e.file_name()))
            .collect::<std::result::Result<_, _>>()?;
        assert_eq!(entries.len(), 2);
        Ok(())
    }
}
