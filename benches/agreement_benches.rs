use std::collections::BTreeMap;

use agreement_grammar::{
    CancellationToken, Classifier, CompiledGrammar, GenerationConfig, Vocabulary, generate_dataset,
    generation::Sentences, grammars::TOY_AGREEMENT, templates,
};
use lazy_static::lazy_static;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn main() {
    // Run registered benchmarks.
    divan::main();
}

lazy_static! {
    static ref VOCABULARY: Vocabulary = Vocabulary::load_dir(
        concat!(env!("CARGO_MANIFEST_DIR"), "/vocabulary"),
        &BTreeMap::new(),
        &mut ChaCha8Rng::seed_from_u64(0),
    )
    .unwrap();
    static ref CONFIG: GenerationConfig = GenerationConfig::new(1_000_000, Some(600));
}

#[divan::bench]
fn compile_toy_grammar() {
    CompiledGrammar::from_text(divan::black_box(TOY_AGREEMENT)).unwrap();
}

#[divan::bench]
fn enumerate_nounpp() {
    let spec = templates::build("nounpp", &VOCABULARY).unwrap();
    let reference = CompiledGrammar::compile(&spec, spec.reference_key()).unwrap();
    divan::black_box(Sentences::new(reference.grammar(), 1_000_000, 64).count());
}

#[divan::bench(args = ["simple", "nounpp", "that_nounpp"])]
fn classify_template(template: &str) {
    let spec = templates::build(template, &VOCABULARY).unwrap();
    let classifier = Classifier::new(&spec, CONFIG.strategy, CONFIG.ambiguity).unwrap();
    let reference = CompiledGrammar::compile(&spec, spec.reference_key()).unwrap();
    for sentence in Sentences::new(reference.grammar(), 5000, 64) {
        divan::black_box(classifier.classify(&sentence));
    }
}

#[divan::bench]
fn generate_that_nounpp() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    generate_dataset(
        "that_nounpp",
        &VOCABULARY,
        &CONFIG,
        &CancellationToken::new(),
        &mut rng,
    )
    .unwrap();
}
