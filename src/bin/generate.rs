use std::path::PathBuf;

use agreement_grammar::{
    AmbiguityPolicy, CancellationToken, GenerationConfig, Vocabulary, generate_dataset, templates,
};
use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Parser};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_ROWS: usize = 600;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate subject-verb agreement datasets", long_about = None)]
struct Cli {
    /// Template to generate
    #[arg(short, long, required_unless_present = "list_templates")]
    template: Option<String>,

    /// Print the registered templates and exit
    #[arg(long)]
    list_templates: bool,

    /// Directory holding one CSV file per vocabulary category
    #[arg(long, value_name = "DIR", default_value = "vocabulary")]
    vocabulary: PathBuf,

    /// Directory the dataset is written to, as <template>.tsv
    #[arg(short, long, value_name = "DIR", default_value = "tasks")]
    output: PathBuf,

    /// Rows per condition [default: 600]
    #[arg(long, value_name = "N")]
    rows: Option<usize>,

    /// Maximum number of sentences to enumerate
    #[arg(long, value_name = "N")]
    max_sentences: Option<usize>,

    /// Sample at most N rows of a vocabulary category (repeat flag)
    #[arg(long = "cap", value_name = "CATEGORY=N", value_parser = parse_cap)]
    caps: Vec<(String, usize)>,

    /// Seed for vocabulary and pair sampling
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Limit Rayon worker threads
    #[arg(long, value_name = "N")]
    threads: Option<usize>,

    /// Fail when the enumeration cap is reached
    #[arg(long)]
    strict_cap: bool,

    /// How to treat sentences accepted by several variants
    #[arg(long, value_enum)]
    ambiguity: Option<Ambiguity>,

    /// JSON file with a generation config; flags take precedence
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, action = ArgAction::Count)]
    quiet: u8,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Ambiguity {
    FirstMatch,
    Report,
    Discard,
}

impl From<Ambiguity> for AmbiguityPolicy {
    fn from(value: Ambiguity) -> Self {
        match value {
            Ambiguity::FirstMatch => AmbiguityPolicy::FirstMatch,
            Ambiguity::Report => AmbiguityPolicy::Report,
            Ambiguity::Discard => AmbiguityPolicy::Discard,
        }
    }
}

fn parse_cap(s: &str) -> Result<(String, usize)> {
    let (category, n) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected CATEGORY=N, got `{s}`"))?;
    Ok((category.trim().to_string(), n.trim().parse()?))
}

fn init_logging(verbose: u8, quiet: u8) {
    let level = match i16::from(verbose) - i16::from(quiet) {
        i16::MIN..=-2 => "error",
        -1 => "warn",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<GenerationConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => GenerationConfig {
            rows_per_condition: Some(DEFAULT_ROWS),
            ..Default::default()
        },
    };
    if let Some(rows) = cli.rows {
        config.rows_per_condition = Some(rows);
    }
    if let Some(max_sentences) = cli.max_sentences {
        config.max_sentences = max_sentences;
    }
    if let Some(threads) = cli.threads {
        config.threads = Some(threads);
    }
    if let Some(ambiguity) = cli.ambiguity {
        config.ambiguity = ambiguity.into();
    }
    config.strict_cap |= cli.strict_cap;
    config.sample_caps.extend(cli.caps.iter().cloned());
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if cli.list_templates {
        for template in templates::TEMPLATES.iter() {
            println!("{}\t{} tracked", template.name, template.tracked);
        }
        return Ok(());
    }
    let template = cli
        .template
        .as_deref()
        .ok_or_else(|| anyhow!("no template given"))?;
    let config = load_config(&cli)?;

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let vocabulary = Vocabulary::load_dir(&cli.vocabulary, &config.sample_caps, &mut rng)
        .with_context(|| format!("loading vocabulary from {}", cli.vocabulary.display()))?;

    let dataset = generate_dataset(
        template,
        &vocabulary,
        &config,
        &CancellationToken::new(),
        &mut rng,
    )?;
    let path = cli.output.join(format!("{template}.tsv"));
    dataset.write_tsv(&path)?;
    info!(path = %path.display(), "done");

    println!("{}", serde_json::to_string_pretty(dataset.summary())?);
    Ok(())
}
