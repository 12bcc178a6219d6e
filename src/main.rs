use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use catechist::bank::{self, BankError};
use catechist::question::{Difficulty, Question, TimerDefaults, Violation};
use catechist::rewrite;
use catechist::serve::{self, ServeConfig};

#[derive(Parser)]
#[command(name = "catechist", version, about = "Question bank maintenance for the heretical game")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge an expanded question pack into the main bank; existing ids win
    Merge {
        /// Bank file that receives the merge
        #[arg(long)]
        base: PathBuf,
        /// Pack whose new questions are appended
        #[arg(long)]
        incoming: PathBuf,
    },
    /// Append a batch of questions from a JSON array file to one difficulty
    Add {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, value_enum)]
        difficulty: DifficultyArg,
        /// JSON file holding an array of questions
        batch: PathBuf,
        /// Refuse the whole batch when an id collides with an existing one
        #[arg(long)]
        strict: bool,
    },
    /// Fill in the per-difficulty countdown for questions that have none
    FillTimers {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value_t = 30)]
        easy: u32,
        #[arg(long, default_value_t = 25)]
        medium: u32,
        #[arg(long, default_value_t = 20)]
        hard: u32,
    },
    /// Print per-difficulty question counts
    Count {
        #[arg(long)]
        file: PathBuf,
    },
    /// Shuffle the answer options of every question
    Shuffle {
        #[arg(long)]
        file: PathBuf,
        /// Seed for a reproducible shuffle
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Rewrite plain question stems with varied phrasings
    Refine {
        #[arg(long)]
        file: PathBuf,
        /// Seed for reproducible phrasing picks
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run the strict schema checks and list every violation
    Check {
        #[arg(long)]
        file: PathBuf,
    },
    /// Serve the game directory over HTTP for a local preview
    Serve {
        #[arg(long, default_value = "public")]
        root: PathBuf,
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DifficultyArg {
    Easy,
    Medium,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Medium => Difficulty::Medium,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run(Cli::parse()).await {
        error!("{e:#}");
        std::process::exit(1)
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Merge { base, incoming } => merge(&base, &incoming),
        Command::Add {
            file,
            difficulty,
            batch,
            strict,
        } => add(&file, difficulty.into(), &batch, strict),
        Command::FillTimers {
            file,
            easy,
            medium,
            hard,
        } => fill_timers(&file, TimerDefaults { easy, medium, hard }),
        Command::Count { file } => count(&file),
        Command::Shuffle { file, seed } => shuffle(&file, seed),
        Command::Refine { file, seed } => refine(&file, seed),
        Command::Check { file } => check(&file),
        Command::Serve { root, port } => serve::run(ServeConfig { root, port }).await,
    }
}

fn merge(base: &Path, incoming: &Path) -> Result<()> {
    let pack = bank::load(incoming)
        .with_context(|| format!("Failed to load the incoming pack {}", incoming.display()))?;

    let report = bank::update(base, |set| Ok(set.merge_from(pack)))
        .with_context(|| format!("Failed to merge into {}", base.display()))?;

    for (difficulty, outcome) in report.outcomes() {
        info!(
            "{difficulty}: {} added, {} duplicates dropped",
            outcome.added, outcome.dropped
        );
    }
    for name in &report.aux_copied {
        info!("Copied auxiliary collection {name}");
    }
    if report.dropped() > 0 {
        warn!(
            "Dropped {} incoming duplicates, existing entries kept",
            report.dropped()
        );
    }
    info!("Merged {} new questions into {}", report.added(), base.display());
    Ok(())
}

fn add(file: &Path, difficulty: Difficulty, batch: &Path, strict: bool) -> Result<()> {
    let questions = load_batch(batch)?;
    let count = questions.len();

    let total = bank::update(file, |set| {
        if strict {
            let conflicts = set.conflicting_ids(difficulty, &questions);
            if !conflicts.is_empty() {
                let violations = conflicts
                    .into_iter()
                    .map(|id| Violation::DuplicateId { difficulty, id })
                    .collect();
                return Err(BankError::SchemaViolation(violations));
            }
        }
        set.append(difficulty, questions);
        Ok(set.difficulty(difficulty).len())
    })
    .with_context(|| format!("Failed to add questions to {}", file.display()))?;

    info!("Added {count} {difficulty} questions (now {total} total)");
    Ok(())
}

fn fill_timers(file: &Path, defaults: TimerDefaults) -> Result<()> {
    let (filled, counts) = bank::update(file, |set| {
        let filled = set.fill_time_limits(&defaults);
        Ok((filled, set.counts()))
    })
    .with_context(|| format!("Failed to fill timers in {}", file.display()))?;

    info!("Filled {filled} missing time limits in {}", file.display());
    for (difficulty, len) in counts {
        info!(
            "{difficulty}: {len} questions, default {}s",
            defaults.for_difficulty(difficulty)
        );
    }
    Ok(())
}

fn count(file: &Path) -> Result<()> {
    let set =
        bank::load(file).with_context(|| format!("Failed to load {}", file.display()))?;

    let mut total = 0;
    for (difficulty, len) in set.counts() {
        println!("{difficulty}: {len} questions");
        total += len;
    }
    println!("total: {total} questions");
    Ok(())
}

fn shuffle(file: &Path, seed: Option<u64>) -> Result<()> {
    let shuffled = bank::update(file, |set| {
        let mut rng = rewrite::rng_from(seed);
        Ok(rewrite::shuffle_options(set, &mut rng))
    })
    .with_context(|| format!("Failed to shuffle options in {}", file.display()))?;

    info!("Shuffled options for {shuffled} questions in {}", file.display());
    Ok(())
}

fn refine(file: &Path, seed: Option<u64>) -> Result<()> {
    let rewritten = bank::update(file, |set| {
        let mut rng = rewrite::rng_from(seed);
        Ok(rewrite::refine_questions(set, &mut rng))
    })
    .with_context(|| format!("Failed to refine question texts in {}", file.display()))?;

    info!("Refined {rewritten} question texts in {}", file.display());
    Ok(())
}

fn check(file: &Path) -> Result<()> {
    let set =
        bank::load(file).with_context(|| format!("Failed to load {}", file.display()))?;

    let violations = set.validate();
    if violations.is_empty() {
        println!("{}: OK", file.display());
        return Ok(());
    }
    for violation in &violations {
        println!("{violation}");
    }
    bail!("{} schema violations in {}", violations.len(), file.display())
}

fn load_batch(path: &Path) -> Result<Vec<Question>> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open the batch file {}", path.display()))?;
    let mut json_string = String::new();

    file.read_to_string(&mut json_string)
        .with_context(|| format!("Failed to read the batch file {}", path.display()))?;

    let questions: Vec<Question> = serde_json::from_str(&json_string)
        .with_context(|| format!("Failed to parse the batch file {}", path.display()))?;
    Ok(questions)
}
