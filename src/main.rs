//! Coffee chat pairing CLI
//!
//! Reads this round's roster, avoids every pairing already on file, writes
//! the new round and asks the operator to accept, retry or abort.

use std::fs::{self, File};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use coffee_chat::{
    consolidate, engine_for_attempt, read_pairings_dir, resolve_parity, Config, CsvRegistryStore,
    DropParticipant, Error, HistoryRecord, IdentityRegistry, PairingSession, ParityMode,
    ParityResolver, RegistryBackend, RegistryStore, RunReport, SitIn,
};

/// Command-line arguments for coffee-chat
#[derive(Parser, Debug)]
#[command(name = "coffee-chat")]
#[command(about = "Pair up participants for this round of coffee chats")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, global = true, env = "COFFEE_CHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new round of pairings
    Pair {
        /// CSV file containing the participants' names for this round
        participants_filename: PathBuf,

        /// CSV file (filename only) to write the results to, inside the pairings folder
        results_filename: String,

        /// Tie-break seed for the first attempt
        #[arg(long)]
        seed: Option<u64>,

        /// Accept the first generated round without asking
        #[arg(short, long)]
        yes: bool,

        /// Volunteer to sit out when the roster is odd (repeatable)
        #[arg(long = "drop", value_name = "NAME")]
        drop: Vec<String>,

        /// Stand-in who joins when the roster is odd
        #[arg(long, value_name = "NAME", conflicts_with = "drop")]
        sit_in: Option<String>,

        /// Write a JSON run report here once the round is accepted
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List pairings that were repeated across past rounds
    Audit,

    /// Print the participant id registry
    Ids,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config, args.verbose)?;

    match args.command {
        Command::Pair {
            participants_filename,
            results_filename,
            seed,
            yes,
            drop,
            sit_in,
            report,
        } => {
            let seed = seed.or(config.seed);
            let mut resolver = parity_resolver(&config, drop, sit_in)?;
            run_pair(
                config,
                &participants_filename,
                &results_filename,
                seed,
                yes,
                resolver.as_mut(),
                report.as_deref(),
            )
        }
        Command::Audit => run_audit(&config),
        Command::Ids => run_ids(&config),
    }
}

fn init_logging(config: &Config, verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        "coffee_chat=debug"
    } else {
        "coffee_chat=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    match &config.logs_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create logs directory {}", dir.display()))?;
            let file_name = format!(
                "coffee-chat-debug-logs-{}.txt",
                chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
            );
            let file = File::create(dir.join(file_name)).context("Failed to create log file")?;

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
                .init();
        }
    }

    if verbose {
        tracing::debug!("Verbose logging enabled");
    }
    Ok(())
}

fn open_store(config: &Config) -> Result<Box<dyn RegistryStore>> {
    let path = config.registry_path();
    match config.registry_backend {
        RegistryBackend::Csv => Ok(Box::new(CsvRegistryStore::new(path))),
        RegistryBackend::Sqlite => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let store = coffee_chat::SqliteRegistryStore::open(&path)
                .context("Failed to open registry database")?;
            Ok(Box::new(store))
        }
    }
}

fn parity_resolver(
    config: &Config,
    drop: Vec<String>,
    sit_in: Option<String>,
) -> Result<Box<dyn ParityResolver>> {
    if let Some(stand_in) = sit_in {
        return Ok(Box::new(SitIn::new(stand_in)));
    }
    if !drop.is_empty() {
        return Ok(Box::new(DropParticipant::new(drop)));
    }

    let parity = &config.parity;
    let resolver: Box<dyn ParityResolver> = match parity.mode {
        ParityMode::Prompt => Box::new(PromptResolver {
            candidates: parity.candidates.clone(),
        }),
        ParityMode::Drop => Box::new(DropParticipant::new(parity.candidates.clone())),
        ParityMode::SitIn => match &parity.stand_in {
            Some(stand_in) => Box::new(SitIn::new(stand_in.clone())),
            None => bail!("parity mode sit-in requires a stand_in"),
        },
    };
    Ok(resolver)
}

fn run_pair(
    config: Config,
    participants_filename: &Path,
    results_filename: &str,
    seed: Option<u64>,
    yes: bool,
    resolver: &mut dyn ParityResolver,
    report_path: Option<&Path>,
) -> Result<()> {
    let store = open_store(&config)?;
    let mut session = PairingSession::new(config, store, results_filename)
        .context("Failed to open pairing session")?;

    if session.results_exist() {
        bail!(
            "Results file {} already exists, pick another name",
            session.results_path().display()
        );
    }

    let data = session
        .load_data(participants_filename)
        .context("Failed to load participants and pairing history")?;

    if data.participant_names.len() % 2 == 1 {
        warn!("Odd number of participants this round!");
    }
    let participants = match resolve_parity(data.participant_names.clone(), resolver) {
        Ok(participants) => participants,
        Err(Error::Aborted(reason)) => {
            info!("Quitting after not being able to agree on who to skip: {}", reason);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let mut attempt = 0;
    loop {
        let engine = engine_for_attempt(seed, attempt);
        let pairs = session.run_matchmaking(&engine, &participants, &data.constraint_names)?;
        let sanity = session.sanity_check(&pairs, &participants, &data.history)?;
        let written = session.finalize(&pairs)?;

        let report = RunReport::new(
            &session.results_label(),
            engine.edge_order.seed(),
            attempt,
            &pairs,
            &sanity,
        );
        info!("{}", report.summary());
        for (a, b) in &pairs {
            println!("{} & {}", a, b);
        }

        let choice = if yes {
            Choice::Accept
        } else {
            prompt_choice(&written)?
        };

        match choice {
            Choice::Accept => {
                if let Some(path) = report_path {
                    report
                        .write_json(path)
                        .with_context(|| format!("Failed to write report {}", path.display()))?;
                }
                info!("Finished matchmaking, results saved to {}", written.display());
                return Ok(());
            }
            Choice::Retry => {
                session.discard()?;
                attempt += 1;
                info!("Restarting matchmaking (attempt {})", attempt + 1);
            }
            Choice::Abort => {
                session.discard()?;
                info!("Exiting without saving a round");
                return Ok(());
            }
        }
    }
}

fn run_audit(config: &Config) -> Result<()> {
    let files = read_pairings_dir(&config.pairings_dir).with_context(|| {
        format!("Failed to read pairings from {}", config.pairings_dir.display())
    })?;

    let mut registry = IdentityRegistry::new();
    let mut records = Vec::new();
    for file in files.iter().filter(|f| !config.is_constraints_file(&f.source)) {
        let ids = registry.assign_ids(file.pairs.iter().flat_map(|(a, b)| [a, b]));
        let pairs = file.pairs.iter().map(|(a, b)| (ids[a], ids[b])).collect();
        records.push(HistoryRecord::new(file.source.clone(), pairs));
    }

    let history = consolidate(&records);
    let repeats = history.repeats();
    println!(
        "{} rounds, {} distinct pairings, {} repeated",
        records.len(),
        history.len(),
        repeats.len()
    );
    for repeat in repeats {
        let names = registry.resolve_names(&[repeat.pair.low(), repeat.pair.high()])?;
        println!("{} & {}: {}", names[0], names[1], repeat.sources.join(", "));
    }
    Ok(())
}

fn run_ids(config: &Config) -> Result<()> {
    let registry = open_store(config)?
        .load()
        .context("Failed to load participant registry")?;
    for (name, id) in registry.entries() {
        println!("{}\t{}", id, name);
    }
    Ok(())
}

// ============================================================================
// INTERACTIVE PROMPTS
// ============================================================================

enum Choice {
    Accept,
    Retry,
    Abort,
}

fn read_answer(prompt: &str) -> io::Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn prompt_choice(results: &Path) -> Result<Choice> {
    let prompt = format!(
        "Check over the file {}. (Y/y) to finish, (N/n) to restart, Q to exit.\n",
        results.display()
    );
    loop {
        match read_answer(&prompt)?.as_deref() {
            Some("Y") | Some("y") => return Ok(Choice::Accept),
            Some("N") | Some("n") => return Ok(Choice::Retry),
            Some("Q") | Some("q") | None => return Ok(Choice::Abort),
            _ => continue,
        }
    }
}

/// Ask on the terminal who sits out
struct PromptResolver {
    candidates: Vec<String>,
}

impl ParityResolver for PromptResolver {
    fn resolve(&mut self, mut roster: Vec<String>) -> coffee_chat::Result<Vec<String>> {
        let present: Vec<String> = self
            .candidates
            .iter()
            .filter(|c| roster.contains(c))
            .cloned()
            .collect();

        let mut prompt = String::from("Odd number of participants! Who are we leaving out?\n");
        for (i, name) in present.iter().enumerate() {
            prompt.push_str(&format!("  ({}) {}\n", i + 1, name));
        }
        prompt.push_str("Enter a number or a participant's name, Q to exit.\n");

        loop {
            let answer = match read_answer(&prompt)? {
                None => return Err(Error::Aborted("no answer".to_string())),
                Some(answer) => answer,
            };
            if answer == "Q" || answer == "q" {
                return Err(Error::Aborted("operator quit".to_string()));
            }

            let chosen = match answer.parse::<usize>() {
                Ok(n) if n >= 1 && n <= present.len() => Some(present[n - 1].clone()),
                _ => roster.iter().find(|name| **name == answer).cloned(),
            };

            if let Some(name) = chosen {
                roster.retain(|n| *n != name);
                info!("{} sits out this round", name);
                return Ok(roster);
            }
        }
    }
}
