//! Foundry CLI
//!
//! Generates CBT exercises through the draft, review, synthesize, route
//! workflow with human sign-off.
//!
//! Usage:
//!   foundry run "a worry-time exercise for generalized anxiety"
//!   foundry threads
//!   foundry show <thread_id>
//!   foundry resume <thread_id> --approve --feedback "Looks good"
//!   foundry models

mod interactive;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use foundry_agent::config::FoundryFileConfig;
use foundry_agent::{llm, AgentSet, CallPolicy, RoleRegistry};
use foundry_orchestrator::{
    AutoApproveHandler, CheckpointStore, DecisionHandler, EngineConfig, HumanDecision,
    ThreadRecord, ThreadStatus, WorkflowEngine,
};

use interactive::{print_record, InteractiveHandler};

#[derive(Parser)]
#[command(name = "foundry")]
#[command(about = "Multi-agent CBT exercise generation with human sign-off")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Checkpoint database path
    #[arg(long, env = "FOUNDRY_DB", global = true)]
    db: Option<PathBuf>,

    /// Ollama server URL
    #[arg(long, env = "FOUNDRY_OLLAMA_URL", global = true)]
    ollama_url: Option<String>,

    /// Model for every role (overrides config)
    #[arg(short = 'm', long, env = "FOUNDRY_MODEL", global = true)]
    model: Option<String>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace). Default is warn.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an exercise for an intent
    Run {
        /// What the exercise should address
        intent: String,

        /// Auto-approve clean drafts instead of prompting
        #[arg(long)]
        non_interactive: bool,

        /// Use canned responses instead of a model
        #[arg(long)]
        offline: bool,

        /// Write the finalized draft to this Markdown file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// List stored threads, most recent first
    Threads,
    /// Show one thread
    Show {
        /// Thread id
        thread_id: String,
    },
    /// Decide on a halted thread
    Resume {
        /// Thread id
        thread_id: String,

        /// Approve the draft
        #[arg(long, conflicts_with = "reject", required_unless_present = "reject")]
        approve: bool,

        /// Reject the draft
        #[arg(long)]
        reject: bool,

        /// Note recorded with the decision
        #[arg(long, default_value = "")]
        feedback: String,

        /// File holding a replacement draft
        #[arg(long)]
        edited_draft: Option<PathBuf>,

        /// Use canned responses instead of a model
        #[arg(long)]
        offline: bool,
    },
    /// List models on the Ollama server
    Models,
}

/// Initialize tracing with the given verbosity level
///
/// - 0: warn (default)
/// - 1: info (-v)
/// - 2: debug (-vv)
/// - 3+: trace (-vvv)
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    // Allow RUST_LOG to override if set
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Settings resolved from flags, environment and `.foundry.toml`
struct Settings {
    file: FoundryFileConfig,
    ollama_url: String,
    model: Option<String>,
    db: Option<PathBuf>,
}

impl Settings {
    fn resolve(cli: &Cli) -> Result<Self> {
        let file = FoundryFileConfig::load()?;
        let ollama_url = cli.ollama_url.clone().unwrap_or_else(|| file.llm.url.clone());
        let db = match &cli.db {
            Some(path) => Some(path.clone()),
            None => file.engine.db_path()?,
        };

        Ok(Self {
            file,
            ollama_url,
            model: cli.model.clone(),
            db,
        })
    }

    fn agents(&self, offline: bool) -> AgentSet {
        let mut registry = RoleRegistry::from_config(&self.file);
        if let Some(model) = &self.model {
            registry.set_all_models(model);
        }
        let policy = CallPolicy::from(&self.file.agents);

        if offline {
            AgentSet::offline(&registry, policy)
        } else {
            AgentSet::ollama(&self.ollama_url, &registry, policy)
        }
    }

    fn store(&self) -> Result<Arc<dyn CheckpointStore>> {
        open_store(self.db.as_deref())
    }

    /// Engine over the configured store, with stored threads loaded
    async fn engine(&self, offline: bool) -> Result<WorkflowEngine> {
        let engine = WorkflowEngine::new(
            self.agents(offline),
            self.store()?,
            EngineConfig::from_file_config(&self.file),
        );
        engine
            .recover()
            .await
            .context("Failed to load stored threads")?;
        Ok(engine)
    }
}

#[cfg(feature = "persistence")]
fn open_store(path: Option<&Path>) -> Result<Arc<dyn CheckpointStore>> {
    let db = match path {
        Some(path) => foundry_orchestrator::Database::open_at(path)?,
        None => foundry_orchestrator::Database::open()?,
    };
    Ok(Arc::new(db))
}

#[cfg(not(feature = "persistence"))]
fn open_store(path: Option<&Path>) -> Result<Arc<dyn CheckpointStore>> {
    if path.is_some() {
        tracing::warn!("Built without persistence, --db is ignored");
    }
    tracing::warn!("Threads are kept in memory and lost on exit");
    Ok(Arc::new(foundry_orchestrator::MemoryCheckpointStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI first to get verbosity before initializing tracing
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::resolve(&cli)?;

    match cli.command {
        Commands::Run {
            intent,
            non_interactive,
            offline,
            output,
        } => run(&settings, &intent, non_interactive, offline, output.as_deref()).await,
        Commands::Threads => list_threads(&settings).await,
        Commands::Show { thread_id } => show(&settings, &thread_id).await,
        Commands::Resume {
            thread_id,
            approve,
            reject: _,
            feedback,
            edited_draft,
            offline,
        } => {
            let mut decision = if approve {
                HumanDecision::approve()
            } else {
                HumanDecision::reject()
            }
            .with_feedback(feedback);

            if let Some(path) = edited_draft {
                let draft = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                decision = decision.with_edited_draft(draft);
            }

            resume(&settings, &thread_id, decision, offline).await
        }
        Commands::Models => list_models(&settings).await,
    }
}

async fn run(
    settings: &Settings,
    intent: &str,
    non_interactive: bool,
    offline: bool,
    output: Option<&Path>,
) -> Result<()> {
    let engine = settings.engine(offline).await?;

    // Fall back to auto-approve when nobody is at the terminal
    let handler: Box<dyn DecisionHandler> =
        if non_interactive || !atty::is(atty::Stream::Stdin) {
            Box::new(AutoApproveHandler)
        } else {
            Box::new(InteractiveHandler)
        };

    let thread_id = engine.invoke(intent).await?;
    println!("Thread: {}", thread_id);

    let record = engine.drive_to_end(&thread_id, handler.as_ref()).await?;
    finish(&record, output)
}

async fn resume(
    settings: &Settings,
    thread_id: &str,
    decision: HumanDecision,
    offline: bool,
) -> Result<()> {
    let engine = settings.engine(offline).await?;

    engine.resume(thread_id, decision).await?;
    let record = engine.wait_for_settled(thread_id).await?;
    finish(&record, None)
}

/// Report where a thread ended up
fn finish(record: &ThreadRecord, output: Option<&Path>) -> Result<()> {
    println!("\nStatus: {}", record.status);
    println!(
        "Scores: safety {}/10, clinical {}/10 after {} draft(s)",
        record.state.scores.safety, record.state.scores.clinical, record.state.iteration_count
    );

    match record.status {
        ThreadStatus::Completed => {
            println!("\n{}", record.state.draft);
            if let Some(path) = output {
                std::fs::write(path, &record.state.draft)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("\nSaved to {}", path.display());
            }
        }
        ThreadStatus::Halted => {
            if let Some(error) = &record.state.error {
                println!("Error: {}", error);
            }
            println!(
                "\nThread is waiting for a decision. Resume it with:\n  foundry resume {} --approve|--reject",
                record.thread_id
            );
        }
        ThreadStatus::Error => {
            bail!(
                "Thread {} failed: {}",
                record.thread_id,
                record.state.error.as_deref().unwrap_or("unknown error")
            );
        }
        _ => {}
    }

    Ok(())
}

async fn list_threads(settings: &Settings) -> Result<()> {
    let threads = settings
        .store()?
        .list()
        .await
        .context("Failed to list threads")?;

    if threads.is_empty() {
        println!("No threads yet. Start one with: foundry run \"<intent>\"");
        return Ok(());
    }

    println!(
        "{:<36}  {:<9}  {:>6}  {:>8}  {:<16}  INTENT",
        "THREAD", "STATUS", "SAFETY", "CLINICAL", "UPDATED"
    );
    for record in threads {
        let summary = record.summary();
        println!(
            "{:<36}  {:<9}  {:>6}  {:>8}  {:<16}  {}",
            summary.thread_id,
            summary.status,
            summary.scores.safety,
            summary.scores.clinical,
            summary.last_update.format("%Y-%m-%d %H:%M"),
            summary.user_intent
        );
    }

    Ok(())
}

async fn show(settings: &Settings, thread_id: &str) -> Result<()> {
    let record = settings
        .store()?
        .load(thread_id)
        .await
        .context("Failed to load thread")?;

    match record {
        Some(record) => {
            print_record(&record);
            Ok(())
        }
        None => bail!("Thread '{}' not found. Use 'foundry threads' to list threads.", thread_id),
    }
}

async fn list_models(settings: &Settings) -> Result<()> {
    let models = llm::list_models(&settings.ollama_url).await?;

    if models.is_empty() {
        println!("No models found on {}", settings.ollama_url);
        return Ok(());
    }

    println!("Available models on {}:\n", settings.ollama_url);
    for model in models {
        let size_gb = model.size as f64 / 1_000_000_000.0;
        println!("  {:<40} {:>6.1} GB  {}", model.name, size_gb, model.modified_at);
    }

    Ok(())
}
