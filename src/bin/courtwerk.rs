use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use colored::Colorize;
use courtwerk::{
    providers::{openai::OpenAI, scripted::ScriptedProvider},
    select_retriever, CaseIndexes, DebateConfig, DebateEvent, DebateOrchestrator,
    FileTranscriptSink, LLMProvider, Side,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "courtwerk")]
#[command(about = "Run a retrieval-grounded courtroom debate between two counsel and a judge")]
struct Args {
    /// YAML debate configuration; built-in defaults are used without one
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model the judge runs on
    #[arg(long)]
    judge_model: Option<String>,

    /// Model arguing for the motion
    #[arg(long)]
    for_model: Option<String>,

    /// Model arguing against the motion
    #[arg(long)]
    against_model: Option<String>,

    /// Embedding model; passages are ranked lexically without one
    #[arg(long)]
    embedding_model: Option<String>,

    /// Document supporting the motion
    #[arg(long)]
    for_doc: Option<PathBuf>,

    /// Document opposing the motion
    #[arg(long)]
    against_doc: Option<PathBuf>,

    /// Where the transcript is written
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Replaces the configured case description
    #[arg(long)]
    case_description: Option<String>,

    /// Replay responses from a YAML list instead of calling a provider
    #[arg(long)]
    scripted: Option<PathBuf>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,
}

impl Args {
    fn apply(&self, config: &mut DebateConfig) {
        if let Some(model) = &self.judge_model {
            config.models.judge = Some(model.clone());
        }
        if let Some(model) = &self.for_model {
            config.models.for_side = Some(model.clone());
        }
        if let Some(model) = &self.against_model {
            config.models.against_side = Some(model.clone());
        }
        if let Some(model) = &self.embedding_model {
            config.models.embedding = Some(model.clone());
        }
        if let Some(path) = &self.for_doc {
            config.documents.for_side = path.clone();
        }
        if let Some(path) = &self.against_doc {
            config.documents.against_side = path.clone();
        }
        if let Some(path) = &self.output {
            config.transcript_output = path.clone();
        }
        if let Some(description) = &self.case_description {
            config.case_description = description.clone();
        }
    }
}

fn colorize_speaker(speaker: &str, side: Option<Side>) -> colored::ColoredString {
    match side {
        Some(Side::For) => speaker.bright_blue().bold(),
        Some(Side::Against) => speaker.bright_red().bold(),
        None => speaker.bright_yellow().bold(),
    }
}

fn print_event(event: &DebateEvent) {
    match event {
        DebateEvent::PhaseStarted { phase } => {
            println!("\n{}\n", format!("===== {} =====", phase.banner()).bold())
        }
        DebateEvent::Statement(statement) => println!(
            "{} ({}): {}\n",
            colorize_speaker(&statement.speaker, Some(statement.side)),
            statement.phase.label(),
            statement.text
        ),
        DebateEvent::Evaluation(evaluation) => println!(
            "{} ({}):\n{}\n",
            colorize_speaker("Judge", None),
            evaluation.phase.label(),
            evaluation.text
        ),
        DebateEvent::ScoresUpdated { ledger, .. } => {
            let (for_total, against_total) = ledger.totals();
            println!("{}\n", format!("Running totals: {for_total} - {against_total}").dimmed());
        }
        DebateEvent::Verdict { winner, name } => println!(
            "The court rules in favor of: {}",
            colorize_speaker(name, Some(*winner))
        ),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,courtwerk=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DebateConfig::from_yaml_file(path)?,
        None => DebateConfig::default(),
    };
    args.apply(&mut config);

    if args.print_config {
        print!("{}", config.to_yaml_string()?);
        return Ok(());
    }

    let provider: Arc<dyn LLMProvider> = match &args.scripted {
        Some(path) => {
            // Scripted replays ignore model ids, so any placeholder will do.
            for model in [
                &mut config.models.judge,
                &mut config.models.for_side,
                &mut config.models.against_side,
            ] {
                model.get_or_insert_with(|| "scripted".to_string());
            }
            Arc::new(ScriptedProvider::from_yaml_file(path)?)
        }
        None => {
            if let Err(err) = dotenvy::dotenv() {
                tracing::debug!(error = %err, "no .env file loaded");
            }
            Arc::new(OpenAI::from_env()?)
        }
    };

    config.validate()?;

    let indexes = CaseIndexes::load(
        &config.documents.for_side,
        &config.documents.against_side,
        config.retrieval.chunk_options(),
    )?;

    let (indexes, retriever) = select_retriever(
        Arc::clone(&provider),
        indexes,
        config.models.embedding.as_deref(),
    )
    .await?;

    let sink = Arc::new(FileTranscriptSink::new(config.transcript_output.clone()));
    let orchestrator = DebateOrchestrator::from_config(&config, provider, indexes, retriever, sink)?
        .with_event_callback(print_event);

    let run = orchestrator.run().await?;
    let (for_total, against_total) = run.ledger.totals();
    println!(
        "\nCourtroom simulation complete ({for_total} - {against_total}). Transcript saved to {}",
        config.transcript_output.display()
    );

    Ok(())
}
