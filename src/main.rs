use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::info;

use siteforge::config::AppConfig;
use siteforge::orchestrator::Orchestrator;
use siteforge::providers::{GenerationOptions, GenerationRequest};
use siteforge::workflow::stage::GenerationStageRunner;
use siteforge::workflow::{MessageJournal, WorkflowEngine};

#[derive(Parser)]
#[command(
    name = "siteforge",
    about = "Scaffold web projects with interchangeable AI text backends",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Data directory for config.toml and the message journal
    #[arg(long, env = "SITEFORGE_DATA_DIR", global = true)]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SITEFORGE_LOG", global = true)]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "SITEFORGE_LOG_FILE", global = true)]
    log_file: Option<std::path::PathBuf>,

    /// Pin a specific provider, bypassing priority order
    #[arg(long, env = "SITEFORGE_PROVIDER", global = true)]
    provider: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one orchestrated generation call and print the result.
    ///
    /// The response is normalized (code extracted, truncation repaired)
    /// unless --raw is given.
    Generate {
        /// The generation prompt
        prompt: String,
        /// Print the backend's raw text without normalization
        #[arg(long)]
        raw: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
        /// Sampling temperature forwarded to the backend
        #[arg(long)]
        temperature: Option<f32>,
        /// Maximum tokens to generate
        #[arg(long)]
        max_tokens: Option<u32>,
        /// Per-call deadline in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Run the full agent workflow pipeline against one prompt.
    Workflow {
        /// The task for the pipeline
        prompt: String,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List configured providers with live availability probes.
    Providers,
    /// Read back a day's message journal.
    History {
        /// Only messages involving this agent
        agent: Option<String>,
        /// Day to read, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = AppConfig::new(args.data_dir.clone(), args.log.clone());

    // Init once — must happen before any tracing calls.
    let _file_guard = setup_logging(&config.log, args.log_file.as_deref(), &config.log_format);

    let orchestrator = match Orchestrator::from_config(&config) {
        Ok(orchestrator) => Arc::new(orchestrator),
        Err(e) => {
            eprintln!("config error: {e:#}");
            return ExitCode::from(2);
        }
    };

    let result = match args.command {
        Command::Generate {
            prompt,
            raw,
            json,
            temperature,
            max_tokens,
            timeout_secs,
        } => {
            let request = GenerationRequest::with_options(
                prompt,
                GenerationOptions {
                    temperature,
                    max_tokens,
                    timeout: timeout_secs.map(Duration::from_secs),
                },
            );
            generate(&orchestrator, request, args.provider.as_deref(), raw, json).await
        }
        Command::Workflow { prompt, json } => {
            run_workflow(&config, Arc::clone(&orchestrator), &prompt, json).await
        }
        Command::Providers => list_providers(&orchestrator).await,
        Command::History { agent, date } => show_history(&config, agent.as_deref(), date).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn generate(
    orchestrator: &Orchestrator,
    request: GenerationRequest,
    provider_override: Option<&str>,
    raw: bool,
    json: bool,
) -> Result<()> {
    if raw {
        let generation = orchestrator
            .generate_text_with(request, provider_override)
            .await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&generation)?);
        } else {
            println!("{}", generation.text);
        }
        return Ok(());
    }

    let component = orchestrator
        .generate_component(request, provider_override)
        .await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "code": component.payload.code,
                "explanation": component.payload.explanation,
                "wasTruncated": component.payload.was_truncated,
                "provider": component.provider,
            }))?
        );
        return Ok(());
    }

    println!("{}", component.payload.code);
    if let Some(explanation) = &component.payload.explanation {
        eprintln!("--\n{explanation}");
    }
    Ok(())
}

async fn run_workflow(
    config: &AppConfig,
    orchestrator: Arc<Orchestrator>,
    prompt: &str,
    json: bool,
) -> Result<()> {
    let runner = Arc::new(GenerationStageRunner::new(orchestrator));
    let journal = MessageJournal::new(config.logs_dir());
    let mut engine = WorkflowEngine::new(config.workflow.clone(), config.intent, runner)
        .with_journal(journal);

    info!(agents = ?config.workflow.agents, "starting workflow");
    let report = engine.run(prompt).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for agent in &config.workflow.agents {
            if let Some(output) = report.outputs.get(agent) {
                println!("=== {agent} ===\n{output}\n");
            }
        }
        println!(
            "state: {}  stages: {}/{}  retries: {}  invocations: {}",
            report.state,
            report.outputs.len(),
            config.workflow.agents.len(),
            report.retry_count,
            report.invocations,
        );
    }

    if report.success {
        Ok(())
    } else {
        anyhow::bail!("workflow failed with no outputs")
    }
}

async fn list_providers(orchestrator: &Orchestrator) -> Result<()> {
    for entry in orchestrator.registry().in_priority_order() {
        let name = entry.provider.name();
        let status = if entry.provider.is_available().await {
            "available"
        } else {
            "unavailable"
        };
        println!("{:>3}  {:<12} {}", entry.priority, name, status);
    }
    Ok(())
}

async fn show_history(
    config: &AppConfig,
    agent: Option<&str>,
    date: Option<String>,
) -> Result<()> {
    let day = match date {
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .with_context(|| format!("invalid --date `{s}`, expected YYYY-MM-DD"))?,
        None => Utc::now().date_naive(),
    };

    let journal = MessageJournal::new(config.logs_dir());
    let messages = journal.read_day(day).await;
    let filtered = messages
        .iter()
        .filter(|m| agent.map(|a| m.from == a || m.to == a).unwrap_or(true));

    for message in filtered {
        println!("{}", serde_json::to_string(message)?);
    }
    Ok(())
}

fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("siteforge.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            // Fall back to stderr-only — don't panic on a bad log path.
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stderr",
                dir.display()
            );
            init_stderr_only(log_level, use_json);
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else {
        init_stderr_only(log_level, use_json);
        None
    }
}

/// Diagnostics go to stderr so stdout stays clean for generated output.
fn init_stderr_only(log_level: &str, use_json: bool) {
    if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
