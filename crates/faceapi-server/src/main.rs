//! faceapi-server: loads the configured providers and drives tasks through
//! them from the command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use faceapi::config::AppConfig;
use faceapi::identity::InMemoryIdentityStore;
use faceapi::provider::{LoadReport, ProviderCatalog, ProviderRegistry};
use faceapi::service::TaskService;
use faceapi::tasks::{Task, TaskId, TaskResult};
use serde_json::json;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

/// Face API task orchestrator
#[derive(Debug, Parser)]
#[command(name = "faceapi-server")]
#[command(about = "Run face-recognition tasks against pluggable engines", long_about = None)]
#[command(version)]
struct Cli {
    /// Application config file (TOML). Defaults apply when omitted.
    #[arg(long, short, env = "FACEAPI_CONFIG")]
    config: Option<PathBuf>,

    /// Overrides `provider_namespace` from the config file
    #[arg(long)]
    providers_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List loaded providers and the sub-namespaces that failed to load
    Providers {
        /// Exit with an error if any provider failed to load
        #[arg(long)]
        strict: bool,
    },

    /// Submit tasks and wait for their terminal records
    ///
    /// `register`, `quality` and `liveness` submit one task per file.
    /// `best-match` and `match` enroll every file but the last, then match
    /// with the last one (`match` compares against the first enrolled face).
    Run {
        /// Provider identity, e.g. `facenet-0-0-1`
        #[arg(long)]
        provider: String,

        #[arg(long, value_enum)]
        op: Operation,

        /// Image or video files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Polling interval in milliseconds
        #[arg(long, default_value = "200")]
        poll_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Operation {
    Register,
    Quality,
    Liveness,
    BestMatch,
    Match,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(dir) = cli.providers_dir {
        config.provider_namespace = dir;
    }
    init_logging(&config.logging.filter);

    let (registry, report) = ProviderRegistry::from_config(&config, &ProviderCatalog::builtin())
        .with_context(|| {
            format!(
                "cannot load providers from {}",
                config.provider_namespace.display()
            )
        })?;
    tracing::info!(
        loaded = report.loaded.len(),
        skipped = report.errors.len(),
        "provider namespace loaded"
    );

    match cli.command {
        Commands::Providers { strict } => list_providers(&registry, &report, strict),
        Commands::Run {
            provider,
            op,
            files,
            poll_ms,
        } => {
            run(
                &config,
                registry,
                &provider,
                op,
                &files,
                Duration::from_millis(poll_ms),
            )
            .await
        },
    }
}

/// `RUST_LOG` wins over the configured filter.
fn init_logging(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("cannot load config from {}", path.display())),
        None => Ok(AppConfig::default()),
    }
}

fn list_providers(registry: &ProviderRegistry, report: &LoadReport, strict: bool) -> Result<()> {
    let providers: Vec<_> = registry
        .providers()
        .iter()
        .map(|p| {
            let info = p.info();
            json!({
                "name": info.name(),
                "engine_type": info.engine_type(),
                "version": info.version(),
                "description": info.description(),
                "build": info.build(),
                "quality_threshold": info.quality_threshold(),
                "anti_spoofing_threshold": info.anti_spoofing_threshold(),
                "backend": info.backend(),
            })
        })
        .collect();
    let errors: Vec<_> = report
        .errors
        .iter()
        .map(|e| json!({ "namespace": e.namespace(), "error": e.to_string() }))
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "providers": providers, "errors": errors }))?
    );

    if strict && !report.is_clean() {
        bail!("{} provider(s) failed to load", report.errors.len());
    }
    Ok(())
}

async fn run(
    config: &AppConfig,
    registry: ProviderRegistry,
    provider: &str,
    op: Operation,
    files: &[PathBuf],
    poll: Duration,
) -> Result<()> {
    if !registry.contains(provider) {
        bail!(
            "no such provider '{provider}' (loaded: {})",
            registry.provider_names().join(", ")
        );
    }
    let images = files
        .iter()
        .map(|path| std::fs::read(path).with_context(|| format!("cannot read {}", path.display())))
        .collect::<Result<Vec<_>>>()?;

    let store = config
        .store
        .open_task_store()
        .await
        .context("cannot open result store")?;
    let identity = Arc::new(InMemoryIdentityStore::new());
    let engine_id = identity.add_engine(provider);
    let service = TaskService::new(Arc::new(registry), store, identity);

    match op {
        Operation::Register | Operation::Quality | Operation::Liveness => {
            for image in images {
                let task_id = match op {
                    Operation::Register => service.register_face(engine_id, image).await?,
                    Operation::Quality => service.check_face_quality(engine_id, image).await?,
                    _ => service.check_face_anti_spoofing(engine_id, image).await?,
                };
                print_task(&task_id, &wait_for(&service, &task_id, poll).await?)?;
            }
        },
        Operation::BestMatch | Operation::Match => {
            let Some((candidate, gallery)) = images.split_last() else {
                bail!("no input files");
            };
            if gallery.is_empty() {
                bail!("{op:?} needs at least two files: the faces to enroll, then the candidate");
            }

            let mut faces = Vec::new();
            for image in gallery {
                let task_id = service.register_face(engine_id, image.clone()).await?;
                let task = wait_for(&service, &task_id, poll).await?;
                print_task(&task_id, &task)?;
                if let Some(TaskResult::FaceRegister(registered)) = task.result() {
                    faces.push(Uuid::parse_str(&registered.face_id)?);
                }
            }

            let task_id = match (op, faces.first()) {
                (Operation::BestMatch, _) => service.best_match(engine_id, candidate.clone()).await?,
                (_, Some(face_id)) => {
                    service
                        .match_with_face(engine_id, *face_id, candidate.clone())
                        .await?
                },
                (_, None) => bail!("no face was enrolled"),
            };
            print_task(&task_id, &wait_for(&service, &task_id, poll).await?)?;
        },
    }
    Ok(())
}

/// Polls a task until it reaches a terminal state.
async fn wait_for(service: &TaskService, task_id: &TaskId, poll: Duration) -> Result<Task> {
    loop {
        let task = service.get_task_result(&task_id.to_string()).await?;
        if task.is_terminal() {
            return Ok(task);
        }
        tokio::time::sleep(poll).await;
    }
}

fn print_task(task_id: &TaskId, task: &Task) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string(&json!({ "task_id": task_id, "task": task }))?
    );
    Ok(())
}
