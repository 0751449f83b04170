//! Release Publisher CLI
//!
//! Tags a release, waits for the CI build and publishes the result to
//! Homebrew, Scoop and Winget repositories

use anyhow::Result;
use clap::{Parser, Subcommand};
use release_publisher::{
    CancelSignal, ConfigLoader, GitHubRepositoryClient, PackageKind, ReleaseConfig,
    ReleaseEnvironment, ReleaseError, ReleaseOrchestrator, ReleaseReport, ReleaseRequest,
    SecureTokenManager, SystemCommandRunner, TargetSelection, DEFAULT_WORKFLOW,
};
use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code reported when the release was interrupted
const EXIT_CANCELLED: i32 = 130;

/// Release publishing pipeline
#[derive(Parser)]
#[command(name = "release-publisher")]
#[command(version)]
#[command(about = "Tag a release and publish it to package managers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Release a version
    Run {
        /// Version to release (e.g. v1.2.3)
        #[arg(value_name = "VERSION")]
        version: String,

        /// Configuration file (defaults to .goreleaser.yaml, then .goreleaser.yml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Release workflow file
        #[arg(short, long, default_value = DEFAULT_WORKFLOW)]
        workflow: String,

        /// Use an existing workflow run instead of creating a tag
        #[arg(long)]
        run_id: Option<String>,

        /// Package managers to publish to (homebrew, scoop, winget); all when omitted
        #[arg(short, long, value_delimiter = ',')]
        publish: Vec<String>,

        /// Repository (owner/name) the workflow run belongs to
        #[arg(long)]
        repo: Option<String>,

        /// Name of the artifact uploaded by the workflow
        #[arg(long)]
        artifact_name: Option<String>,
    },
    /// Show what a release would publish
    Check {
        /// Configuration file (defaults to .goreleaser.yaml, then .goreleaser.yml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            version,
            config,
            workflow,
            run_id,
            publish,
            repo,
            artifact_name,
        } => {
            let request = ReleaseRequest::new(version)?
                .with_run_id(run_id)
                .with_workflow(Some(workflow))
                .with_selection(TargetSelection::from_names(publish))
                .with_repository(repo)
                .with_artifact_name(artifact_name);
            run_command(request, config).await
        }
        Commands::Check { config } => check_command(config).await,
    }
}

async fn run_command(request: ReleaseRequest, config: Option<PathBuf>) -> Result<i32> {
    let project_dir = PathBuf::from(".");
    let config = ConfigLoader::load(config.as_deref(), &project_dir).await?;
    let environment = ReleaseEnvironment::from_env();

    let tokens = SecureTokenManager::from_env();
    match tokens.source() {
        Some(source) => info!(source, "using GitHub token"),
        None => warn!("GITHUB_TOKEN is not set, default branch lookups are unauthenticated"),
    }
    let metadata = GitHubRepositoryClient::new(environment.api_url.as_str(), tokens.token().cloned());

    let (handle, cancel) = CancelSignal::new();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        warn!("interrupted, waiting for the running command to exit");
        handle.cancel();
    });

    let orchestrator = ReleaseOrchestrator::new(
        Arc::new(SystemCommandRunner::new()),
        Arc::new(metadata),
        config,
        environment,
    )
    .with_project_dir(&project_dir);

    match orchestrator.execute(&request, &cancel).await {
        Ok(report) => {
            print_report(&report);
            Ok(0)
        }
        Err(e) => {
            print_error(&e, &tokens);
            Ok(if e.is_cancellation() { EXIT_CANCELLED } else { 1 })
        }
    }
}

/// Resolve on Ctrl+C or, on unix, SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix;
        match unix::signal(unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install TERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn check_command(config: Option<PathBuf>) -> Result<i32> {
    let project_dir = PathBuf::from(".");
    let config = ConfigLoader::load(config.as_deref(), &project_dir).await?;
    let environment = ReleaseEnvironment::from_env();
    let tokens = SecureTokenManager::from_env();

    println!("\n🔍 release-publisher check\n");
    println!("  Project: {}", config.project_name);
    println!("  Server:  {}", environment.server_url);
    println!("  API:     {}", environment.api_url);
    match (tokens.source(), tokens.token()) {
        (Some(source), Some(token)) => println!(
            "  Token:   {} ({})",
            SecureTokenManager::mask_token(token.expose_secret()),
            source
        ),
        _ => println!("  Token:   ⚠️  not set"),
    }
    println!();

    print_targets(&config);
    Ok(0)
}

fn print_targets(config: &ReleaseConfig) {
    for kind in PackageKind::ALL {
        let targets: Vec<String> = match kind {
            PackageKind::Homebrew => config
                .homebrew_targets()
                .map(|repo| describe_branch(&repo.slug(), &repo.branch))
                .collect(),
            PackageKind::Scoop => config
                .scoop_targets()
                .map(|repo| describe_branch(&repo.slug(), &repo.branch))
                .collect(),
            PackageKind::Winget => config
                .winget_targets()
                .map(|target| {
                    let fork = &target.repository;
                    let base = &fork.pull_request.base;
                    format!(
                        "{} -> {}/{}",
                        describe_branch(&format!("{}/{}", fork.owner, fork.name), &fork.branch),
                        base.owner,
                        if base.name.is_empty() { &fork.name } else { &base.name }
                    )
                })
                .collect(),
        };

        println!("{} ({} target(s))", kind, targets.len());
        for target in targets {
            println!("  - {}", target);
        }
    }
}

fn describe_branch(slug: &str, branch: &str) -> String {
    if branch.is_empty() {
        format!("{} (default branch)", slug)
    } else {
        format!("{} ({})", slug, branch)
    }
}

fn print_report(report: &ReleaseReport) {
    if report.prerelease {
        println!("\n✅ Tagged prerelease {} (not published)", report.version);
        return;
    }

    println!("\n✅ Released {}", report.version);
    if let Some(run_id) = &report.run_id {
        println!("  Workflow run: {}", run_id);
    }
    if let Some(dir) = &report.artifact_dir {
        println!("  Artifacts:    {}", dir.display());
    }
    for target in &report.published {
        match &target.pull_request {
            Some(base) => println!(
                "  📦 {}: {} ({}), pull request to {}",
                target.kind, target.repository, target.branch, base
            ),
            None => println!(
                "  📦 {}: {} ({})",
                target.kind, target.repository, target.branch
            ),
        }
    }
    for skipped in &report.skipped {
        println!("  ⏭️  {}", skipped);
    }
}

fn print_error(error: &ReleaseError, tokens: &SecureTokenManager) {
    eprintln!("\n❌ Release failed [{}]", error.code());
    eprintln!("{}", tokens.mask_in(&error.to_string()));

    let actions = error.suggested_actions();
    if !actions.is_empty() {
        eprintln!("\nSuggested actions:");
        for action in actions {
            eprintln!("  - {}", action);
        }
    }
}
