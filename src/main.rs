use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rustmigrate::{
    ChangesetOutcome, Configuration, MigrationError, Migrator, UndeclaredHistoryPolicy,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rustmigrate")]
#[command(about = "Applies changelog migrations to a target store")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending changesets, or preview them with --dry-run
    Run {
        #[command(flatten)]
        target: TargetArgs,
        /// Write the preview script to DIR/output.sql instead of applying
        #[arg(long, value_name = "DIR")]
        dry_run: Option<PathBuf>,
    },
    /// Parse and validate a changelog without connecting
    Validate {
        #[arg(long)]
        changelog: String,
    },
    /// List the changesets the next run would apply
    Status {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
struct TargetArgs {
    #[arg(long)]
    changelog: String,
    /// memory://<name> or file://<path>
    #[arg(long)]
    uri: String,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    password: Option<String>,
    /// Active execution contexts, repeatable or comma-delimited
    #[arg(long = "context", value_delimiter = ',')]
    contexts: Vec<String>,
    #[arg(long, default_value = "warn", value_parser = parse_policy)]
    undeclared_history: UndeclaredHistoryPolicy,
}

fn parse_policy(value: &str) -> std::result::Result<UndeclaredHistoryPolicy, String> {
    value.parse()
}

impl TargetArgs {
    fn configuration(self, dry_run: Option<PathBuf>) -> Result<Configuration> {
        let builder = Configuration::builder()
            .with_master_changelog_location(self.changelog)
            .with_uri(self.uri)
            .with_username(self.username)
            .with_password(self.password)
            .with_execution_contexts(self.contexts)
            .with_undeclared_history_policy(self.undeclared_history);
        let builder = match dry_run {
            Some(directory) => builder.with_dry_run_mode(directory),
            None => builder.with_run_mode(),
        };
        Ok(builder.build()?)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            match err.downcast_ref::<MigrationError>() {
                Some(migration) if !migration.is_defect() => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn execute(command: Command) -> Result<()> {
    let migrator = Migrator::new();

    match command {
        Command::Run { target, dry_run } => {
            let configuration = target.configuration(dry_run)?;
            let report = migrator.migrate(&configuration).await?;

            for outcome in &report.outcomes {
                println!("{:<9} {} ({})", outcome.state, outcome.id, outcome.author);
            }
            println!(
                "{} declared, {} selected, {} executed, {} marked, {} skipped",
                report.declared,
                report.selected,
                report.count(ChangesetOutcome::Executed),
                report.count(ChangesetOutcome::Marked),
                report.count(ChangesetOutcome::Skipped),
            );
            if let Some(output) = &report.dry_run_output {
                println!("Dry-run script written to {}", output.display());
            }
        }
        Command::Validate { changelog } => {
            let changesets = migrator
                .validate(&changelog)
                .await
                .with_context(|| format!("validating {}", changelog))?;
            println!("{}: {} changesets, no problem found", changelog, changesets.len());
        }
        Command::Status { target } => {
            let configuration = target.configuration(None)?;
            let status = migrator
                .status(&configuration)
                .await
                .with_context(|| format!("reading status of {}", configuration.connection().uri()))?;

            println!(
                "{} declared, {} applied, {} pending",
                status.declared,
                status.persisted.len(),
                status.pending.len()
            );
            for changeset in &status.pending {
                println!("  pending  {} ({})", changeset.id(), changeset.author());
            }
        }
    }

    Ok(())
}
