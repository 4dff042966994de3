//! nhsync - CMS nursing home data into CRM Accounts

use std::io::IsTerminal;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use nhsync_common::logging::{init_logging, LogConfig};
use nhsync_common::types::FieldDescriptor;
use nhsync_ingest::cac::CacClient;
use nhsync_ingest::loader::{CsvSource, LoadOptions};
use nhsync_ingest::pipeline::{self, LoadRequest, Target};
use nhsync_ingest::report::{self, RunSummary};
use nhsync_ingest::{Cli, Commands, Config, LoadArgs};
use tracing::{error, info, Level};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("nhsync")
        .filter_directives("reqwest=warn,hyper=warn,html5ever=warn,selectors=warn")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {e:#}");
            None
        },
    };

    let code = match execute(&cli).await {
        Ok(summary) => summary.exit_code(),
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            1
        },
    };

    // Flush the file writer before exiting
    drop(guard);
    process::exit(code);
}

async fn execute(cli: &Cli) -> Result<RunSummary> {
    let mut config = Config::load().context("Failed to load configuration")?;
    cli.apply_to(&mut config).context("Invalid command-line options")?;

    let summary = match &cli.command {
        Commands::Plan => {
            let plan = pipeline::load_plan(&config.source.metadata_path)
                .context("Failed to read metadata document")?;
            println!("{}", report::render_plan(&plan));
            RunSummary::default()
        },

        Commands::Cac { provider_name } => {
            let client = CacClient::new(
                &config.cac.licensing_url,
                &config.cac.carecheck_url,
                Duration::from_secs(config.http.timeout_secs),
            )?;
            let officer = client.lookup(provider_name).await?;
            println!("{}", "Chief Administrative Officer".cyan().bold());
            println!("  First name: {}", officer.first_name);
            println!("  Last name:  {}", officer.last_name);
            RunSummary::default()
        },

        Commands::Provision(_) => {
            let plan = pipeline::load_plan(&config.source.metadata_path)
                .context("Failed to read metadata document")?;
            let target = connect(&config, cli.dry_run, Vec::new()).await?;

            let provision =
                pipeline::provision(target.crm(), target.sleeper(), &plan, config.field_delay()).await;
            print!("{}", report::render_provision_summary(&provision));
            RunSummary {
                provision: Some(provision),
                ..RunSummary::default()
            }
        },

        Commands::Load(args) => {
            let plan = pipeline::load_plan(&config.source.metadata_path)
                .context("Failed to read metadata document")?;
            // A dry-run load pretends provisioning already happened.
            let target = connect(&config, cli.dry_run, pipeline::planned_descriptors(&plan)).await?;

            let request = load_request(&config, args);
            let load = pipeline::load(target.crm(), target.sleeper(), &plan, &request).await?;
            print!("{}", report::render_load_summary(&load));
            RunSummary {
                load: Some(load),
                ..RunSummary::default()
            }
        },

        Commands::Sync { load, .. } => {
            let plan = pipeline::load_plan(&config.source.metadata_path)
                .context("Failed to read metadata document")?;
            let target = connect(&config, cli.dry_run, Vec::new()).await?;

            let request = load_request(&config, load);
            let summary = pipeline::sync(
                target.crm(),
                target.sleeper(),
                &plan,
                config.field_delay(),
                &request,
            )
            .await?;
            if let Some(provision) = &summary.provision {
                print!("{}", report::render_provision_summary(provision));
            }
            if let Some(load) = &summary.load {
                print!("{}", report::render_load_summary(load));
            }
            if let Some(reason) = &summary.aborted {
                eprintln!("{} Load aborted: {reason}", "Error:".red().bold());
            }
            summary
        },
    };

    if let Some(path) = &cli.summary_json {
        report::write_summary_json(path, &summary)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        info!(path = %path.display(), "Wrote run summary");
    }

    Ok(summary)
}

async fn connect(
    config: &Config,
    dry_run: bool,
    seed: Vec<FieldDescriptor>,
) -> Result<Target> {
    if dry_run {
        info!("Dry run: using an in-memory tenant");
        return Ok(Target::dry_run(seed));
    }
    Target::connect(config)
        .await
        .context("Failed to connect to the CRM tenant")
}

fn load_request(config: &Config, args: &LoadArgs) -> LoadRequest {
    let source = match &args.csv_path {
        Some(path) => CsvSource::Path(path.clone()),
        None => CsvSource::Url(config.source.csv_url.clone()),
    };

    LoadRequest {
        source,
        options: LoadOptions {
            states: config.source.states.clone(),
            limit: args.limit,
        },
        delay: config.record_delay(),
        timeout: Duration::from_secs(config.http.timeout_secs),
        progress: std::io::stderr().is_terminal(),
    }
}
