//! nhsync ingest library
//!
//! Mirrors the CMS nursing home provider dataset into CRM Account records.
//!
//! # Overview
//!
//! - **Provisioning**: classify the columns of the metadata document and create
//!   the missing custom fields on Account (`nhsync provision`)
//! - **Loading**: download the provider CSV, keep the configured states and
//!   create one Account per certification number (`nhsync load`)
//! - **Planning**: show the derived field descriptors without touching the CRM
//!   (`nhsync plan`)
//! - **Officer lookup**: scrape a facility's chief administrative officer from
//!   the Arizona licensing portals (`nhsync cac`)

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod cac;
pub mod classify;
pub mod config;
pub mod error;
pub mod loader;
pub mod metadata;
pub mod normalize;
pub mod pipeline;
pub mod provision;
pub mod report;
pub mod upsert;

pub use config::Config;
pub use error::{IngestError, Result};
pub use report::RunSummary;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::parse_states;

/// nhsync - CMS nursing home data into CRM Accounts
#[derive(Parser, Debug)]
#[command(name = "nhsync")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run against an in-memory tenant; nothing is sent to the CRM
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Also write the run summary as JSON to this path
    #[arg(long, global = true, value_name = "PATH")]
    pub summary_json: Option<PathBuf>,

    /// Metadata document describing the upstream columns
    #[arg(long, global = true, value_name = "PATH")]
    pub metadata: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the custom Account fields the dataset needs
    Provision(ProvisionArgs),

    /// Load provider rows as Accounts
    Load(LoadArgs),

    /// Provision, then load
    Sync {
        #[command(flatten)]
        provision: ProvisionArgs,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Print the field plan without contacting the CRM
    Plan,

    /// Look up a facility's chief administrative officer
    Cac {
        /// Provider name as listed by the licensing portal
        provider_name: String,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ProvisionArgs {
    /// Seconds to wait between field creations
    #[arg(long, value_name = "N")]
    pub delay_seconds: Option<u64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct LoadArgs {
    /// Download the provider CSV from this URL
    #[arg(long, value_name = "URL", conflicts_with = "csv_path")]
    pub csv_url: Option<String>,

    /// Read the provider CSV from a local file instead
    #[arg(long, value_name = "PATH")]
    pub csv_path: Option<PathBuf>,

    /// Comma separated state codes to keep, e.g. AZ,NV
    #[arg(long, value_name = "LIST")]
    pub states: Option<String>,

    /// Milliseconds to wait between records
    #[arg(long, value_name = "N")]
    pub delay_ms: Option<u64>,

    /// Stop after this many accepted rows
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}

impl Cli {
    /// Fold command-line overrides into the environment configuration.
    pub fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(path) = &self.metadata {
            config.source.metadata_path = path.clone();
        }

        match &self.command {
            Commands::Provision(args) => args.apply_to(config),
            Commands::Load(args) => args.apply_to(config),
            Commands::Sync { provision, load } => {
                provision.apply_to(config);
                load.apply_to(config);
            },
            Commands::Plan | Commands::Cac { .. } => {},
        }

        config.validate()?;
        Ok(())
    }
}

impl ProvisionArgs {
    fn apply_to(&self, config: &mut Config) {
        if let Some(secs) = self.delay_seconds {
            config.pacing.field_delay_secs = secs;
        }
    }
}

impl LoadArgs {
    fn apply_to(&self, config: &mut Config) {
        if let Some(url) = &self.csv_url {
            config.source.csv_url = url.clone();
        }
        if let Some(states) = &self.states {
            config.source.states = parse_states(states);
        }
        if let Some(ms) = self.delay_ms {
            config.pacing.record_delay_ms = ms;
        }
    }
}
