//! Command-line argument handling for `feat-deploy`.

use std::path::PathBuf;

use clap::Parser;

/// The command-line interface for `feat-deploy`.
#[derive(Debug, Parser)]
#[clap(about = "A feature resolution and deployment engine.", author, name = "feat-deploy", version)]
pub struct Cli {
    /// Log verbosity level.
    #[command(flatten)]
    pub verbose: clap_verbosity::Verbosity,

    /// Directory of `<uri>.json` repository documents.
    #[arg(short = 'r', long, value_name = "DIR", env = "FEAT_DEPLOY_CATALOG_DIR")]
    pub catalog_dir: PathBuf,

    /// Directory the engine persists its state and lock file in.
    #[arg(short, long, value_name = "DIR", env = "FEAT_DEPLOY_STATE_DIR")]
    pub state_dir: PathBuf,

    /// Supply an `EngineConfig` TOML file, overriding the compiled-in
    /// tunable defaults.
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// The `feat-deploy` commands.
    #[clap(subcommand)]
    pub command: Command,
}

/// The `feat-deploy` subcommands.
#[derive(Debug, Parser)]
pub enum Command {
    /// Registers a root repository.
    AddRepository {
        /// The repository's URI (its JSON document's file stem, under
        /// `--catalog-dir`).
        uri: String,
    },

    /// Removes a root repository.
    RemoveRepository {
        /// The repository's URI.
        uri: String,
    },

    /// Adds a feature to the required set and deploys.
    Install {
        /// The feature identifier, `name[/version]`.
        spec: String,
    },

    /// Removes a feature from the required set and deploys.
    Uninstall {
        /// The feature identifier, `name[/version]`. A missing version
        /// matches any installed version, failing if more than one is
        /// installed.
        spec: String,
    },

    /// Lists every currently installed feature.
    List,
}
