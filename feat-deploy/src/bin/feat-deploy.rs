//! The `feat-deploy` CLI tool.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use feat_catalog::FsRepositoryLoader;
use feat_deploy::{
    cli::{Cli, Command},
    synthetic_content_resolver, Engine, EngineConfig,
    testing::FakeModuleHost,
};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path),
        None => Ok(EngineConfig::default()),
    };
    let config = match config {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    // `EngineConfig::verbose` (a deployment tunable, persisted and loaded
    // independently of the CLI's own `-v` flags) raises the floor to
    // `info` so its phase banners are never filtered out, mirroring
    // `alpm-lint`'s `--verbose`/`simplelog` wiring.
    let level = cli.verbose.log_level_filter().max(if config.verbose { LevelFilter::Info } else { LevelFilter::Off });
    let mode = if config.verbose { TerminalMode::Mixed } else { TerminalMode::Stderr };
    if let Err(error) = TermLogger::init(level, Config::default(), mode, ColorChoice::Auto) {
        eprintln!("Failed to initialize logger:\n{error}");
        return ExitCode::FAILURE;
    }

    let result = run(cli, config);
    if let Err(error) = result {
        eprintln!("{error}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli, config: EngineConfig) -> Result<(), feat_deploy::Error> {
    let loader = FsRepositoryLoader::new(cli.catalog_dir);
    let host = Arc::new(FakeModuleHost::new());
    let engine = Engine::new(loader, host, synthetic_content_resolver(), cli.state_dir, config, None)?;

    match cli.command {
        Command::AddRepository { uri } => {
            engine.add_repository(&uri)?;
            println!("added repository {uri}");
        }
        Command::RemoveRepository { uri } => {
            engine.remove_repository(&uri);
            println!("removed repository {uri}");
        }
        Command::Install { spec } => {
            engine.install(&spec)?;
            println!("installed {spec}");
        }
        Command::Uninstall { spec } => {
            engine.uninstall(&spec)?;
            println!("uninstalled {spec}");
        }
        Command::List => {
            for id in engine.list() {
                println!("{id}");
            }
        }
    }
    Ok(())
}
