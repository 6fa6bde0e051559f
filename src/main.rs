//! Skywave launcher
//!
//! Command-line entry point: configures repositories and logging from CLI
//! options (optionally merged with a TOML config file), loads and starts a
//! radio, then drives it from an interactive menu.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use skywave::plugin::repository::RepositoryKind;
use skywave::radio::reconfig::Command;
use skywave::System;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

/// Skywave - reconfigurable software-defined-radio runtime
#[derive(Parser, Debug)]
#[command(name = "skywave")]
#[command(version, about, long_about = None)]
struct Cli {
    /// XML radio description
    #[arg(value_name = "RADIO")]
    radio: Option<PathBuf>,

    /// Load launcher options from a TOML config file
    #[arg(short = 'f', long)]
    config_file: Option<PathBuf>,

    /// Repository of stack components (';'-separated directories)
    #[arg(short = 't', long)]
    stack_repository: Option<String>,

    /// Repository of phy components (';'-separated directories)
    #[arg(short = 'p', long)]
    phy_repository: Option<String>,

    /// Repository of sdf components (';'-separated directories)
    #[arg(short = 's', long)]
    sdf_repository: Option<String>,

    /// Repository of controllers (';'-separated directories)
    #[arg(short = 'c', long)]
    controller_repository: Option<String>,

    /// Log level (debug, info, warning, error, fatal)
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Append log records to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Do not automatically load the radio (implies --no-start)
    #[arg(long)]
    no_load: bool,

    /// Do not automatically start the radio
    #[arg(long)]
    no_start: bool,
}

/// The same options as the CLI, loadable from a TOML file. Command-line
/// values win over file values.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LauncherConfig {
    radio: Option<PathBuf>,
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    repositories: RepositoryPaths,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RepositoryPaths {
    stack: Option<String>,
    phy: Option<String>,
    sdf: Option<String>,
    controller: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    println!("skywave v{}", env!("CARGO_PKG_VERSION"));
    println!("reconfigurable software-defined-radio runtime");
    println!();

    let config = match &cli.config_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read config file {}", path.display()))?;
            toml::from_str(&text)
                .with_context(|| format!("cannot parse config file {}", path.display()))?
        }
        None => LauncherConfig::default(),
    };

    let mut system = System::new();

    let level = cli.log_level.as_deref().or(config.log_level.as_deref());
    if let Some(level) = level {
        system.set_log_level(level);
    }
    let log_file = cli.log_file.as_deref().or(config.log_file.as_deref());
    if let Some(path) = log_file {
        skywave::logging::set_log_file(path)
            .with_context(|| format!("cannot open log file {}", path.display()))?;
    }

    let repos = [
        (RepositoryKind::Stack, cli.stack_repository.as_deref().or(config.repositories.stack.as_deref())),
        (RepositoryKind::Phy, cli.phy_repository.as_deref().or(config.repositories.phy.as_deref())),
        (RepositoryKind::Sdf, cli.sdf_repository.as_deref().or(config.repositories.sdf.as_deref())),
        (
            RepositoryKind::Controller,
            cli.controller_repository.as_deref().or(config.repositories.controller.as_deref()),
        ),
    ];
    for (kind, paths) in repos {
        if let Some(paths) = paths {
            system
                .set_repository(kind, paths)
                .with_context(|| format!("invalid {:?} repository", kind))?;
        }
    }

    let radio = cli.radio.clone().or(config.radio);

    if let (Some(path), false) = (&radio, cli.no_load) {
        if system.load_radio(path) && !cli.no_start {
            system.start_radio();
        }
    }

    menu_loop(&mut system, radio.as_deref())?;

    // Leave the radio cleanly whatever state the menu exited in
    if system.is_running() {
        system.stop_radio();
    }
    if system.is_loaded() {
        system.unload_radio();
    }
    Ok(())
}

fn print_menu() {
    println!();
    println!("  l <path>  load radio (path optional after the first load)");
    println!("  s         start radio");
    println!("  p         stop radio");
    println!("  u         unload radio");
    println!("  r <path>  reconfigure radio from a new description");
    println!("  c <engine> <component> <command>  post a command");
    println!("  g <component> <parameter>         get a parameter value");
    println!("  q         quit");
    println!();
}

fn menu_loop(system: &mut System, default_radio: Option<&Path>) -> Result<()> {
    let stdin = std::io::stdin();
    let mut last_radio = default_radio.map(Path::to_path_buf);
    print_menu();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // stdin closed; leave the menu
            return Ok(());
        }
        let mut words = line.split_whitespace();
        match words.next() {
            Some("l") => {
                let path = words.next().map(PathBuf::from).or_else(|| last_radio.clone());
                match path {
                    Some(path) => {
                        if system.load_radio(&path) {
                            last_radio = Some(path);
                        }
                    }
                    None => println!("no radio description given"),
                }
            }
            Some("s") => {
                system.start_radio();
            }
            Some("p") => {
                system.stop_radio();
            }
            Some("u") => {
                system.unload_radio();
            }
            Some("r") => {
                let path = words.next().map(PathBuf::from).or_else(|| last_radio.clone());
                match path {
                    Some(path) => {
                        if system.reconfigure_radio(&path) {
                            last_radio = Some(path);
                        }
                    }
                    None => println!("no radio description given"),
                }
            }
            Some("c") => match (words.next(), words.next(), words.next()) {
                (Some(engine), Some(component), Some(name)) => {
                    system.post_command(Command::new(name, component, engine));
                }
                _ => println!("usage: c <engine> <component> <command>"),
            },
            Some("g") => match (words.next(), words.next()) {
                (Some(component), Some(parameter)) => {
                    let value = system.parameter_value(parameter, component);
                    if value.is_empty() {
                        println!("{}.{} is not set", component, parameter);
                    } else {
                        println!("{}.{} = {}", component, parameter, value);
                    }
                }
                _ => println!("usage: g <component> <parameter>"),
            },
            Some("q") => return Ok(()),
            Some(other) => {
                println!("unknown command: {}", other);
                print_menu();
            }
            None => {}
        }
    }
}
