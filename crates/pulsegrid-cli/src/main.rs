//! pulsegrid CLI - The `pulsegrid` command.
//!
//! Runs the step sequencer in the terminal: the grid is edited and the
//! transport driven with line commands on stdin, while the session schedules
//! audio ahead of time on the output device.

mod commands;
mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::Level;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;

use pulsegrid_core::{Catalog, Config, CpalBackend, FileSource, Session, StatusEvent};

use crate::commands::{Command, HELP};

/// pulsegrid - interactive grid step sequencer
#[derive(Parser, Debug)]
#[command(name = "pulsegrid")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Interactive grid step sequencer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the catalog and run the sequencer
    Play(PlayArgs),

    /// Print the sound catalog grouped by category
    List {
        /// Sound manifest (JSON)
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Config file path (default: ~/.config/pulsegrid/config.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List audio output devices
    Devices,

    /// Create a default configuration file
    Init,

    /// Show the configuration file path
    ConfigPath,
}

#[derive(Args, Debug)]
struct PlayArgs {
    /// Sound manifest (JSON)
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// Directory sound sources are resolved against
    #[arg(short = 'd', long)]
    sounds_dir: Option<PathBuf>,

    /// Start tempo in BPM (72-148)
    #[arg(short, long)]
    bpm: Option<f64>,

    /// Config file path (default: ~/.config/pulsegrid/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Start playback right away
    #[arg(short, long)]
    autostart: bool,

    /// Print the grid on every step
    #[arg(short, long)]
    follow: bool,

    /// Write the settings, command-line overrides included, back to the config file
    #[arg(long)]
    save: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        // Status messages are printed by the command loop itself.
        .filter_module("pulsegrid::status", log::LevelFilter::Off)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let path = Config::create_default_config_file()?;
            println!("Created default config at: {}", path.display());
        }
        Commands::ConfigPath => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
        Commands::Devices => {
            pulsegrid_core::print_output_devices().context("Failed to list audio devices")?;
        }
        Commands::List { manifest, config } => {
            let config = load_config(config.as_deref())?;
            let manifest = manifest.unwrap_or(config.catalog.manifest);
            let catalog = Catalog::load(&manifest)
                .with_context(|| format!("Failed to load catalog {}", manifest.display()))?;
            print!("{}", render::render_catalog(&catalog));
        }
        Commands::Play(args) => play(args).await?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to read config {}", path.display())),
        None => Ok(Config::load_or_default()),
    }
}

async fn play(args: PlayArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(manifest) = args.manifest {
        config.catalog.manifest = manifest;
    }
    if let Some(dir) = args.sounds_dir {
        config.catalog.sounds_dir = Some(dir);
    }
    if let Some(bpm) = args.bpm {
        config.transport.bpm = bpm;
    }
    if args.save {
        match args.config.as_deref() {
            Some(path) => config.save_to(path)?,
            None => config.save()?,
        }
        log::info!("Settings saved");
    }

    let sounds_dir = config.catalog.resolved_sounds_dir();
    log::info!("Manifest:   {}", config.catalog.manifest.display());
    log::info!("Sounds dir: {}", sounds_dir.display());

    let backend = CpalBackend::new().with_device(config.audio.output_device.clone());
    let mut session = Session::new(
        config.scheduler_settings(),
        Box::new(backend),
        Arc::new(FileSource::new(sounds_dir)),
    );
    let status = session.status_receiver();

    // A failed load is reported on the status channel; the loop still runs so
    // the user can see why start is refused.
    let _ = session.load_catalog(&config.catalog.manifest);

    println!("{HELP}\n");
    show(&session);
    if args.autostart {
        let _ = session.start().await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_playhead = session.display().playhead;

    loop {
        for event in status.try_iter() {
            print_status(&event);
        }

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match commands::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => run_command(&mut session, command).await,
                    Ok(None) => {}
                    Err(e) => println!("! {e}"),
                }
            }
            _ = sleep_until(session.next_wakeup()) => {
                session.pump();
                let playhead = session.display().playhead;
                if args.follow && playhead.is_some() && playhead != last_playhead {
                    show(&session);
                }
                last_playhead = playhead;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.close();
    for event in status.try_iter() {
        print_status(&event);
    }
    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run_command(session: &mut Session, command: Command) {
    // Failures of start/preview are already on the status channel.
    match command {
        Command::Start => {
            let _ = session.start().await;
        }
        Command::Stop => session.stop(),
        Command::Toggle => {
            let _ = session.toggle().await;
        }
        Command::Tempo(bpm) => {
            let applied = session.set_tempo(bpm);
            println!("Tempo {applied:.0} BPM");
        }
        Command::Set { row, column, id } => {
            if !session.catalog().is_some_and(|c| c.contains(&id)) {
                println!("! '{id}' is not in the catalog, the cell will stay silent");
            }
            session.set_cell(row, column, Some(id));
            show(session);
        }
        Command::ClearCell { row, column } => {
            session.set_cell(row, column, None);
            show(session);
        }
        Command::ClearAll => {
            session.clear_all();
            show(session);
        }
        Command::Template => {
            session.reset_to_template();
            show(session);
        }
        Command::Preview(id) => {
            let _ = session.preview_sound(&id).await;
        }
        Command::Show => show(session),
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

fn show(session: &Session) {
    let grid = session.grid().snapshot();
    let catalog = session.catalog().map(|c| c.as_ref());
    println!(
        "[{:?} | {:.0} BPM]\n{}",
        session.state(),
        session.tempo(),
        render::render_grid(&grid, session.display(), catalog)
    );
}

fn print_status(event: &StatusEvent) {
    let prefix = match event.level {
        Level::Error => "error",
        Level::Warn => "warn",
        _ => "info",
    };
    println!("[{prefix}] {}", event.message);
}
