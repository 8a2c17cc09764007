use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use prov_session::SessionDocument;
use provflow_rust::config::AppConfig;

mod commands;

/// prov-cli - inspección de sesiones con workflows de procedencia
#[derive(Parser)]
#[command(name = "prov-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resume las ventanas de una sesión y sus workflows
    Inspect {
        /// Archivo de sesión (relativo a PROVFLOW_SESSION_DIR si está definido)
        session: PathBuf,
    },
    /// Falla si alguna ventana no puede restaurarse sin intervención
    Validate { session: PathBuf },
    /// Exporta el sub-workflow de ancestros de un step
    Export {
        session: PathBuf,
        /// Id o título de la ventana
        #[arg(long)]
        window: String,
        /// Índice del step (por defecto el último)
        #[arg(long)]
        step: Option<usize>,
        /// Archivo de salida (por defecto stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env()
                                                  .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")))
                             .with_writer(std::io::stderr)
                             .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    let load = |path: PathBuf| -> Result<SessionDocument> {
        let path = config.session_path(path);
        SessionDocument::load(&path).with_context(|| format!("loading session {}", path.display()))
    };

    match cli.command {
        Commands::Inspect { session } => {
            print!("{}", commands::inspect(&load(session)?, &config.replay_options()));
        }
        Commands::Validate { session } => {
            let (report, ok) = commands::validate(&load(session)?);
            print!("{report}");
            if !ok {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Export { session, window, step, out } => {
            let slice = commands::export(&load(session)?, &window, step)?;
            let text = serde_json::to_string_pretty(&slice)?;
            match out {
                Some(path) => {
                    fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
                    info!("exported workflow to {}", path.display());
                }
                None => println!("{text}"),
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
