//! `vercel-ext`: drop-in replacement for the `vercel` command.
//!
//! Inside a Vercel build every argument goes to `next`. Elsewhere the project
//! is linked and its environments pulled first (unless `.vercel/project.json`
//! already exists), then the Vercel CLI runs with the same arguments.

use std::ffi::OsString;
use std::path::Path;

use clap::Parser;
use tokio::process::Command;
use tracing::{debug, error};

use vercel_ext::error::VercelError;
use vercel_ext::exit_codes::{self, describe};
use vercel_ext::io::config::{EnvSettings, PROJECT_CONFIG_FILE, load_project_config};
use vercel_ext::io::confirm::TerminalConfirmer;
use vercel_ext::io::vercel::VercelOptions;
use vercel_ext::io::{bin_path, input};
use vercel_ext::{logging, pull};

/// Marker written by `vercel link`.
const LINKED_PROJECT_FILE: &str = ".vercel/project.json";

#[derive(Parser)]
#[command(
    name = "vercel-ext",
    about = "Vercel CLI wrapper that pulls environments before running",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// Arguments forwarded verbatim.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<OsString>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = run(&cli.args).await;
    input::dispose();
    // A pending stdin read on the blocking pool would stall runtime shutdown.
    std::process::exit(code);
}

async fn run(args: &[OsString]) -> i32 {
    let settings = EnvSettings::from_env();
    if settings.in_vercel_build {
        return spawn_inherited(Command::new("next"), args).await;
    }

    if Path::new(LINKED_PROJECT_FILE).exists() {
        debug!("project already linked");
    } else {
        input::init();
        let config = load_project_config(Path::new(PROJECT_CONFIG_FILE));
        if let Err(err) =
            pull::run(&settings, &config, VercelOptions::default(), &TerminalConfirmer).await
        {
            eprintln!("\n{}", describe(&err));
            return exit_codes::for_error(&err);
        }
    }

    let bin = match std::env::current_dir()
        .map_err(VercelError::from)
        .and_then(|cwd| bin_path::resolve_from(&cwd))
    {
        Ok(bin) => bin,
        Err(err) => {
            let err = anyhow::Error::from(err);
            eprintln!("{}", describe(&err));
            return exit_codes::for_error(&err);
        }
    };
    spawn_inherited(Command::new(bin), args).await
}

async fn spawn_inherited(mut cmd: Command, args: &[OsString]) -> i32 {
    cmd.args(args);
    debug!(program = ?cmd.as_std().get_program(), "spawning");
    match cmd.status().await {
        Ok(status) => exit_codes::for_status(status),
        Err(err) => {
            error!(err = %err, program = ?cmd.as_std().get_program(), "failed to spawn");
            eprintln!(
                "failed to spawn {}: {err}",
                cmd.as_std().get_program().to_string_lossy()
            );
            exit_codes::FAILURE
        }
    }
}
