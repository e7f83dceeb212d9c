//! `vercel-pull-envs`: link the project and pull every Vercel environment.

use std::path::Path;

use clap::Parser;

use vercel_ext::error::VercelError;
use vercel_ext::exit_codes::{self, describe};
use vercel_ext::io::config::{EnvSettings, PROJECT_CONFIG_FILE, load_project_config};
use vercel_ext::io::confirm::TerminalConfirmer;
use vercel_ext::io::input;
use vercel_ext::io::vercel::VercelOptions;
use vercel_ext::{logging, pull};

#[derive(Parser)]
#[command(
    name = "vercel-pull-envs",
    version,
    about = "Link the project to Vercel and pull its environments"
)]
struct Cli {}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    logging::init();
    let _cli = Cli::parse();
    input::init();

    let settings = EnvSettings::from_env();
    let config = load_project_config(Path::new(PROJECT_CONFIG_FILE));
    let code = match pull::run(&settings, &config, VercelOptions::default(), &TerminalConfirmer)
        .await
    {
        Ok(()) => exit_codes::OK,
        Err(err) if matches!(err.downcast_ref::<VercelError>(), Some(VercelError::Aborted)) => {
            eprintln!("{err}");
            eprintln!(
                "\nFailed to set up environment from vercel. Please run 'yarn vercel link' and 'yarn vercel pull' manually."
            );
            exit_codes::OK
        }
        Err(err) => {
            eprintln!("{}", describe(&err));
            exit_codes::for_error(&err)
        }
    };

    input::dispose();
    std::process::exit(code);
}
