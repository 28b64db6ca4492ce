use std::panic;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use taskdeck::{
    cli::{self, RootCommand},
    logging::{init_logging, print_log_location},
    settings::Settings,
};

#[derive(Parser, Debug)]
#[command(
    name = "taskdeck",
    about = "Manage a personal task list kept on a remote task service",
    long_about = "A command-line client for a remote task service: sign in, then create, edit, complete, filter, paginate and delete tasks and manage their categories.",
    version = env!("TASKDECK_BUILD_VERSION"),
    author
)]
struct Cli {
    /// Emit a JSON envelope instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    quiet: bool,

    /// Base URL of the task service, e.g. http://127.0.0.1:8000/api
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: RootCommand,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = match init_logging() {
        Ok(path) => Some(path),
        Err(err) => {
            if !cli.quiet {
                eprintln!("warning: failed to initialize logging: {err:#}");
            }
            None
        }
    };
    if let Some(path) = log_path.as_ref() {
        install_panic_hook_with_log(path.clone());
    }

    let settings = Settings::load().with_overrides(cli.api_url.as_deref());
    let code = cli::run(&settings, cli.command, cli.json, cli.quiet).await;

    if code != 0
        && !cli.json
        && let Some(path) = log_path.as_ref()
    {
        print_log_location(path);
    }
    std::process::exit(code);
}

fn install_panic_hook_with_log(log_path: PathBuf) {
    let previous_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        print_log_location(&log_path);
        previous_hook(panic_info);
    }));
}
