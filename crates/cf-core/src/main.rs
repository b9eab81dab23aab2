use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cf_core::config::Config;
use cf_core::context::ContextStore;
use cf_core::session::Session;
use cf_core::shell::run_shell;
use cf_core::state::SessionState;
use cf_core::style::Console;
use cf_core::terminal::LineEditor;

/// Coffee: a terminal assistant that turns requests into shell actions.
#[derive(Parser)]
#[command(name = "coffee", disable_version_flag = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the interactive shell.
    Hi,
    /// Forget the stored conversation and command history.
    Reset,
    /// Print the version.
    Version,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("COFFEE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let config = Config::load_or_default();

    match cli.command {
        Command::Version => {
            println!("Coffee Terminal Assistant v{}", env!("CARGO_PKG_VERSION"));
        }
        Command::Reset => {
            let store = ContextStore::from_config(&config.context);
            if let Err(e) = store.clear() {
                eprintln!("error: failed to clear {}: {e}", store.path().display());
                std::process::exit(1);
            }
            println!("Conversation memory cleared.");
        }
        Command::Hi => {
            if let Err(e) = start_shell(&config) {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn start_shell(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("failed to create async runtime: {e}"))?;
    let model = config.backend.build_client()?;
    let input = LineEditor::new()?;
    let state = SessionState::from_process()?;
    let store = ContextStore::from_config(&config.context);
    tracing::debug!(model = model.model(), context = %store.path().display(), "starting shell");

    let mut session = Session::new(model, input, Console::stdout(), state, store, config);
    run_shell(&mut session, runtime.handle());
    Ok(())
}
