use clap::Parser;
use veil_cli::commands::{Cmd, Command};

/// Veil CLI
///
/// Veil is a source-level obfuscator that supports conditional-compilation
/// preprocessing, module merging, and obfuscation passes culminating in
/// whole-program control-flow flattening.
#[derive(Parser)]
#[command(name = "veil")]
#[command(about = "Veil: source-level control-flow obfuscator")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

/// Runs the Veil CLI with the provided arguments.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .without_time()
        .init();

    let cli = Cli::parse();
    cli.command.execute()
}
