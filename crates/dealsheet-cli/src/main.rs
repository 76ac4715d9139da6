mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dealsheet",
    version,
    about = "Extract and value healthcare real-estate due-diligence workbooks"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract statements, valuation entries and portfolio rollups from an xlsx workbook
    Extract {
        /// Path to the .xlsx workbook
        input_file: PathBuf,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Write the full result to a JSON file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,

        /// Extraction options JSON file
        #[arg(short, long = "config", value_name = "FILE")]
        config: Option<PathBuf>,

        /// Print every line item instead of the per-facility summary
        #[arg(long)]
        lines: bool,
    },
    /// Show the sheet type assigned to each worksheet
    Classify {
        /// Path to the .xlsx workbook
        input_file: PathBuf,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Show every vocabulary's score, not just the winner
        #[arg(long)]
        verbose: bool,
    },
    /// Run the valuation engine on a JSON request
    Value {
        /// Request file: {"inputs": {...}, "methods": [...], "sensitivity": {...}}
        request_file: PathBuf,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the default extraction options as JSON
    Show,
    /// Validate an extraction options file
    Validate {
        /// Path to options JSON file
        file: PathBuf,
    },
    /// Print the sheet-classifier vocabulary
    Vocabulary,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract {
            input_file,
            output,
            out,
            config,
            lines,
        } => commands::extract::run(input_file, &output, out, config, lines),
        Commands::Classify {
            input_file,
            output,
            verbose,
        } => commands::classify::run(input_file, &output, verbose),
        Commands::Value {
            request_file,
            output,
        } => commands::value::run(request_file, &output),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(),
            ConfigAction::Validate { file } => commands::config::validate(&file),
            ConfigAction::Vocabulary => commands::config::vocabulary(),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
