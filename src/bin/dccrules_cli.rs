//! DCC Rules CLI - specification check, generation and export
//!
//! Commands: example, check, generate, share, open, download
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on validation failure

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dccrules_core::{
    encode, encode_to_shareable_url, initial_input_text, reference_pipeline, Derivation,
    ExportChannel, ENGINE_VERSION,
    example::example_spec_text,
    export::{CommandClipboard, DirectorySink},
};

const EXIT_VALIDATION_FAILURE: u8 = 2;

#[derive(Parser)]
#[command(name = "dccrules-cli")]
#[command(about = "DCC Rules CLI - validate vaccination rule specifications and generate rules")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Origin used when building share links
    #[arg(long, global = true, env = "DCC_RULES_ORIGIN", default_value = "http://localhost:1234")]
    origin: String,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the bundled example specification
    Example,

    /// Validate a specification
    Check {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print the generated tests.json
    Generate {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Build a share link for a specification
    Share {
        #[command(flatten)]
        source: SourceArgs,

        /// Copy the link to the clipboard
        #[arg(long)]
        copy: bool,

        /// Clipboard program reading from stdin (detected when omitted)
        #[arg(long, env = "DCC_RULES_CLIPBOARD")]
        clipboard_program: Option<String>,
    },

    /// Print the specification text a share link opens with
    Open {
        /// Share link or query string
        url: String,
    },

    /// Save the generated rules as tests.json
    Download {
        #[command(flatten)]
        source: SourceArgs,

        /// Directory to save into
        #[arg(short, long, env = "DCC_RULES_OUT_DIR", default_value = ".")]
        out_dir: PathBuf,
    },
}

/// Where the specification text comes from. Defaults to the bundled example.
#[derive(Args)]
struct SourceArgs {
    /// Read the specification from a file
    #[arg(short, long, conflicts_with_all = ["text", "url"])]
    file: Option<PathBuf>,

    /// Specification text
    #[arg(long, conflicts_with = "url")]
    text: Option<String>,

    /// Share link carrying the specification
    #[arg(long)]
    url: Option<String>,
}

impl SourceArgs {
    fn read(&self) -> std::io::Result<String> {
        if let Some(path) = &self.file {
            return std::fs::read_to_string(path);
        }
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        Ok(initial_input_text(self.url.as_deref()))
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,dccrules_core={level},dccrules_cli={level}"))
    });

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn print_json(value: &Value) {
    println!("{}", encode(value));
}

fn report(derivation: &Derivation) -> Value {
    json!({
        "valid": derivation.is_valid(),
        "errors": derivation.errors(),
        "display": derivation.validation.display(),
        "ruleCount": derivation.artifact().map_or(0, |rules| rules.len()),
        "engineVersion": ENGINE_VERSION,
    })
}

/// Read the source and derive it, printing failures as JSON
fn derive_source(source: &SourceArgs) -> Result<Derivation, ExitCode> {
    let text = source.read().map_err(|e| {
        print_json(&json!({"error": format!("Failed to read specification: {}", e)}));
        ExitCode::FAILURE
    })?;

    reference_pipeline().derive(&text).map_err(|e| {
        print_json(&json!({"error": e.to_string()}));
        ExitCode::FAILURE
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            println!("{}", example_spec_text());
            ExitCode::SUCCESS
        }

        Commands::Check { source } => {
            let derivation = match derive_source(&source) {
                Ok(d) => d,
                Err(code) => return code,
            };
            print_json(&report(&derivation));
            if derivation.is_valid() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_VALIDATION_FAILURE)
            }
        }

        Commands::Generate { source } => {
            let derivation = match derive_source(&source) {
                Ok(d) => d,
                Err(code) => return code,
            };
            match derivation.tests_json() {
                Some(tests) => {
                    println!("{}", tests);
                    ExitCode::SUCCESS
                }
                None => {
                    print_json(&report(&derivation));
                    ExitCode::from(EXIT_VALIDATION_FAILURE)
                }
            }
        }

        Commands::Share { source, copy, clipboard_program } => {
            let text = match source.read() {
                Ok(t) => t,
                Err(e) => {
                    print_json(&json!({"error": format!("Failed to read specification: {}", e)}));
                    return ExitCode::FAILURE;
                }
            };

            if !copy {
                return match encode_to_shareable_url(&cli.origin, &text) {
                    Ok(url) => {
                        print_json(&json!({"url": url, "copied": false}));
                        ExitCode::SUCCESS
                    }
                    Err(e) => {
                        print_json(&json!({"error": e.to_string()}));
                        ExitCode::FAILURE
                    }
                };
            }

            let clipboard = match clipboard_program {
                Some(program) => CommandClipboard::new(program, vec![]),
                None => CommandClipboard::detect(),
            };
            debug!(program = clipboard.program(), "using clipboard program");
            let channel = ExportChannel::new(Box::new(clipboard), Box::new(DirectorySink::new(".")));

            match channel.share(&cli.origin, &text).await {
                Ok((url, _)) => {
                    print_json(&json!({"url": url, "copied": true}));
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    print_json(&json!({"copied": false, "error": e.to_string()}));
                    ExitCode::FAILURE
                }
            }
        }

        Commands::Open { url } => {
            println!("{}", initial_input_text(Some(&url)));
            ExitCode::SUCCESS
        }

        Commands::Download { source, out_dir } => {
            let derivation = match derive_source(&source) {
                Ok(d) => d,
                Err(code) => return code,
            };
            if !derivation.is_valid() {
                print_json(&report(&derivation));
                return ExitCode::from(EXIT_VALIDATION_FAILURE);
            }

            let clipboard = CommandClipboard::detect();
            let channel = ExportChannel::new(Box::new(clipboard), Box::new(DirectorySink::new(out_dir)));

            // No dialog here: an unsaved file means the directory sink failed
            match channel.download(&derivation).await.and_then(|ack| ack.receipt) {
                Some(receipt) => {
                    print_json(&json!({"saved": true, "receipt": receipt}));
                    ExitCode::SUCCESS
                }
                None => {
                    print_json(&json!({"saved": false}));
                    ExitCode::FAILURE
                }
            }
        }
    }
}
