mod debug_report;

use eventcoder::{Config, Document, EventFinder};
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).with_ansi(cli.color).init();

    if let Err(err) = run(&cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: &CliConfig) -> eventcoder::Result<()> {
    let config = Config::load(&cli.config)?;
    let finder = EventFinder::from_config(&config)?;

    for input in &cli.documents {
        let doc = match input {
            DocumentInput::Path(path) => Document::load(path)?,
            DocumentInput::Stdin => {
                let mut buffer = String::new();
                io::stdin()
                    .read_to_string(&mut buffer)
                    .map_err(|source| eventcoder::Error::Io { path: PathBuf::from("<stdin>"), source })?;
                Document::from_json(&buffer)?
            }
        };
        let run = finder.run(&doc)?;
        if cli.json {
            debug_report::print_json(&doc, &run, finder.catalog())?;
        } else {
            debug_report::print_run(&doc, &run, finder.catalog(), cli.color);
        }
    }
    Ok(())
}

enum DocumentInput {
    Path(PathBuf),
    Stdin,
}

struct CliConfig {
    config: PathBuf,
    documents: Vec<DocumentInput>,
    color: bool,
    json: bool,
    log_level: &'static str,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut config: Option<PathBuf> = None;
    let mut documents = Vec::new();
    let mut color = io::stdout().is_terminal();
    let mut json = false;
    let mut log_level = "warn";
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("eventcoder {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--json" => json = true,
            "-v" | "--verbose" => log_level = if log_level == "warn" { "info" } else { "debug" },
            "-vv" => log_level = "debug",
            "--config" | "-c" => {
                let value = args.next().ok_or_else(|| "error: --config expects a value".to_string())?;
                if config.is_some() {
                    return Err("error: config provided multiple times".to_string());
                }
                config = Some(PathBuf::from(value));
            }
            "-" => documents.push(DocumentInput::Stdin),
            _ if arg.starts_with("--config=") => {
                if config.is_some() {
                    return Err("error: config provided multiple times".to_string());
                }
                config = Some(PathBuf::from(arg.trim_start_matches("--config=")));
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => documents.push(DocumentInput::Path(PathBuf::from(arg))),
        }
    }

    let Some(config) = config else {
        return Err(format!("error: no --config given\n\n{}", help_text()));
    };
    if documents.is_empty() {
        documents.push(DocumentInput::Stdin);
    }
    if documents.iter().filter(|d| matches!(d, DocumentInput::Stdin)).count() > 1 {
        return Err("error: stdin ('-') given more than once".to_string());
    }

    Ok(CliConfig { config, documents, color, json, log_level })
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "eventcoder {version}

Rule-based event coder: finds event mentions in annotated documents.

Usage:
  eventcoder --config <config.json> [OPTIONS] [<document.json>...]

Documents are JSON files; '-' or no document reads one from stdin.

Options:
  -c, --config <path>        Coder configuration (catalogs, manifests, passes).
  --json                     Print surviving events as JSON instead of a report.
  -v, --verbose              Log pattern matches (-v info, -vv debug).
                             RUST_LOG overrides this.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Exit codes:
  0  Success.
  1  Configuration, pattern or document error.
  2  Invalid arguments.
",
        version = env!("CARGO_PKG_VERSION"),
    )
}
