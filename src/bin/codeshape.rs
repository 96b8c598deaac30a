//! Command-line interface for codeshape
//! Tokenizes and outlines source files with the built-in grammars.
//!
//! Usage:
//!   codeshape outline `<path>` [--language `<lang>`] [--format `<format>`]  - Print the element tree
//!   codeshape tokens `<path>` [--language `<lang>`]                        - Print the token stream as JSON
//!   codeshape find `<path>` --name `<name>`                                - Locate an element by name
//!   codeshape at `<path>` --line `<n>`                                     - Innermost element at a line
//!   codeshape languages                                                  - List registered grammars
//!   codeshape config                                                     - Print the effective configuration
//!
//! Logging goes to stderr and is controlled by `CODESHAPE_LOG` (an `EnvFilter` directive,
//! `warn` when unset).

use clap::{Parser, Subcommand};
use codeshape::grammar::config::{CodeshapeConfig, Loader};
use codeshape::grammar::formats::{render, Format, RenderOptions};
use codeshape::grammar::{ElementId, GrammarError, LanguageRegistry, Outline, Result, TokenParser};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "codeshape",
    version,
    about = "Outline the structure of source files"
)]
struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override a configuration key, e.g. `--set parsing.tab_width=8`
    #[arg(long = "set", global = true, value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the element tree of a file
    Outline {
        path: PathBuf,
        /// Language name; inferred from the file extension when omitted
        #[arg(short, long)]
        language: Option<String>,
        /// Output format: treeviz, json or yaml
        #[arg(short, long)]
        format: Option<Format>,
    },
    /// Print the token stream of a file as JSON
    Tokens {
        path: PathBuf,
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Locate an element by name
    Find {
        path: PathBuf,
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Show the innermost element containing a line
    At {
        path: PathBuf,
        #[arg(long)]
        line: usize,
        #[arg(short, long)]
        language: Option<String>,
    },
    /// List registered languages and their extensions
    Languages,
    /// Print the effective configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CODESHAPE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<CodeshapeConfig> {
    let mut loader = Loader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    loader = loader.with_env();
    for assignment in &cli.overrides {
        loader = loader.set_assignment(assignment)?;
    }
    loader.build()
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let registry = LanguageRegistry::with_defaults();

    match &cli.command {
        Command::Outline {
            path,
            language,
            format,
        } => {
            let outline = parse_file(&registry, &config, path, language.as_deref())?;
            let options = RenderOptions {
                show_line_numbers: config.output.show_line_numbers,
                include_code: false,
            };
            let rendered = render(&outline, format.unwrap_or(config.output.format), &options)?;
            print!("{}", rendered);
            if !rendered.ends_with('\n') {
                println!();
            }
        }
        Command::Tokens { path, language } => {
            let source = config.limits.read_source(path)?;
            let parser = parser_for(&registry, &config, path, language.as_deref())?;
            let tokens = parser.tokenize(&source);
            let json = serde_json::to_string_pretty(&tokens).map_err(|e| GrammarError::Render {
                format: "json".to_string(),
                message: e.to_string(),
            })?;
            println!("{}", json);
        }
        Command::Find {
            path,
            name,
            language,
        } => {
            let outline = parse_file(&registry, &config, path, language.as_deref())?;
            let matches: Vec<_> = outline
                .walk()
                .into_iter()
                .filter(|&id| outline[id].name == *name)
                .collect();
            if matches.is_empty() {
                println!("No element named '{}'", name);
            }
            for id in matches {
                print_element(&outline, id);
            }
        }
        Command::At {
            path,
            line,
            language,
        } => {
            let outline = parse_file(&registry, &config, path, language.as_deref())?;
            match outline.element_at_line(*line) {
                Some(id) => print_element(&outline, id),
                None => println!("No element at line {}", line),
            }
        }
        Command::Languages => {
            println!("Available languages:\n");
            for name in registry.languages() {
                if let Some(grammar) = registry.get(&name) {
                    println!("  {}", name);
                    if !grammar.aliases().is_empty() {
                        println!("    aliases: {}", grammar.aliases().join(", "));
                    }
                    println!("    extensions: {}", grammar.extensions().join(", "));
                    println!();
                }
            }
        }
        Command::Config => {
            let yaml = serde_yaml::to_string(&config).map_err(|e| GrammarError::Render {
                format: "yaml".to_string(),
                message: e.to_string(),
            })?;
            print!("{}", yaml);
        }
    }
    Ok(())
}

fn parser_for(
    registry: &LanguageRegistry,
    config: &CodeshapeConfig,
    path: &Path,
    language: Option<&str>,
) -> Result<TokenParser> {
    let grammar = match language {
        Some(name) => registry.resolve(name)?,
        None => registry.for_path(path).ok_or_else(|| {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            GrammarError::UnknownLanguage(format!(".{}", ext))
        })?,
    };
    debug!(language = grammar.name(), path = %path.display(), "selected grammar");
    TokenParser::with_options(grammar, config.parse_options())
}

fn parse_file(
    registry: &LanguageRegistry,
    config: &CodeshapeConfig,
    path: &Path,
    language: Option<&str>,
) -> Result<Outline> {
    let source = config.limits.read_source(path)?;
    let parser = parser_for(registry, config, path, language)?;
    Ok(parser.parse(&source))
}

fn print_element(outline: &Outline, id: ElementId) {
    let element = &outline[id];
    println!(
        "{} {} lines {}-{}",
        element.element_type,
        outline.full_name(id),
        element.start_line,
        element.end_line
    );
    for (key, value) in &element.metadata {
        println!("    {}: {}", key, value);
    }
}
