use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};

use archdiag_core::{Fixer, Graph, Severity, ValidationResult, Validator, DEFAULT_MAX_ITERATIONS};
use archdiag_llm::{settings, AiSettings, LlmCollaborator};

#[derive(Parser, Debug)]
#[command(name = "archdiag", version, about = "Validate and repair architecture diagrams")]
struct Cli {
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a diagram and list its issues
    Validate {
        file: PathBuf,
        /// Treat warnings as invalidating
        #[arg(long)]
        strict: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Repair a diagram and print the outcome as JSON
    Fix {
        file: PathBuf,
        /// Skip the LLM and use heuristics only
        #[arg(long)]
        no_llm: bool,
        #[arg(long, default_value_t = DEFAULT_MAX_ITERATIONS)]
        max_iterations: usize,
        #[arg(long)]
        strict: bool,
        /// Write the repaired graph here instead of embedding it in the output
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the JSON Schema of the diagram format
    Schema,
    /// Inspect or change LLM settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Show,
    Set {
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Read a diagram file. A JSON `null` document is an absent diagram.
fn load_graph(path: &Path) -> Result<Option<Graph>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn print_issues(result: &ValidationResult) {
    println!("{}", result.summary());
    for issue in &result.issues {
        let marker = match issue.severity {
            Severity::Error => "error",
            Severity::Warning => "warn ",
            Severity::Info => "info ",
        };
        println!("  {} {}: {}", marker, issue.code, issue.message);
        if let Some(suggestion) = &issue.suggestion {
            println!("        -> {}", suggestion);
        }
    }
}

fn cmd_validate(file: &Path, strict: bool, json: bool) -> Result<ExitCode> {
    let graph = load_graph(file)?;
    let validator = if strict { Validator::strict() } else { Validator::new() };
    let result = validator.validate_opt(graph.as_ref());

    if json {
        println!("{}", serde_json::to_string_pretty(&result.to_dict())?);
    } else {
        print_issues(&result);
    }

    match result.into_error_report() {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(report) => {
            if !json {
                eprintln!("{}", report);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn collaborator(no_llm: bool) -> Option<LlmCollaborator> {
    if no_llm {
        return None;
    }
    match LlmCollaborator::from_env() {
        Ok(c) => Some(c),
        Err(e) => {
            tracing::warn!(error = %e, "LLM unavailable, repairing with heuristics only");
            None
        }
    }
}

fn cmd_fix(file: &Path, no_llm: bool, max_iterations: usize, strict: bool, output: Option<&Path>) -> Result<ExitCode> {
    let Some(graph) = load_graph(file)? else {
        let result = Validator::new().validate_opt(None);
        let out = serde_json::json!({ "validation": result.to_dict(), "fix": null });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(ExitCode::FAILURE);
    };

    let llm = collaborator(no_llm);
    let mut fixer = Fixer::new().max_iterations(max_iterations).strict(strict);
    if let Some(llm) = &llm {
        fixer = fixer.collaborator(llm);
    }
    let (fixed, validation, result) = fixer.validate_and_fix(&graph);

    let mut out = serde_json::json!({
        "validation": validation.to_dict(),
        "fix": result.to_dict(),
    });
    match output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&fixed)?;
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote repaired graph");
        }
        None => out["graph"] = serde_json::to_value(&fixed)?,
    }
    println!("{}", serde_json::to_string_pretty(&out)?);

    Ok(if result.success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn cmd_schema() -> Result<ExitCode> {
    let schema = schemars::schema_for!(Graph);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(ExitCode::SUCCESS)
}

fn cmd_config(action: ConfigAction) -> Result<ExitCode> {
    match action {
        ConfigAction::Show => {
            let path = settings::settings_path()?;
            let current = AiSettings::load()?;
            println!("file:       {}", path.display());
            println!("provider:   {}", current.provider);
            println!("model:      {}", current.model);
            println!("apiKey:     {}", current.masked_api_key());
            println!("baseUrl:    {}", current.base_url.as_deref().unwrap_or("-"));
            println!("timeout:    {}s", current.timeout_secs);
            println!("configured: {}", current.ai_configured());
        }
        ConfigAction::Set {
            provider,
            model,
            api_key,
            base_url,
            timeout_secs,
        } => {
            let mut current = settings::read_settings()?;
            if let Some(provider) = provider {
                archdiag_llm::engine::map_backend(&provider)?;
                current.provider = provider;
            }
            if let Some(model) = model {
                current.model = model;
            }
            if let Some(key) = api_key {
                current.api_key = key;
            }
            if let Some(url) = base_url {
                current.base_url = Some(url).filter(|u| !u.is_empty());
            }
            if let Some(secs) = timeout_secs {
                current.timeout_secs = secs;
            }
            let path = settings::write_settings(&current)?;
            println!("saved {}", path.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Validate { file, strict, json } => cmd_validate(&file, strict, json),
        Command::Fix {
            file,
            no_llm,
            max_iterations,
            strict,
            output,
        } => cmd_fix(&file, no_llm, max_iterations, strict, output.as_deref()),
        Command::Schema => cmd_schema(),
        Command::Config { action } => cmd_config(action),
    }
}
