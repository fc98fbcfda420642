//! nx-bind — operator CLI over the nx binding.
//!
//! Four subcommands:
//! - `nx-bind resolve`: print the resolved `nx-cli` path, or every candidate checked
//! - `nx-bind commands`: list mirrored commands and whether they are bound yet
//! - `nx-bind call`: run one mirrored command through the binding
//! - `nx-bind golden`: run a golden manifest and fail on any mismatch

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use nx_bind::command::registry;
use nx_bind::{
    BindingConfig, Client, CommandArgs, GoldenHarness, GoldenManifest,
    GoldenOutcome, Output, Resolver, Support,
};
use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;

/// nx-bind — call nx through its Rust binding and verify golden equivalence.
#[derive(Parser)]
#[command(
    name = "nx-bind",
    version,
    about = "nx-bind — call nx through its Rust binding and verify golden equivalence"
)]
struct Cli {
    /// Path to nx-bind.toml [default: ./nx-bind.toml or ~/.config/nx-bind/nx-bind.toml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Locate the nx-cli executable
    Resolve {
        /// Resolve relative to this source tree instead of the built-in anchor
        #[arg(long)]
        project_root: Option<PathBuf>,
    },
    /// List every mirrored command
    Commands,
    /// Run a mirrored command, e.g. `nx-bind call batch inspect plan --arg b-1 --flag jobs-only`
    Call {
        /// Command path, e.g. `monitor status`
        #[arg(required = true)]
        command: Vec<String>,
        /// Positional value, repeatable, in order
        #[arg(short, long = "arg")]
        args: Vec<String>,
        /// Flag as `name=value`, or bare `name` for a switch; repeatable
        #[arg(short, long = "flag")]
        flags: Vec<String>,
        /// Output format passed to the command
        #[arg(long)]
        format: Option<String>,
        /// Pretty-print structured output
        #[arg(long)]
        pretty: bool,
    },
    /// Run every case of a golden manifest against nx-cli
    Golden {
        /// Path to the TOML manifest
        manifest: PathBuf,
        /// Cases run concurrently
        #[arg(short, long, default_value = "4")]
        jobs: usize,
        /// Resolve nx-cli relative to this source tree
        #[arg(long, conflicts_with = "program")]
        project_root: Option<PathBuf>,
        /// Use this executable instead of resolving nx-cli
        #[arg(long)]
        program: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with env filter (RUST_LOG controls verbosity)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match resolve_config(cli.config)? {
        Some(path) => BindingConfig::load(&path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {:?}: {}", path, e))?,
        None => BindingConfig::default(),
    };

    match cli.command {
        Commands::Resolve { project_root } => run_resolve(project_root, &config)?,
        Commands::Commands => run_commands(),
        Commands::Call {
            command,
            args,
            flags,
            format,
            pretty,
        } => {
            let call = build_call(args, flags, format)?;
            run_call(&config, &command.join(" "), &call, pretty)?;
        }
        Commands::Golden {
            manifest,
            jobs,
            project_root,
            program,
        } => {
            let harness = build_harness(&config, project_root, program)?;
            run_golden(harness, &manifest, jobs).await?;
        }
    }

    Ok(())
}

fn run_resolve(project_root: Option<PathBuf>, config: &BindingConfig) -> Result<()> {
    let resolver = match project_root {
        Some(root) => Resolver::with_project_root(std::path::absolute(root)?)?,
        None => config.resolver()?.unwrap_or_else(Resolver::from_anchor),
    };

    let path = resolver.resolve()?;
    println!("{}", path.display());
    Ok(())
}

fn run_commands() {
    for spec in registry() {
        let status = match spec.support {
            Support::Implemented => "bound",
            Support::Pending => "pending",
        };
        println!("{:<28} {:<8} {}", spec.name(), status, spec.summary);
    }
}

fn run_call(config: &BindingConfig, name: &str, call: &CommandArgs, pretty: bool) -> Result<()> {
    let client = Client::from_config(config)?;
    match client.call(name, call)? {
        Output::Structured(value) if pretty => println!("{}", serde_json::to_string_pretty(&value)?),
        Output::Structured(value) => println!("{}", value),
        Output::Raw(text) => print!("{}", text),
    }
    Ok(())
}

/// Turn repeated `--arg` / `--flag` values into call arguments.
fn build_call(args: Vec<String>, flags: Vec<String>, format: Option<String>) -> Result<CommandArgs> {
    let mut call = CommandArgs::new();
    for value in args {
        call = call.positional(value);
    }
    for flag in flags {
        call = match flag.split_once('=') {
            Some((name, value)) if !name.is_empty() => call.value(name, value),
            Some(_) => anyhow::bail!("flag '{}' has no name", flag),
            None => call.switch(&flag, true),
        };
    }
    if let Some(format) = format {
        call = call.format(format);
    }
    Ok(call)
}

/// Pick the executable for golden runs: explicit program → explicit root →
/// config → built-in anchor.
fn build_harness(
    config: &BindingConfig,
    project_root: Option<PathBuf>,
    program: Option<PathBuf>,
) -> Result<GoldenHarness> {
    let harness = match (program, project_root) {
        (Some(program), _) => GoldenHarness::new(program),
        (None, Some(root)) => {
            GoldenHarness::with_resolver(Resolver::with_project_root(std::path::absolute(root)?)?)
        }
        (None, None) => match config.resolver()? {
            Some(resolver) => GoldenHarness::with_resolver(resolver),
            None => GoldenHarness::resolve(),
        },
    };
    // Fail before any case runs when nothing can be resolved yet
    harness.program()?;
    Ok(harness.with_structured_flag(config.transport.structured_flag.clone()))
}

/// Run all manifest cases on blocking threads, at most `jobs` at a time.
async fn run_golden(harness: GoldenHarness, manifest_path: &Path, jobs: usize) -> Result<()> {
    let manifest = GoldenManifest::load(manifest_path)?;
    let cases = manifest.into_cases()?;
    let total = cases.len();

    tracing::info!(
        program = %harness.program()?.display(),
        cases = total,
        jobs,
        "running golden manifest"
    );

    let harness = Arc::new(harness);
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let mut handles = Vec::with_capacity(total);

    for case in cases {
        let harness = harness.clone();
        let sem = semaphore.clone();
        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await;
            tokio::task::spawn_blocking(move || harness.run(&case)).await
        }));
    }

    let (mut passed, mut failed, mut skipped) = (0usize, 0usize, 0usize);
    for handle in handles {
        let report = handle.await??;
        match report.outcome {
            GoldenOutcome::Pass => passed += 1,
            GoldenOutcome::Fail { .. } => failed += 1,
            GoldenOutcome::Abstain { .. } => skipped += 1,
        }
        println!("{}", report);
    }

    println!("\n{} passed, {} failed, {} skipped", passed, failed, skipped);
    if failed > 0 {
        anyhow::bail!("{} of {} golden case(s) failed", failed, total);
    }
    Ok(())
}

/// Resolve config file path: explicit flag → ./nx-bind.toml → ~/.config/nx-bind/nx-bind.toml.
///
/// Returns `None` when no file exists; built-in defaults apply then.
fn resolve_config(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            anyhow::bail!("Config file {:?} does not exist", path);
        }
        return Ok(Some(path));
    }

    let local = Path::new("nx-bind.toml");
    if local.exists() {
        return Ok(Some(local.to_path_buf()));
    }

    if let Some(config_dir) = dirs::config_dir() {
        let xdg = config_dir.join("nx-bind").join("nx-bind.toml");
        if xdg.exists() {
            return Ok(Some(xdg));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nx_bind::FlagValue;

    #[test]
    fn test_build_call_parses_flags() {
        let call = build_call(
            vec!["b-1".to_string()],
            vec!["jobs-only".to_string(), "sort=dependency".to_string()],
            Some("human".to_string()),
        )
        .unwrap();
        assert_eq!(call.positionals(), ["b-1"]);
        assert_eq!(call.get_flag("jobs_only"), Some(&FlagValue::Switch(true)));
        assert_eq!(
            call.get_flag("sort"),
            Some(&FlagValue::Value("dependency".to_string()))
        );
        assert_eq!(call.get_format(), Some("human"));
    }

    #[test]
    fn test_build_call_rejects_nameless_flag() {
        assert!(build_call(vec![], vec!["=x".to_string()], None).is_err());
    }

    #[test]
    fn test_relative_project_root_flag_made_absolute() {
        let relative = PathBuf::from("no-such-nx-tree");
        let absolute = std::path::absolute(&relative).unwrap();
        let err = build_harness(&BindingConfig::default(), Some(relative), None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("not found"), "{}", msg);
        assert!(msg.contains(&absolute.display().to_string()), "{}", msg);
    }

    #[test]
    fn test_cli_parses_call() {
        let cli = Cli::try_parse_from([
            "nx-bind", "call", "batch", "inspect", "plan", "--arg", "b-1", "--flag", "dag-only",
        ])
        .unwrap();
        match cli.command {
            Commands::Call { command, args, flags, .. } => {
                assert_eq!(command, ["batch", "inspect", "plan"]);
                assert_eq!(args, ["b-1"]);
                assert_eq!(flags, ["dag-only"]);
            }
            _ => panic!("expected call"),
        }
    }
}
