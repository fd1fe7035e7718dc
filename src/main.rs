use anyhow::{Context, Result};
use clap::Parser;
use enhancers::cli::{self, Command, OutputFormat};
use enhancers::output::{self, AppliedStacktrace, ApplyInput, BaseSummary};
use enhancers::{keep_profiling_rules, EngineConfig, Enhancer, FrameComponent, GroupingVariant};
use rayon::prelude::*;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Read a file, or stdin when the path is "-".
fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))
}

fn emit(args: &cli::Args, text: &str) -> Result<()> {
    match &args.output {
        Some(path) => fs::write(path, text).with_context(|| format!("Failed to write {path}")),
        None => {
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
            Ok(())
        }
    }
}

fn run_encode(enhancer: &Enhancer, args: &cli::Args, file: &str, bases: &[String], id: Option<&str>) -> Result<String> {
    let text = read_input(file)?;
    let set = enhancer
        .from_config_string(&text, bases.iter().cloned(), id)
        .with_context(|| format!("Invalid rules in {file}"))?;
    let encoded = set.base64_string()?;
    Ok(match args.format {
        OutputFormat::Json => output::to_json(&serde_json::json!({ "encoded": encoded }))?,
        OutputFormat::Terminal => encoded.to_string(),
    })
}

fn run_decode(enhancer: &Enhancer, args: &cli::Args, encoded: &str) -> Result<String> {
    // Accept the blob itself, a file holding it, or stdin
    let encoded = if encoded == "-" || Path::new(encoded).is_file() {
        read_input(encoded)?
    } else {
        encoded.to_string()
    };
    let set = enhancer.loads(&encoded).context("Invalid encoded rule set")?;
    match args.format {
        OutputFormat::Json => output::to_json(&set.as_dict(true)),
        OutputFormat::Terminal => Ok(output::format_enhancements_terminal(&set)),
    }
}

fn run_apply(
    enhancer: &Enhancer,
    args: &cli::Args,
    config: &str,
    input: &str,
    bases: &[String],
    variant: GroupingVariant,
) -> Result<String> {
    let text = read_input(config)?;
    let set = enhancer
        .from_config_string(&text, bases.iter().cloned(), None)
        .with_context(|| format!("Invalid rules in {config}"))?;
    let stacktraces: ApplyInput = serde_json::from_str(&read_input(input)?)
        .with_context(|| format!("Invalid stacktrace JSON in {input}"))?;
    let stacktraces = stacktraces.into_vec();
    debug!("Applying {} rules to {} stacktraces", set.effective_rules().count(), stacktraces.len());

    let results: Vec<AppliedStacktrace> = stacktraces
        .into_par_iter()
        .map(|stacktrace| {
            let mut frames = stacktrace.frames;
            let platform = stacktrace.platform.as_deref();
            let exception = stacktrace.exception.unwrap_or_default();
            set.apply_category_and_updated_in_app_to_frames(&mut frames, platform, &exception);
            let components = frames.iter().map(|f| FrameComponent::for_frame(f, true)).collect();
            let component = set.assemble_stacktrace_component(variant, components, &frames, platform, Some(&exception));
            AppliedStacktrace { frames, component }
        })
        .collect();

    match args.format {
        OutputFormat::Json => output::to_json(&results),
        OutputFormat::Terminal => Ok(output::format_applied_terminal(&results)),
    }
}

fn run_profiling(args: &cli::Args, file: &str) -> Result<String> {
    let filtered = keep_profiling_rules(&read_input(file)?);
    Ok(match args.format {
        OutputFormat::Json => {
            let rules: Vec<&str> = filtered.lines().collect();
            output::to_json(&serde_json::json!({ "rules": rules }))?
        }
        OutputFormat::Terminal => filtered,
    })
}

fn run_bases(enhancer: &Enhancer, args: &cli::Args) -> Result<String> {
    let bases: Vec<BaseSummary> = enhancer
        .registry()
        .ids()
        .into_iter()
        .filter_map(|id| enhancer.base(id))
        .map(|set| BaseSummary {
            id: set.id().unwrap_or_default().to_string(),
            rules: set.rules().len(),
            latest: set.as_dict(false).latest,
        })
        .collect();
    match args.format {
        OutputFormat::Json => output::to_json(&bases),
        OutputFormat::Terminal => Ok(output::format_bases_terminal(&bases)),
    }
}

fn main() -> Result<()> {
    let args = cli::Args::parse();

    // Use RUST_LOG env var if set, otherwise use verbose flag
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if args.verbose {
        EnvFilter::new("enhancers=debug")
    } else {
        EnvFilter::new("enhancers=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .init();

    debug!("Logging initialized (verbose={})", args.verbose);

    let config = EngineConfig::default()
        .with_cache_capacity(args.cache_capacity)
        .with_stack_direction(args.stack_direction);
    let enhancer = Enhancer::new(config).context("Failed to initialize the rule engine")?;

    let text = match &args.command {
        Command::Encode { file, bases, id } => run_encode(&enhancer, &args, file, bases, id.as_deref())?,
        Command::Decode { encoded } => run_decode(&enhancer, &args, encoded)?,
        Command::Apply { config, input, bases, variant } => {
            run_apply(&enhancer, &args, config, input, bases, *variant)?
        }
        Command::Profiling { file } => run_profiling(&args, file)?,
        Command::Bases => run_bases(&enhancer, &args)?,
    };

    emit(&args, &text)
}
