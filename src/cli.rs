use crate::config::DEFAULT_CACHE_CAPACITY;
use crate::types::{GroupingVariant, StackDirection};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "enhancers")]
#[command(about = "Parse, encode and apply stacktrace enhancement rules")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Output format (json, terminal)
    #[arg(short, long, default_value = "terminal")]
    pub format: OutputFormat,

    /// Write output to file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Frame order of stacktrace input (innermost-first, outermost-first)
    #[arg(long, default_value = "innermost-first")]
    pub stack_direction: StackDirection,

    /// Number of parsed rule sets kept in memory
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY)]
    pub cache_capacity: usize,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile a rule file into its base64 form
    Encode {
        /// Rule file, or "-" for stdin
        file: String,

        /// Base rule set to layer the rules on (repeatable)
        #[arg(short, long = "base")]
        bases: Vec<String>,

        /// Identifier of the rule set
        #[arg(long)]
        id: Option<String>,
    },

    /// Show the rules of an encoded rule set
    Decode {
        /// Encoded rule set, or "-" for stdin
        encoded: String,
    },

    /// Apply a rule file to stacktraces given as JSON
    Apply {
        /// Rule file
        config: String,

        /// JSON file with one stacktrace or a list of them, or "-" for stdin
        #[arg(short, long)]
        input: String,

        /// Base rule set to layer the rules on (repeatable)
        #[arg(short, long = "base")]
        bases: Vec<String>,

        /// Grouping variant (app, system)
        #[arg(long, default_value = "app")]
        variant: GroupingVariant,
    },

    /// Keep only the rules usable for profiling
    Profiling {
        /// Rule file, or "-" for stdin
        file: String,
    },

    /// List the built-in base rule sets
    Bases,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output for machine consumption
    Json,
    /// Human-readable terminal output
    Terminal,
}
