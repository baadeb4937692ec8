//! WebShield CLI
//!
//! Developer tooling for the blocking engine: inspect filter lists,
//! classify URLs the way the shell would, and manage the list cache.

use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use shield_core::{ClassificationEngine, RequestDescriptor, ResourceType, VerdictAction};
use shield_lists::{parse_lists, ListFetcher, BUNDLED_RULES};

#[derive(Parser)]
#[command(name = "shield-cli")]
#[command(about = "WebShield filter list and classification tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse filter list files and report category totals
    Parse {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Verbose per-file output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Classify a URL the way the request pipeline would
    Check {
        /// URL to classify
        url: String,

        /// Referrer URL
        #[arg(short, long, default_value = "")]
        referrer: String,

        /// Resource type (script, image, xhr, fetch, sub_frame, ...)
        #[arg(short = 't', long, default_value = "script")]
        resource_type: String,

        /// Filter list files; bundled defaults when omitted
        #[arg(short, long)]
        input: Vec<String>,
    },

    /// Download the subscribed lists into the cache directory
    Fetch {
        /// Cache directory
        #[arg(short, long, default_value = ".webshield-cache")]
        cache_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse { input, verbose } => cmd_parse(&input, verbose),
        Commands::Check {
            url,
            referrer,
            resource_type,
            input,
        } => cmd_check(&url, &referrer, &resource_type, &input),
        Commands::Fetch { cache_dir } => cmd_fetch(cache_dir).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn read_lists(inputs: &[String]) -> Result<Vec<String>, String> {
    if inputs.is_empty() {
        return Ok(vec![BUNDLED_RULES.to_string()]);
    }
    inputs
        .iter()
        .map(|path| fs::read_to_string(path).map_err(|e| format!("Failed to read '{path}': {e}")))
        .collect()
}

fn cmd_parse(inputs: &[String], verbose: bool) -> Result<(), String> {
    let blobs = read_lists(inputs)?;

    if verbose {
        for (path, blob) in inputs.iter().zip(&blobs) {
            let (_, totals) = parse_lists(&[blob]);
            println!(
                "  {path}: {} rules ({} hosts, {} substrings, {} regexes, {} exceptions, {} skipped)",
                totals.rules(),
                totals.host_suffixes,
                totals.substrings,
                totals.regexes,
                totals.exceptions,
                totals.skipped
            );
        }
    }

    let (ruleset, totals) = parse_lists(&blobs);
    println!("Parsed {} rules total:", totals.rules());
    println!("  host suffixes: {}", ruleset.host_suffix_count());
    println!("  substrings:    {}", ruleset.substring_count());
    println!("  regexes:       {}", ruleset.regex_count());
    println!("  exceptions:    {}", ruleset.exception_count());
    println!("  skipped lines: {}", totals.skipped);
    Ok(())
}

fn cmd_check(url: &str, referrer: &str, resource_type: &str, inputs: &[String]) -> Result<(), String> {
    let blobs = read_lists(inputs)?;
    let (ruleset, _) = parse_lists(&blobs);
    let engine = ClassificationEngine::with_ruleset(ruleset);

    let rtype = ResourceType::from_type_str(resource_type);
    let desc = RequestDescriptor::new(url, rtype).with_referrer(referrer);
    let verdict = engine.decide(&desc);

    match &verdict.action {
        VerdictAction::Allow => println!("ALLOW    [{}]", verdict.source.label()),
        VerdictAction::Cancel => println!("CANCEL   [{}]", verdict.source.label()),
        VerdictAction::Redirect(target) => {
            println!("REDIRECT [{}] -> {target}", verdict.source.label())
        }
    }
    if let Some(rule) = &verdict.matched_rule {
        println!("  rule: {rule}");
    }

    for event in engine.recent_blocked() {
        let json = serde_json::to_string(&event).map_err(|e| e.to_string())?;
        println!("  event: {json}");
    }
    Ok(())
}

async fn cmd_fetch(cache_dir: PathBuf) -> Result<(), String> {
    let fetcher = ListFetcher::new(&cache_dir);
    let (ruleset, totals) = fetcher.load_ruleset().await;

    println!("Fetched and parsed {} rules:", totals.rules());
    println!("  host suffixes: {}", ruleset.host_suffix_count());
    println!("  substrings:    {}", ruleset.substring_count());
    println!("  regexes:       {}", ruleset.regex_count());
    println!("  exceptions:    {}", ruleset.exception_count());
    println!("Cache directory: {}", cache_dir.display());
    Ok(())
}
