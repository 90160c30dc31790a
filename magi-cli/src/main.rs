use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use magi_core::UnitRoster;
use magi_engine::{analyst, slots_from_env, AnalysisInput, DecisionParser, MergeMode, Orchestrator};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::{info, Level};

/// MAGI consensus CLI
///
/// Runs the same units as the server from the command line and prints JSON
/// to stdout. Credentials come from the usual `*_API_KEY` variables.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Judge unit for integration and synthesis
    #[arg(short = 'j', long, global = true, default_value = "mary")]
    judge: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask every unit and merge the answers
    Consensus {
        #[arg(short, long)]
        prompt: String,

        /// consensus, integration or synthesis
        #[arg(short, long, default_value = "consensus")]
        mode: String,

        /// Reference document prepended to the prompt
        #[arg(long)]
        context_file: Option<PathBuf>,
    },

    /// BUY/HOLD/SELL decision from every analyst unit
    Analyze {
        #[arg(short, long)]
        symbol: String,

        /// JSON file with market data
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Free-form context for the analysts
        #[arg(short, long)]
        context: Option<String>,

        /// File with investment principles
        #[arg(long)]
        constitution: Option<PathBuf>,
    },

    /// Ask a single unit a question
    Ask {
        #[arg(short, long)]
        unit: String,

        #[arg(short, long)]
        question: String,

        /// Custom system prompt
        #[arg(long)]
        system: Option<String>,
    },

    /// Health check of every unit
    Health,
}

impl Args {
    /// Parse log level from string
    fn parse_log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "error" => Level::ERROR,
            _ => Level::WARN,
        }
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Market data from a JSON file, `null` when no file is given
fn load_market_data(path: Option<&Path>) -> Result<Value> {
    let Some(path) = path else {
        return Ok(Value::Null);
    };
    serde_json::from_str(&read_file(path)?)
        .with_context(|| format!("{} is not valid JSON", path.display()))
}

fn build_orchestrator(judge: &str, context: Option<String>) -> Result<Orchestrator> {
    let roster = UnitRoster::magi_default().with_judge(Some(judge.to_string()));
    if roster.get(judge).is_none() {
        bail!("Unknown judge unit '{}', expected one of {:?}", judge, roster.unit_ids());
    }

    Ok(Orchestrator::new(slots_from_env(&roster))
        .with_judge_unit(Some(judge))
        .with_reference_context(context))
}

async fn run(args: Args) -> Result<Value> {
    match args.command {
        Command::Consensus {
            prompt,
            mode,
            context_file,
        } => {
            let mode: MergeMode = mode.parse().map_err(|e: String| anyhow!(e))?;
            let context = context_file.as_deref().map(read_file).transpose()?;
            let orchestrator = build_orchestrator(&args.judge, context)?;

            let response = orchestrator.run_consensus(&prompt, mode).await?;
            Ok(serde_json::to_value(&response)?)
        }

        Command::Analyze {
            symbol,
            data,
            context,
            constitution,
        } => {
            let mut input = AnalysisInput::new(symbol, load_market_data(data.as_deref())?);
            input.context = context;
            input.constitution = constitution.as_deref().map(read_file).transpose()?;

            let orchestrator = build_orchestrator(&args.judge, None)?;
            let analysis = orchestrator
                .run_panel_analysis(&DecisionParser::default(), &input)
                .await;
            info!("{}/{} units answered", analysis.valid_count(), analysis.results.len());
            Ok(serde_json::to_value(&analysis)?)
        }

        Command::Ask {
            unit,
            question,
            system,
        } => {
            let orchestrator = build_orchestrator(&args.judge, None)?;
            let slot = orchestrator
                .slot(&unit)
                .ok_or_else(|| anyhow!("Unknown unit '{}'", unit))?;
            let provider = slot
                .provider
                .as_ref()
                .ok_or_else(|| anyhow!("Unit '{}' has no API key configured", unit))?;

            let answer = analyst::ask_question(provider.as_ref(), &question, system.as_deref()).await?;
            Ok(json!({
                "unit": unit,
                "provider": provider.name(),
                "answer": answer,
            }))
        }

        Command::Health => {
            let orchestrator = build_orchestrator(&args.judge, None)?;
            let mut units = Map::new();
            for (unit, report) in orchestrator.health_check_all().await {
                units.insert(unit, serde_json::to_value(report)?);
            }
            Ok(Value::Object(units))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr, stdout carries the JSON result
    tracing_subscriber::fmt()
        .with_max_level(args.parse_log_level())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("🚀 MAGI CLI");

    let output = run(args).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_consensus() {
        let args = Args::try_parse_from([
            "magi",
            "consensus",
            "--prompt",
            "Should I buy AAPL?",
            "--mode",
            "synthesis",
        ])
        .unwrap();

        match args.command {
            Command::Consensus { prompt, mode, context_file } => {
                assert_eq!(prompt, "Should I buy AAPL?");
                assert_eq!(mode, "synthesis");
                assert!(context_file.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(args.judge, "mary");
    }

    #[test]
    fn test_parse_ask_with_global_flags() {
        let args = Args::try_parse_from([
            "magi", "ask", "--unit", "casper", "--question", "Why?", "--log-level", "debug",
        ])
        .unwrap();

        assert!(matches!(args.command, Command::Ask { ref unit, .. } if unit == "casper"));
        assert_eq!(args.parse_log_level(), Level::DEBUG);
    }

    #[test]
    fn test_missing_subcommand_rejected() {
        assert!(Args::try_parse_from(["magi"]).is_err());
    }

    #[test]
    fn test_load_market_data() {
        assert_eq!(load_market_data(None).unwrap(), Value::Null);

        let path = std::env::temp_dir().join(format!("magi-data-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"price": 190.5, "per": 28.1}"#).unwrap();
        let data = load_market_data(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(data["price"], 190.5);
    }

    #[test]
    fn test_invalid_market_data() {
        let path = std::env::temp_dir().join(format!("magi-bad-{}.json", std::process::id()));
        std::fs::write(&path, "price=190").unwrap();
        let err = load_market_data(Some(&path)).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert!(err.to_string().contains("is not valid JSON"));
    }

    #[test]
    fn test_unknown_judge_rejected() {
        let err = build_orchestrator("gaspar", None).err().unwrap();
        assert!(err.to_string().contains("Unknown judge unit"));
    }
}
