use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::Path;
use std::sync::Arc;
use swot_core::{EngineSnapshot, Options, OptionsPatch, Persistence};
use swot_engine::{run_simulation, JsonFileStore, SimulatorConfig};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("swot")
        .version(swot_engine::VERSION)
        .about("SWOT training engine")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("simulate")
                .about("Run the engine against seeded simulated oracles")
                .arg(
                    Arg::new("questions")
                        .long("questions")
                        .default_value("20")
                        .value_parser(value_parser!(usize))
                        .help("Number of generated questions"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("accuracy")
                        .long("accuracy")
                        .default_value("0.6")
                        .value_parser(value_parser!(f64))
                        .help("Base probability of a correct answer"),
                )
                .arg(
                    Arg::new("failure-rate")
                        .long("failure-rate")
                        .default_value("0.0")
                        .value_parser(value_parser!(f64))
                        .help("Probability of a solver outage per attempt"),
                )
                .arg(
                    Arg::new("batch-size")
                        .long("batch-size")
                        .value_parser(value_parser!(usize))
                        .help("Questions per batch"),
                )
                .arg(
                    Arg::new("max-loops")
                        .long("max-loops")
                        .value_parser(value_parser!(u32))
                        .help("Maximum number of rounds"),
                )
                .arg(
                    Arg::new("options")
                        .long("options")
                        .help("Options file (.json or .toml)"),
                )
                .arg(
                    Arg::new("store")
                        .long("store")
                        .help("Directory to save the session snapshot in"),
                )
                .arg(
                    Arg::new("key")
                        .long("key")
                        .default_value("session")
                        .help("Snapshot key within the store"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Summarize a stored session snapshot")
                .arg(
                    Arg::new("store")
                        .long("store")
                        .required(true)
                        .help("Snapshot directory"),
                )
                .arg(
                    Arg::new("key")
                        .long("key")
                        .default_value("session")
                        .help("Snapshot key within the store"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the raw snapshot"),
                ),
        )
}

fn load_options(path: &Path) -> Result<Options> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading options file {}", path.display()))?;
    let options: Options = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&text).context("parsing TOML options")?,
        _ => serde_json::from_str(&text).context("parsing JSON options")?,
    };
    options.validate()?;
    Ok(options)
}

async fn simulate(args: &ArgMatches) -> Result<bool> {
    let mut options = match args.get_one::<String>("options") {
        Some(path) => load_options(Path::new(path))?,
        None => Options::default().with_batch_delay_ms(0),
    };
    let patch = OptionsPatch {
        batch_size: args.get_one::<usize>("batch-size").copied(),
        max_loop_count: args.get_one::<u32>("max-loops").copied(),
        ..OptionsPatch::default()
    };
    options.apply(&patch)?;

    let config = SimulatorConfig {
        seed: args.get_one::<u64>("seed").copied().unwrap_or(42),
        questions: args.get_one::<usize>("questions").copied().unwrap_or(20),
        accuracy: args.get_one::<f64>("accuracy").copied().unwrap_or(0.6),
        failure_rate: args.get_one::<f64>("failure-rate").copied().unwrap_or(0.0),
        options,
        ..SimulatorConfig::default()
    };
    if !(0.0..=1.0).contains(&config.accuracy) || !(0.0..=1.0).contains(&config.failure_rate) {
        bail!("--accuracy and --failure-rate must be within [0, 1]");
    }

    let store = args.get_one::<String>("store").map(|dir| {
        let key = args
            .get_one::<String>("key")
            .cloned()
            .unwrap_or_else(|| "session".to_string());
        (Arc::new(JsonFileStore::new(dir)) as Arc<dyn Persistence>, key)
    });

    let report = run_simulation(&config, store).await?;
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.generate_text());
    }
    Ok(report.completed())
}

async fn inspect(args: &ArgMatches) -> Result<()> {
    let dir = args
        .get_one::<String>("store")
        .context("--store is required")?;
    let key = args.get_one::<String>("key").map_or("session", String::as_str);

    let store = JsonFileStore::new(dir);
    let Some(json) = store.load(key).await? else {
        bail!("no snapshot named {key} in {dir}");
    };
    let snapshot = EngineSnapshot::from_json(&json)?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let session = &snapshot.session;
    let summary = session.questions.summary(&snapshot.options);
    println!("Snapshot: {key}");
    println!("State: {} (restores as {})", snapshot.training_state, snapshot.restored_state());
    if let Some(reason) = &session.end_reason {
        println!("End Reason: {reason}");
    }
    println!("Rounds: {}", session.total_loop_count);
    println!("Next Batch: {}", session.last_batch_index);
    println!("Certified Batches: {}", session.version_certify_count);
    println!(
        "Questions: {} total, {} eligible, {} simple, {} skipped, {} capped",
        summary.total, summary.eligible, summary.simple, summary.skipped, summary.capped
    );
    println!(
        "Note: version {} (revision {}), {} tips",
        snapshot.note.version(),
        snapshot.note.revision(),
        snapshot.note.note().tip_count()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("simulate", args)) => {
            let completed = simulate(args).await?;
            std::process::exit(if completed { 0 } else { 1 });
        }
        Some(("inspect", args)) => inspect(args).await,
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn simulate_flags_parse() {
        let matches = cli()
            .try_get_matches_from(["swot", "simulate", "--batch-size", "3", "--seed", "7", "--json"])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "simulate");
        assert_eq!(args.get_one::<usize>("batch-size"), Some(&3));
        assert_eq!(args.get_one::<u64>("seed"), Some(&7));
        assert!(args.get_flag("json"));
    }

    #[test]
    fn options_file_formats() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("opts.json");
        std::fs::write(&json, r#"{"batchSize": 2, "maxLoopCount": 3}"#).unwrap();
        let options = load_options(&json).unwrap();
        assert_eq!(options.batch_size, 2);
        assert_eq!(options.max_loop_count, 3);

        let toml_path = dir.path().join("opts.toml");
        std::fs::write(&toml_path, "batchSize = 4\n").unwrap();
        assert_eq!(load_options(&toml_path).unwrap().batch_size, 4);

        std::fs::write(&json, r#"{"batchSize": 0}"#).unwrap();
        assert!(load_options(&json).is_err());
    }
}
