use std::process::exit;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use songscout::config::Config;
use songscout::engine::{Engine, EntityKind};
use songscout::render::{JsonRenderer, ResultSink, TextRenderer};
use songscout::search::{Aggregator, SearchError, SearchOutcome};

struct CliArgs {
    query: String,
    engine: Engine,
    kind: EntityKind,
    json: bool,
}

fn usage() -> ! {
    eprintln!(
        "Usage: songscout <query> --engine <spotify|youtube|musicbrainz> --type <track|album|artist> [--json]\n\
         \n\
         Credentials live in the config file (printed on first run).\n\
         Note: youtube supports track and artist searches only."
    );
    exit(2);
}

fn parse_args() -> CliArgs {
    let mut args = std::env::args().skip(1);
    let mut query_words: Vec<String> = Vec::new();
    let mut engine: Option<String> = None;
    let mut kind: Option<String> = None;
    let mut json = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--engine" | "-e" => engine = args.next(),
            "--type" | "-t" => kind = args.next(),
            "--json" => json = true,
            "--help" | "-h" => usage(),
            _ => query_words.push(arg),
        }
    }

    let query = query_words.join(" ");
    if query.trim().is_empty() {
        eprintln!("Please enter a search query.");
        usage();
    }
    let Some(engine) = engine else {
        eprintln!("Please select an engine.");
        usage();
    };
    let Some(kind) = kind else {
        eprintln!("Please select an entity type.");
        usage();
    };

    let engine: Engine = match engine.parse() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{}", e);
            usage();
        }
    };
    let kind: EntityKind = match kind.parse() {
        Ok(kind) => kind,
        Err(e) => {
            eprintln!("{}", e);
            usage();
        }
    };

    CliArgs {
        query,
        engine,
        kind,
        json,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("songscout=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args();

    let config = Config::load()?;
    let aggregator = Aggregator::new(&config)?;
    for (engine, reason) in aggregator.init_errors() {
        tracing::debug!(engine = %engine, reason = %reason, "Engine unavailable");
    }

    let outcome = aggregator.search(&args.query, args.engine, args.kind).await;

    let mut sink: Box<dyn ResultSink> = if args.json {
        Box::new(JsonRenderer::stdout())
    } else {
        Box::new(TextRenderer::stdout())
    };

    match outcome {
        Ok(SearchOutcome::Results(results)) => {
            sink.render(&results);
            Ok(())
        }
        Ok(SearchOutcome::Empty) => {
            sink.render_empty("No results found.");
            Ok(())
        }
        Err(err @ SearchError::EngineUnavailable { .. }) => {
            eprintln!("{}", err);
            let available = aggregator
                .available_engines()
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            eprintln!("Available engines: {}", available);
            exit(2);
        }
        Err(err @ (SearchError::EmptyQuery | SearchError::UnsupportedKind { .. })) => {
            // Selection problems get guidance, not a stack of context
            eprintln!("{}", err);
            exit(2);
        }
        Err(err) => Err(err.into()),
    }
}
