//! Linkwise: link named entities against Wikipedia, Wikidata and DBpedia.

use std::sync::Arc;

use anyhow::Context;
use linkwise_core::{DictionaryTermGenerator, LinkerConfig, TermGenerator};
use linkwise_llm::{LlmConfig, LlmTermGenerator};
use linkwise_runtime::Orchestrator;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod args;
mod entities;

use args::{Command, LinkArgs, USAGE};

fn load_config(opts: &LinkArgs) -> anyhow::Result<LinkerConfig> {
    let mut config = match &opts.config {
        Some(path) => LinkerConfig::load(path)?,
        None => LinkerConfig::from_env()?,
    };
    if let Some(language) = &opts.language {
        config.language = language.clone();
    }
    Ok(config)
}

fn term_generator(opts: &LinkArgs, config: &LinkerConfig) -> anyhow::Result<Arc<dyn TermGenerator>> {
    if let Some(path) = &opts.synonyms {
        info!("Using synonym dictionary {}", path.display());
        return Ok(Arc::new(DictionaryTermGenerator::from_json_file(path)?));
    }
    let llm = match &opts.llm_config {
        Some(path) => LlmConfig::load(path)?,
        None => LlmConfig::from_env(),
    };
    Ok(Arc::new(LlmTermGenerator::from_config(&llm, &config.user_agent)?))
}

async fn link(opts: LinkArgs) -> anyhow::Result<()> {
    let config = load_config(&opts)?;
    let contexts = match &opts.file {
        Some(path) => entities::from_file(path)?,
        None => entities::from_names(&opts.names)?,
    };

    let cache = linkwise_core::cache::from_config(&config.cache)?;
    let terms = term_generator(&opts, &config)?;
    let orchestrator = Orchestrator::from_config(&config, cache, terms)?;

    info!(
        "Linking entities={} language={}",
        contexts.len(),
        config.language
    );
    let output = orchestrator.run(contexts).await;

    let json = serde_json::to_string_pretty(&output)?;
    match &opts.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote results to {}", path.display());
        }
        None => println!("{}", json),
    }

    let total = &output.statistics.total;
    info!(
        "Linking complete successful={} partial={} failed={} cache_hits={} api_calls={} coverage={:.2}",
        total.successful,
        total.partial,
        total.failed,
        total.cache_hits,
        total.total_api_calls(),
        output.graph.stats.coverage
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing on stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let command = match args::parse(&raw) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    match command {
        Command::Help => println!("{}", USAGE),
        Command::Config(opts) => {
            let config = load_config(&opts)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Command::Link(opts) => link(opts).await?,
    }
    Ok(())
}
