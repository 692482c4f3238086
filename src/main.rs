//! Command-line phrasebook.
//!
//! Usage:
//!   conversify translate <text>                 # Show translations without saving
//!   conversify save <text>                      # Translate and save
//!   conversify list                             # Show saved sentences, newest first
//!   conversify edit <id> <field>=<value>...     # Fields: source, a, b, pronunciation
//!   conversify delete <id>
//!
//! Configuration comes from the environment (see `Config::from_env`), with a
//! `.env` file loaded if present.

use anyhow::{bail, Context, Result};
use conversify::config::Config;
use conversify::retry::RetryConfig;
use conversify::{
    HttpTranslator, JsonFileStorage, Language, SentencePatch, SentenceRecord, SentenceStore,
    TranslationOrchestrator, TranslationResult,
};
use std::sync::Arc;
use tracing::info;

const USAGE: &str = "usage: conversify <translate|save|list|edit|delete> [args]";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when absent)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("conversify=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        bail!(USAGE);
    };

    match command.as_str() {
        "translate" => {
            let result = build_orchestrator(&config)
                .translate(&join_text(rest)?)
                .await?;
            print_result(&result);
        }
        "save" => {
            let result = build_orchestrator(&config)
                .translate(&join_text(rest)?)
                .await?;
            print_result(&result);

            let fields = result
                .into_new_sentence()
                .context("Not saved: every translation must succeed before saving")?;
            let mut store = open_store(&config);
            let record = store.create(fields)?;
            println!("\nSaved as {}", record.id);
        }
        "list" => {
            let store = open_store(&config);
            print_list(store.list());
        }
        "edit" => {
            let (id, assignments) = rest.split_first().context("edit needs an id")?;
            let patch = parse_patch(assignments)?;
            let mut store = open_store(&config);
            if store.get(id).is_none() {
                println!("No sentence {}", id);
                return Ok(());
            }
            store.update(id, patch)?;
            println!("Updated {}", id);
        }
        "delete" => {
            let id = rest.first().context("delete needs an id")?;
            let mut store = open_store(&config);
            store.delete(id)?;
            println!("Deleted {}", id);
        }
        other => bail!("Unknown command '{}'. {}", other, USAGE),
    }

    Ok(())
}

fn build_orchestrator(config: &Config) -> TranslationOrchestrator {
    let mut translator = HttpTranslator::new(&config.translate_api_url);
    if let Some(key) = &config.translate_api_key {
        translator = translator.with_api_key(key);
    }
    info!(
        "Using translation service at {} ({} pipeline)",
        translator.base_url(),
        config.pipeline_shape
    );

    TranslationOrchestrator::new(Arc::new(translator), config.pipeline_shape)
        .with_stage_timeout(config.stage_timeout)
        .with_retry(RetryConfig::translation_stage(config.max_attempts))
}

fn open_store(config: &Config) -> SentenceStore {
    let mut store = SentenceStore::open(JsonFileStorage::new(&config.store_dir, &config.store_key));
    store.subscribe(|sentences| info!("{} sentences saved", sentences.len()));
    store
}

fn join_text(words: &[String]) -> Result<String> {
    let text = words.join(" ");
    if text.trim().is_empty() {
        bail!("Please provide a sentence to translate");
    }
    Ok(text)
}

fn parse_patch(assignments: &[String]) -> Result<SentencePatch> {
    let mut patch = SentencePatch::default();
    for assignment in assignments {
        let (field, value) = assignment
            .split_once('=')
            .with_context(|| format!("Expected <field>=<value>, got '{}'", assignment))?;
        let value = value.to_string();
        match field {
            "source" => patch.source_text = Some(value),
            "a" | "english" => patch.target_text_a = Some(value),
            "b" | "japanese" => patch.target_text_b = Some(value),
            "pronunciation" if value.is_empty() => patch.pronunciation = Some(None),
            "pronunciation" => patch.pronunciation = Some(Some(value)),
            other => bail!("Unknown field '{}'", other),
        }
    }
    if patch.is_empty() {
        bail!("Nothing to change");
    }
    Ok(patch)
}

fn print_result(result: &TranslationResult) {
    println!("{:<14} {}", format!("{}:", Language::KOREAN), result.source_text);
    println!("{:<14} {}", format!("{}:", Language::ENGLISH), result.target_text_a);
    println!("{:<14} {}", format!("{}:", Language::JAPANESE), result.target_text_b);
    if let Some(pronunciation) = &result.pronunciation {
        println!("Pronunciation: {}", pronunciation);
    }
}

fn print_list(sentences: &[SentenceRecord]) {
    if sentences.is_empty() {
        println!("No saved sentences yet. Use `conversify save <text>` to add one.");
        return;
    }

    println!("{} saved sentences\n", sentences.len());
    for sentence in sentences {
        println!(
            "[{}] {}",
            sentence.created_at.format("%Y-%m-%d"),
            sentence.source_text
        );
        println!("  id:            {}", sentence.id);
        println!("  {:<14} {}", format!("{}:", Language::ENGLISH), sentence.target_text_a);
        println!("  {:<14} {}", format!("{}:", Language::JAPANESE), sentence.target_text_b);
        if let Some(pronunciation) = &sentence.pronunciation {
            println!("  Pronunciation: {}", pronunciation);
        }
        println!();
    }
}
