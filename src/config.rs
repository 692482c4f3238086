use crate::orchestrator::PipelineShape;
use crate::storage::DEFAULT_STORE_KEY;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TRANSLATE_API_URL: &str = "https://everydayconversify-conversify-model.hf.space";

#[derive(Debug, Clone)]
pub struct Config {
    // Translation service
    pub translate_api_url: String,
    pub translate_api_key: Option<String>,

    // Pipeline
    pub pipeline_shape: PipelineShape,
    pub stage_timeout: Duration,
    pub max_attempts: u32,

    // Storage
    pub store_dir: PathBuf,
    pub store_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            translate_api_url: DEFAULT_TRANSLATE_API_URL.to_string(),
            translate_api_key: None,
            pipeline_shape: PipelineShape::default(),
            stage_timeout: Duration::from_secs(30),
            max_attempts: 1,
            store_dir: PathBuf::from("data"),
            store_key: DEFAULT_STORE_KEY.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            // Translation service
            translate_api_url: std::env::var("TRANSLATE_API_URL")
                .unwrap_or(defaults.translate_api_url),
            translate_api_key: std::env::var("TRANSLATE_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),

            // Pipeline
            pipeline_shape: match std::env::var("PIPELINE_SHAPE") {
                Ok(value) => value.parse().context("Invalid PIPELINE_SHAPE")?,
                Err(_) => defaults.pipeline_shape,
            },
            stage_timeout: match std::env::var("STAGE_TIMEOUT_SECS") {
                Ok(value) => {
                    let secs: u64 = value
                        .trim()
                        .parse()
                        .with_context(|| format!("Invalid STAGE_TIMEOUT_SECS: '{}'", value))?;
                    if secs == 0 {
                        anyhow::bail!("STAGE_TIMEOUT_SECS must be greater than 0");
                    }
                    Duration::from_secs(secs)
                }
                Err(_) => defaults.stage_timeout,
            },
            max_attempts: match std::env::var("TRANSLATE_MAX_ATTEMPTS") {
                Ok(value) => {
                    let attempts: u32 = value
                        .trim()
                        .parse()
                        .with_context(|| format!("Invalid TRANSLATE_MAX_ATTEMPTS: '{}'", value))?;
                    if attempts == 0 {
                        anyhow::bail!("TRANSLATE_MAX_ATTEMPTS must be at least 1");
                    }
                    attempts
                }
                Err(_) => defaults.max_attempts,
            },

            // Storage
            store_dir: std::env::var("STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_dir),
            store_key: std::env::var("STORE_KEY").unwrap_or(defaults.store_key),
        })
    }
}
