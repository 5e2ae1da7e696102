use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;
use shapecheck_core::Policy;

/// Policy values taken from the command line or the environment.
#[derive(Args, Debug, Default)]
pub struct PolicyArgs {
    /// Verification requests allowed, the one reaching this count blocks the operator
    #[arg(long, env = "CAPTCHA_MAX_TRY")]
    pub max_tries: Option<u32>,

    /// Percentage points added to the pass threshold for every failed attempt
    #[arg(long, env = "CAPTCHA_RETRY_PENALTY_RATE")]
    pub retry_penalty_rate: Option<f64>,

    /// Pass threshold of the first attempt, in percent
    #[arg(long, env = "CAPTCHA_VALIDATION_ACCEPTED_SCORE_PERCENT")]
    pub base_accepted_score_percent: Option<f64>,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    policy: PolicyTable,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
struct PolicyTable {
    max_tries: Option<u32>,
    retry_penalty_rate: Option<f64>,
    base_accepted_score_percent: Option<f64>,
}

fn parse_file_config(text: &str) -> Result<FileConfig> {
    toml::from_str(text).context("Could not parse config file")
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read config file {}", path.display()))?;
    parse_file_config(&text).with_context(|| format!("In {}", path.display()))
}

fn merge(args: &PolicyArgs, file: FileConfig) -> Result<Policy> {
    let table = file.policy;
    let max_tries = args
        .max_tries
        .or(table.max_tries)
        .context("No max tries given, use --max-tries or CAPTCHA_MAX_TRY")?;
    let retry_penalty_rate = args
        .retry_penalty_rate
        .or(table.retry_penalty_rate)
        .context("No retry penalty given, use --retry-penalty-rate or CAPTCHA_RETRY_PENALTY_RATE")?;
    let base_accepted_score_percent = args
        .base_accepted_score_percent
        .or(table.base_accepted_score_percent)
        .context(
            "No accepted score given, use --base-accepted-score-percent or \
             CAPTCHA_VALIDATION_ACCEPTED_SCORE_PERCENT",
        )?;

    Policy::new(max_tries, retry_penalty_rate, base_accepted_score_percent)
        .context("Invalid captcha policy")
}

/// Builds the policy from arguments, falling back to the optional config file per value.
pub fn resolve_policy(args: &PolicyArgs, path: Option<&Path>) -> Result<Policy> {
    let file = match path {
        Some(path) => load_file_config(path)?,
        None => FileConfig::default(),
    };
    merge(args, file)
}
