//! shapecheck - terminal host for the selfie-and-shapes captcha.
//!
//! Plays the camera and presentation roles around a `CaptchaSession` so the whole
//! flow can be walked through from a shell.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use shapecheck_core::{CaptchaSession, SeededSource};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod camera;
mod config;
mod render;
mod repl;

/// Selfie-and-shapes captcha in the terminal
#[derive(Parser, Debug)]
#[command(name = "shapecheck")]
#[command(version, about, long_about = None)]
struct Cli {
    /// What log level to use
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,

    #[command(flatten)]
    policy: config::PolicyArgs,

    /// TOML file with a [policy] table, command line and environment take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Image file used as the camera frame, a generated test card when absent
    #[arg(short, long)]
    photo: Option<PathBuf>,

    /// Simulate a camera that refuses access
    #[arg(long)]
    deny_camera: bool,

    /// Force a seed instead of random
    #[arg(short, long)]
    seed: Option<u64>,
}

fn init_logging(verbose: &Verbosity<WarnLevel>) {
    let filter = EnvFilter::builder()
        .with_default_directive(verbose.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.verbose);

    let policy = config::resolve_policy(&cli.policy, cli.config.as_deref())?;
    log::debug!("policy: {:?}", policy);

    let rng = match cli.seed {
        Some(seed) => SeededSource::new(seed),
        None => SeededSource::from_entropy(),
    };
    let camera = camera::StillCamera::new(cli.photo, cli.deny_camera);
    let session =
        CaptchaSession::new(camera, policy, rng).context("Could not start captcha session")?;

    let stdin = std::io::stdin().lock();
    let stdout = std::io::stdout().lock();
    repl::Repl::new(session, stdin, stdout).run()
}
