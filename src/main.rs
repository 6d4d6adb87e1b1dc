//! makesound - generate sound effects from text prompts
//!
//! Usage:
//!   makesound --prompt "dog barking" --output dog.wav --duration 3
//!   makesound --batch batch.json

use std::io::Write;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

use makesound::{
    backend::AudiocraftBackend,
    cli_style::{loading_spinner, print_error, print_info},
    config::{init_tracing, load_dotenv, Cli},
    generator::{run_batch, run_single},
    manifest::read_batch,
    WriteOptions,
};

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();

    // Usage errors exit here, before the model is touched
    let cli = Cli::parse();
    init_tracing(&cli.log);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(error = %e, "makesound failed");
            print_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %cli.model,
        "starting makesound"
    );

    // Read the manifest before paying for model load
    let batch = match &cli.batch {
        Some(path) => Some(read_batch(path)?),
        None => None,
    };

    print_info(&format!("Loading model {}...", cli.model));
    let spinner = loading_spinner(&format!("Loading {}", cli.model));
    let model = AudiocraftBackend::spawn(cli.backend_config()).await;
    spinner.finish_and_clear();
    let model = model.with_context(|| format!("failed to load model {}", cli.model))?;

    let options = WriteOptions::loudness_compressed();
    let mut stdout = std::io::stdout();

    match (batch, &cli.prompt) {
        (Some(items), _) => {
            run_batch(&model, &options, &items, cli.duration, &mut stdout)
                .await
                .context("batch generation failed")?;
        }
        (None, Some(prompt)) => {
            run_single(&model, &options, prompt, &cli.output, cli.duration, &mut stdout)
                .await
                .context("generation failed")?;
        }
        (None, None) => anyhow::bail!("either --prompt or --batch is required"),
    }
    stdout.flush()?;

    model.shutdown().await.context("model worker did not exit cleanly")?;
    Ok(())
}
