mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use cli::Cli;
use spectra::audio::tone::Tone;
use spectra::bench::{Bench, Source, TrialSummary};
use spectra::config::{self, Config};
use spectra::TransformMode;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut cfg = Config::default();
    if let Some(path) = config::find_config(cli.config.clone()) {
        match config::load_config(&path) {
            Some(loaded) => {
                log::info!("Loaded config from {}", path.display());
                cfg = loaded;
            }
            None => log::warn!("Failed to load config from {}", path.display()),
        }
    }

    // CLI values win over the config file
    let mut engine = cfg.engine;
    if let Some(hz) = cli.min_frequency { engine.min_frequency = hz; }
    if let Some(hz) = cli.max_frequency { engine.max_frequency = hz; }
    if let Some(n) = cli.dft_workers { engine.dft_workers = n; }
    if let Some(n) = cli.fft_workers { engine.fft_workers = n; }
    let trials = cli.trials.unwrap_or(cfg.bench.trials).max(1);
    let top = cli.top.unwrap_or(cfg.bench.top);

    let source = match &cli.input {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Input file not found: {}", path.display());
            }
            Source::File(path.clone())
        }
        None => {
            if !(cli.duration.is_finite() && cli.duration > 0.0) {
                anyhow::bail!("Tone duration must be positive, got {}", cli.duration);
            }
            Source::Tone(Tone::new(
                cli.tone,
                cli.sample_rate,
                Duration::from_secs_f64(cli.duration),
            ))
        }
    };

    let modes: Vec<TransformMode> = match cli.mode {
        Some(mode) => vec![mode.into()],
        None => TransformMode::ALL.to_vec(),
    };

    log::info!("spectra - DFT/FFT spectrum benchmark");
    log::info!("Input: {}", source.describe());
    log::info!(
        "Band: [{}, {}) Hz, {} DFT shard(s), {} FFT shard(s)",
        engine.min_frequency,
        engine.max_frequency,
        engine.dft_workers,
        engine.fft_workers
    );

    let mut bench = Bench::new(engine)?;

    let pb = ProgressBar::new((trials * modes.len()) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} trials {msg}")
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );

    let mut summaries = Vec::with_capacity(modes.len());
    for mode in modes {
        pb.set_message(mode.to_string());
        let summary = bench.run(&source, mode, trials, |trial, elapsed| {
            pb.println(format!("{mode} trial {}: {:.6}s", trial + 1, elapsed));
            pb.inc(1);
        })?;
        summaries.push(summary);
    }
    pb.finish_with_message("done");

    for summary in &summaries {
        report(summary, top);
    }

    if cli.json {
        let json: Vec<_> = summaries
            .iter()
            .map(|s| {
                serde_json::json!({
                    "mode": s.mode.to_string(),
                    "elapsed_seconds": s.elapsed,
                    "average_seconds": s.average(),
                    "result": s.last,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json)?);
    }

    Ok(())
}

fn report(summary: &TrialSummary, top: usize) {
    let Some(average) = summary.average() else {
        return;
    };
    println!(
        "{}: average {:.6}s over {} trial(s) (fastest {:.6}s, slowest {:.6}s)",
        summary.mode,
        average,
        summary.elapsed.len(),
        summary.fastest().unwrap_or(average),
        summary.slowest().unwrap_or(average)
    );
    if let Some(result) = &summary.last {
        for point in result.strongest(top) {
            println!("  {:>6.0} Hz  {:.4}", point.frequency_hz, point.amplitude);
        }
    }
}
