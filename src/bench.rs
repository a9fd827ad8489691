//! Repeated-trial timing of the transform modes.

use anyhow::{bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use std::path::PathBuf;

use crate::audio::buffer::DataSink;
use crate::audio::decode::decode_into;
use crate::audio::format::AudioFormat;
use crate::audio::tone::Tone;
use crate::config::EngineConfig;
use crate::controller::{Controller, TransformMode};
use crate::error::TransformError;
use crate::transform::SpectrumResult;

/// Where trial input comes from. Reloaded before every trial.
#[derive(Clone, Debug)]
pub enum Source {
    File(PathBuf),
    Tone(Tone),
}

impl Source {
    pub fn load(&self, sink: &DataSink) -> Result<AudioFormat> {
        match self {
            Source::File(path) => decode_into(path, sink),
            Source::Tone(tone) => tone.write_to(sink).context("Failed to write tone samples"),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Source::File(path) => path.display().to_string(),
            Source::Tone(tone) => format!(
                "{} Hz tone, {:.2}s @ {} Hz",
                tone.frequency_hz,
                tone.duration.as_secs_f64(),
                tone.sample_rate_hz
            ),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TrialSummary {
    pub mode: TransformMode,
    /// Elapsed seconds of each trial, in run order
    pub elapsed: Vec<f64>,
    pub last: Option<SpectrumResult>,
}

impl TrialSummary {
    pub fn average(&self) -> Option<f64> {
        if self.elapsed.is_empty() {
            return None;
        }
        Some(self.elapsed.iter().sum::<f64>() / self.elapsed.len() as f64)
    }

    pub fn fastest(&self) -> Option<f64> {
        self.elapsed.iter().copied().reduce(f64::min)
    }

    pub fn slowest(&self) -> Option<f64> {
        self.elapsed.iter().copied().reduce(f64::max)
    }
}

/// A controller wired to channels so trials can wait on their outcome.
pub struct Bench {
    controller: Controller,
    results: Receiver<SpectrumResult>,
    failures: Receiver<TransformError>,
}

impl Bench {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let mut controller = Controller::new(config).context("Invalid engine configuration")?;
        let (result_tx, results) = unbounded();
        let (failure_tx, failures) = unbounded();
        controller.on_result(move |result| {
            let _ = result_tx.send(result);
        });
        controller.on_failure(move |error| {
            let _ = failure_tx.send(error);
        });
        Ok(Self {
            controller,
            results,
            failures,
        })
    }

    /// Run `trials` rounds of clear, load, start and wait for `mode`.
    ///
    /// `on_trial` receives the trial index and its elapsed seconds.
    pub fn run(
        &mut self,
        source: &Source,
        mode: TransformMode,
        trials: usize,
        mut on_trial: impl FnMut(usize, f64),
    ) -> Result<TrialSummary> {
        let mut summary = TrialSummary {
            mode,
            elapsed: Vec::with_capacity(trials),
            last: None,
        };

        for trial in 0..trials {
            self.controller.clear();
            let format = source.load(&self.controller.data_sink())?;
            self.controller
                .start(mode, format)
                .with_context(|| format!("Failed to start {mode}"))?;
            self.controller.wait();

            if let Ok(error) = self.failures.try_recv() {
                bail!("{mode} trial {} failed: {}", trial + 1, error);
            }
            let result = match self.results.try_recv() {
                Ok(result) => result,
                Err(_) => bail!("{mode} trial {} produced no result", trial + 1),
            };

            on_trial(trial, result.elapsed_seconds);
            summary.elapsed.push(result.elapsed_seconds);
            summary.last = Some(result);
        }

        self.controller.clear();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn runs_each_trial_to_completion() {
        let mut bench = Bench::new(EngineConfig::default()).unwrap();
        let source = Source::Tone(Tone::new(440.0, 8000, Duration::from_millis(500)));

        let mut seen = Vec::new();
        let summary = bench
            .run(&source, TransformMode::DistributedFft, 3, |i, _| seen.push(i))
            .unwrap();

        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(summary.elapsed.len(), 3);
        let average = summary.average().unwrap();
        assert!(summary.fastest().unwrap() <= average);
        assert!(average <= summary.slowest().unwrap());

        let peak = summary.last.unwrap().peak().unwrap();
        assert!((peak.frequency_hz - 440.0).abs() <= 2.0);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut bench = Bench::new(EngineConfig::default()).unwrap();
        let source = Source::File(PathBuf::from("/nonexistent/input.wav"));
        assert!(bench.run(&source, TransformMode::Fft, 1, |_, _| {}).is_err());
    }

    #[test]
    fn empty_summary_has_no_average() {
        let summary = TrialSummary {
            mode: TransformMode::Fft,
            elapsed: Vec::new(),
            last: None,
        };
        assert!(summary.average().is_none());
        assert!(summary.fastest().is_none());
    }
}
