//! Search for the enhancement an OCR engine reads best
//!
//! Each candidate is a full set of [`PipelineOptions`]. Every candidate is
//! enhanced and recognized, then scored by word accuracy against a reference
//! text when one is given, or by the engine's document confidence otherwise.
//! Without a reference a candidate only qualifies if OCR still finds most of
//! the words it found on the plain grayscale image.

use crate::accuracy::word_accuracy;
use crate::engine::OcrEngine;
use crate::error::{EnhanceError, Result};
use crate::options::{
    AdaptiveWeighting, Binarization, DenoiseFilter, DenoiseOptions, Morphology, PipelineOptions,
};
use crate::preprocessing::enhance;
use crate::types::{EnhancedImage, RawImage};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Share of baseline words a candidate must keep to qualify
pub const DEFAULT_MIN_WORD_RETENTION: f64 = 0.9;

/// Window used by the adaptive candidates of the default grid
const GRID_BLOCK_SIZE: u32 = 255;

/// One parameterization to try
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub label: String,
    pub options: PipelineOptions,
}

impl Candidate {
    pub fn new(label: impl Into<String>, options: PipelineOptions) -> Self {
        Self {
            label: label.into(),
            options,
        }
    }
}

/// The winning candidate
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub image: EnhancedImage,
    pub label: String,
    pub score: f64,
    /// Candidates that enhanced and recognized without error
    pub evaluated: usize,
}

/// Candidates tried when none are given.
///
/// Otsu, fixed thresholds from 100 to 200, adaptive mean and Gaussian
/// thresholds over a wide window, each also with bolded strokes, then
/// median denoising of increasing strength without binarization. Other
/// stages keep the settings in `base`.
pub fn default_candidates(base: &PipelineOptions) -> Vec<Candidate> {
    let mut methods = vec![("otsu".to_string(), Binarization::Global)];
    for threshold in (100..=200).step_by(10) {
        methods.push((format!("fixed-{}", threshold), Binarization::Fixed { threshold }));
    }
    for (name, weighting) in [
        ("mean", AdaptiveWeighting::Mean),
        ("gaussian", AdaptiveWeighting::Gaussian),
    ] {
        for offset in (5..=50).step_by(5) {
            methods.push((
                format!("adaptive-{}-{}", name, offset),
                Binarization::Adaptive {
                    block_size: GRID_BLOCK_SIZE,
                    offset,
                    weighting,
                },
            ));
        }
    }

    let mut candidates = Vec::new();
    for (label, method) in methods {
        let options = base
            .with_binarization(method)
            .with_morphology(Morphology::None);
        let bold = options.with_morphology(Morphology::Bold);
        candidates.push(Candidate::new(label.clone(), options));
        candidates.push(Candidate::new(format!("{}+bold", label), bold));
    }

    for strength in (3..=21).step_by(2) {
        let options = PipelineOptions {
            denoise: DenoiseOptions {
                enabled: true,
                strength,
                filter: DenoiseFilter::Median,
            },
            ..*base
        }
        .with_binarization(Binarization::None)
        .with_morphology(Morphology::None);
        candidates.push(Candidate::new(format!("median-{}", strength), options));
    }

    candidates
}

/// Tries candidates against an OCR engine and keeps the best
pub struct BestImageSearch<'a> {
    engine: &'a dyn OcrEngine,
    candidates: Vec<Candidate>,
    reference: Option<&'a str>,
    min_word_retention: f64,
    workers: usize,
}

impl<'a> BestImageSearch<'a> {
    /// Search over [`default_candidates`] with default options
    pub fn new(engine: &'a dyn OcrEngine) -> Self {
        Self {
            engine,
            candidates: default_candidates(&PipelineOptions::default()),
            reference: None,
            min_word_retention: DEFAULT_MIN_WORD_RETENTION,
            workers: std::thread::available_parallelism().map_or(1, |n| n.get()),
        }
    }

    pub fn with_candidates(mut self, candidates: Vec<Candidate>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Score by word accuracy against `reference` instead of confidence
    pub fn with_reference(mut self, reference: &'a str) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_min_word_retention(mut self, retention: f64) -> Self {
        self.min_word_retention = retention;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Best-scoring candidate for `raw`, or `None` if no candidate
    /// qualifies. Ties go to the candidate listed first.
    pub fn run(&self, raw: &RawImage) -> Result<Option<SearchOutcome>> {
        if self.workers == 0 {
            return Err(EnhanceError::config("search needs at least one worker"));
        }
        if !(0.0..=1.0).contains(&self.min_word_retention) {
            return Err(EnhanceError::config(format!(
                "word retention must be in 0..=1, got {}",
                self.min_word_retention
            )));
        }

        let min_words = match self.reference {
            Some(_) => 0.0,
            None => {
                let plain = enhance(raw, &PipelineOptions::grayscale_only())?;
                let baseline = self.engine.recognize(plain.pixels())?.word_count();
                if baseline == 0 {
                    tracing::info!("No words found on the grayscale image, nothing to compare");
                    return Ok(None);
                }
                tracing::debug!("Baseline OCR found {} words", baseline);
                self.min_word_retention * baseline as f64
            }
        };

        tracing::info!(
            "Searching {} candidates on {} workers",
            self.candidates.len(),
            self.workers
        );

        let next = AtomicUsize::new(0);
        let evaluated = AtomicUsize::new(0);
        let worker_bests: Vec<Option<Scored>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.workers.min(self.candidates.len()))
                .map(|_| scope.spawn(|| self.work(raw, min_words, &next, &evaluated)))
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        tracing::warn!("Search worker panicked");
                        None
                    })
                })
                .collect()
        });

        let best = worker_bests.into_iter().flatten().reduce(Scored::better);
        Ok(best.map(|scored| {
            tracing::info!(
                "Best candidate: {} (score {:.3})",
                self.candidates[scored.index].label,
                scored.score
            );
            SearchOutcome {
                image: scored.image,
                label: self.candidates[scored.index].label.clone(),
                score: scored.score,
                evaluated: evaluated.load(Ordering::Relaxed),
            }
        }))
    }

    /// Pull candidates off the shared counter until none remain, keeping
    /// only this worker's best
    fn work(
        &self,
        raw: &RawImage,
        min_words: f64,
        next: &AtomicUsize,
        evaluated: &AtomicUsize,
    ) -> Option<Scored> {
        let mut best: Option<Scored> = None;
        loop {
            let index = next.fetch_add(1, Ordering::Relaxed);
            let Some(candidate) = self.candidates.get(index) else {
                return best;
            };

            let score = match self.score(raw, candidate, min_words) {
                Ok(score) => score,
                Err(e) => {
                    tracing::warn!("Skipping candidate {}: {}", candidate.label, e);
                    continue;
                }
            };
            evaluated.fetch_add(1, Ordering::Relaxed);

            if let Some((score, image)) = score {
                tracing::debug!("Candidate {} scored {:.3}", candidate.label, score);
                let scored = Scored {
                    index,
                    score,
                    image,
                };
                best = Some(match best {
                    Some(current) => current.better(scored),
                    None => scored,
                });
            } else {
                tracing::debug!("Candidate {} lost too many words", candidate.label);
            }
        }
    }

    /// `None` when the candidate does not qualify
    fn score(
        &self,
        raw: &RawImage,
        candidate: &Candidate,
        min_words: f64,
    ) -> Result<Option<(f64, EnhancedImage)>> {
        let image = enhance(raw, &candidate.options)?;
        let ocr = self.engine.recognize(image.pixels())?;

        let score = match self.reference {
            Some(reference) => word_accuracy(&ocr.text, reference),
            None if (ocr.word_count() as f64) < min_words => return Ok(None),
            None => ocr.confidence as f64,
        };
        Ok(Some((score, image)))
    }
}

struct Scored {
    index: usize,
    score: f64,
    image: EnhancedImage,
}

impl Scored {
    fn better(self, other: Scored) -> Scored {
        if other.score > self.score || (other.score == self.score && other.index < self.index) {
            other
        } else {
            self
        }
    }
}
