//! Turning a cropped sub-image into a typed numeric value with a confidence
//! score.
//!
//! The pipeline is: upscale → grayscale → contrast stretch → binarize →
//! digit-restricted text recognition → field-kind-aware decimal parsing.
//! Low confidence never discards a result; the score travels with the value
//! so the caller decides. An engine failure surfaces as confidence 0 with an
//! error tag — never a synthetic stand-in value.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::capture::BackendKind;
use crate::extract::SubImage;
use crate::geometry::WindowRegion;

pub mod engine;
pub mod parse;
pub mod preprocess;

pub use engine::{RecognizedText, TesseractCli, TextRecognizer};
pub use parse::parse_value;

/// Characters the recognizer is allowed to emit: digits, separators, and
/// the currency symbols that show up next to money amounts.
pub const VALUE_WHITELIST: &str = "0123456789.,€$£ ";

/// Confidence below this is "unreliable, do not act automatically". The
/// result is still returned with its score intact.
pub const UNRELIABLE_CONFIDENCE: f32 = 30.0;

/// Which on-screen field a region shows. Bounds the plausible magnitude of
/// the parsed value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Bet,
    Win,
    Balance,
}

impl FieldKind {
    /// Maximum plausible count of integer digits; values beyond this are
    /// rejected rather than clamped.
    pub fn max_integer_digits(&self) -> usize {
        match self {
            FieldKind::Bet | FieldKind::Win => 4,
            FieldKind::Balance => 6,
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Bet => write!(f, "bet"),
            FieldKind::Win => write!(f, "win"),
            FieldKind::Balance => write!(f, "balance"),
        }
    }
}

/// Terminal artifact of one region's recognition. Immutable once produced.
#[derive(Clone, Debug)]
pub struct RecognitionResult {
    pub raw_text: String,
    pub parsed_value: Option<f64>,
    /// Character-level confidence, 0–100.
    pub confidence: f32,
    pub region: WindowRegion,
    pub backend_used: BackendKind,
    pub recognized_at: DateTime<Local>,
    /// Set when the recognition engine itself failed (confidence is 0).
    pub error: Option<String>,
}

impl RecognitionResult {
    pub fn is_reliable(&self) -> bool {
        self.error.is_none() && self.confidence >= UNRELIABLE_CONFIDENCE
    }
}

/// Recognizer over a pluggable text-recognition engine.
pub struct ValueRecognizer {
    engine: Box<dyn TextRecognizer>,
    binarize_threshold: u8,
}

impl ValueRecognizer {
    pub fn new(engine: Box<dyn TextRecognizer>) -> Self {
        Self {
            engine,
            binarize_threshold: preprocess::DEFAULT_THRESHOLD,
        }
    }

    /// The stock engine: the Tesseract executable driven over TSV output.
    pub fn with_tesseract() -> crate::Result<Self> {
        Ok(Self::new(Box::new(TesseractCli::discover()?)))
    }

    pub fn with_binarize_threshold(mut self, threshold: u8) -> Self {
        self.binarize_threshold = threshold;
        self
    }

    /// Runs the full pipeline on one sub-image.
    pub fn recognize(
        &self,
        sub: &SubImage,
        kind: FieldKind,
        backend_used: BackendKind,
    ) -> RecognitionResult {
        let prepared = preprocess::prepare(&sub.image, self.binarize_threshold);

        match self.engine.recognize_line(&prepared, VALUE_WHITELIST) {
            Ok(recognized) => {
                let parsed_value = parse_value(&recognized.text, kind);
                RecognitionResult {
                    raw_text: recognized.text,
                    parsed_value,
                    confidence: recognized.confidence,
                    region: sub.region,
                    backend_used,
                    recognized_at: Local::now(),
                    error: None,
                }
            }
            Err(e) => RecognitionResult {
                raw_text: String::new(),
                parsed_value: None,
                confidence: 0.0,
                region: sub.region,
                backend_used,
                recognized_at: Local::now(),
                error: Some(e.to_string()),
            },
        }
    }
}
