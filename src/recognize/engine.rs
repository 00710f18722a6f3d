//! Text-recognition engine interface and the Tesseract CLI adapter.

use std::path::PathBuf;
use std::process::Command;

use image::{ImageBuffer, Luma};
use log::debug;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// One recognized line with word-level confidence scores.
#[derive(Clone, Debug)]
pub struct RecognizedText {
    pub text: String,
    /// `(word, confidence)` pairs in reading order.
    pub words: Vec<(String, f32)>,
    /// Mean word confidence, 0–100.
    pub confidence: f32,
}

/// A text-recognition engine accepting a raster and a character whitelist.
/// Pluggable so tests run without an OCR installation.
pub trait TextRecognizer: Send + Sync {
    fn recognize_line(
        &self,
        img: &ImageBuffer<Luma<u8>, Vec<u8>>,
        whitelist: &str,
    ) -> Result<RecognizedText>;
}

/// Environment variable overriding the Tesseract executable location.
pub const TESSERACT_ENV: &str = "VALUELENS_TESSERACT";

/// Drives the Tesseract executable with TSV output for word-level
/// confidence.
pub struct TesseractCli {
    executable: PathBuf,
}

impl TesseractCli {
    /// Locates the executable: `VALUELENS_TESSERACT` first, then `PATH`.
    pub fn discover() -> Result<Self> {
        if let Ok(path) = std::env::var(TESSERACT_ENV) {
            let path = PathBuf::from(path);
            if path.is_file() {
                return Ok(Self { executable: path });
            }
            return Err(Error::RecognitionFailed(format!(
                "{} points to a missing file",
                TESSERACT_ENV
            )));
        }
        // Rely on PATH resolution at spawn time; probe once so a missing
        // install fails at construction, not mid-cycle.
        let probe = Command::new("tesseract").arg("--version").output();
        match probe {
            Ok(out) if out.status.success() => Ok(Self {
                executable: PathBuf::from("tesseract"),
            }),
            _ => Err(Error::RecognitionFailed(
                "tesseract executable not found on PATH".into(),
            )),
        }
    }

    pub fn at(executable: PathBuf) -> Self {
        Self { executable }
    }
}

impl TextRecognizer for TesseractCli {
    fn recognize_line(
        &self,
        img: &ImageBuffer<Luma<u8>, Vec<u8>>,
        whitelist: &str,
    ) -> Result<RecognizedText> {
        let temp_input = NamedTempFile::with_suffix(".png")
            .map_err(|e| Error::RecognitionFailed(e.to_string()))?;
        img.save(temp_input.path())
            .map_err(|e| Error::RecognitionFailed(e.to_string()))?;

        // Tesseract appends .tsv to the output base itself.
        let temp_output =
            NamedTempFile::new().map_err(|e| Error::RecognitionFailed(e.to_string()))?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let output = Command::new(&self.executable)
            .arg(temp_input.path())
            .arg(&output_base)
            .arg("--psm")
            .arg("7") // single text line
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", whitelist))
            .arg("tsv")
            .output()
            .map_err(|e| Error::RecognitionFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::RecognitionFailed(format!(
                "tesseract exited with {}: {}",
                output.status, stderr
            )));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv = std::fs::read_to_string(&tsv_path)
            .map_err(|e| Error::RecognitionFailed(format!("reading tesseract output: {}", e)))?;
        let _ = std::fs::remove_file(&tsv_path);

        let recognized = parse_tsv_line(&tsv);
        debug!(
            "ocr: \"{}\" ({} word(s), conf {:.0})",
            recognized.text,
            recognized.words.len(),
            recognized.confidence
        );
        Ok(recognized)
    }
}

/// Collapses Tesseract's TSV output into a single line with a mean word
/// confidence. An image with no recognizable words yields empty text at
/// confidence 0.
fn parse_tsv_line(tsv: &str) -> RecognizedText {
    let mut words: Vec<(String, f32)> = Vec::new();

    for line in tsv.lines().skip(1) {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }
        // TSV fields: level, page, block, par, line, word, left, top,
        // width, height, conf, text. Level 5 rows are words.
        let level: i32 = fields[0].parse().unwrap_or(-1);
        if level != 5 {
            continue;
        }
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        let text = fields[11].trim();
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        words.push((text.to_string(), conf));
    }

    let confidence = if words.is_empty() {
        0.0
    } else {
        words.iter().map(|(_, c)| c).sum::<f32>() / words.len() as f32
    };
    let text = words
        .iter()
        .map(|(w, _)| w.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    RecognizedText {
        text,
        words,
        confidence,
    }
}
