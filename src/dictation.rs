//! Speech-to-text seam for push-to-talk dictation.
//!
//! Audio capture and transcription live behind [`Transcriber`]; this module
//! only cleans the text it produces before it is typed.

use std::sync::OnceLock;

use crossbeam_channel::Receiver;
use regex::Regex;

use crate::error::ActionError;

/// A speech-to-text backend running on its own thread. Finished text chunks
/// arrive on [`Transcriber::transcripts`] and are drained once per frame.
pub trait Transcriber {
    fn start(&mut self) -> Result<(), ActionError>;
    fn stop(&mut self) -> Result<(), ActionError>;
    fn transcripts(&self) -> &Receiver<String>;
}

fn artefact_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\s+thank you\.?$",
            r"(?i)\s+thanks\.?$",
            r"(?i)\s+bye\.?$",
            r"(?i)\s+you\.?\s*$",
            r"(?i)^you\s+",
            r"(?i)^\s*you\.?\s*$",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Strip the filler words speech models hallucinate at chunk boundaries
/// and collapse whitespace.
pub fn clean_transcription(text: &str) -> String {
    let mut cleaned = text.trim().to_string();
    for pattern in artefact_patterns() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
