//! # Stream Framer
//!
//! Wire format of a narration stream:
//!
//! ```text
//! <narrative bytes ...><SENTINEL><verdict JSON>
//! ```
//!
//! Fragments are written verbatim, so concatenating them gives the narrative
//! back byte for byte. The verdict frame is optional: a stream that ends
//! without the sentinel (or without JSON after it) means the evaluation is
//! unavailable, never that it passed.

use super::types::{EvaluationVerdict, FramedEvent};

/// Reserved separator between the narrative and the verdict.
///
/// Part of the wire contract shared by every producer and decoder; it is not
/// configurable.
pub const SENTINEL: &str = "<<<|portal:verdict|>>>";

/// Encode one event for the wire
pub fn encode_event(event: &FramedEvent) -> Result<Vec<u8>, serde_json::Error> {
    match event {
        FramedEvent::TextFragment(text) => Ok(text.as_bytes().to_vec()),
        FramedEvent::Evaluation(verdict) => encode_verdict(verdict),
    }
}

/// Sentinel followed by the verdict JSON
pub fn encode_verdict(verdict: &EvaluationVerdict) -> Result<Vec<u8>, serde_json::Error> {
    let mut frame = SENTINEL.as_bytes().to_vec();
    serde_json::to_writer(&mut frame, verdict)?;
    Ok(frame)
}

/// Which part of the stream the decoder is reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderPhase {
    Narrative,
    Evaluation,
}

/// Final state of the verdict part of a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationOutcome {
    Available(EvaluationVerdict),
    /// No verdict frame arrived
    Unavailable,
    /// A frame arrived but is not a valid verdict; it was discarded
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedNarration {
    pub narrative: String,
    pub evaluation: EvaluationOutcome,
}

/// Incremental two-state decoder for narration streams
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    /// Byte offset of the sentinel, once seen
    split: Option<usize>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an increment. Until the sentinel is found, the whole buffer is
    /// re-scanned so a sentinel split across increments is still recognized.
    pub fn push(&mut self, chunk: &[u8]) -> DecoderPhase {
        self.buffer.extend_from_slice(chunk);
        if self.split.is_none() {
            self.split = find(&self.buffer, SENTINEL.as_bytes());
            if let Some(at) = self.split {
                tracing::debug!(narrative_bytes = at, "Verdict sentinel found");
            }
        }
        self.phase()
    }

    pub fn phase(&self) -> DecoderPhase {
        match self.split {
            Some(_) => DecoderPhase::Evaluation,
            None => DecoderPhase::Narrative,
        }
    }

    /// Narrative text that is safe to display right now.
    ///
    /// While still in narrative mode this holds back a trailing partial
    /// sentinel and an incomplete UTF-8 sequence.
    pub fn narrative(&self) -> String {
        match self.split {
            Some(at) => String::from_utf8_lossy(&self.buffer[..at]).into_owned(),
            None => {
                let end = self.buffer.len() - partial_suffix_len(&self.buffer, SENTINEL.as_bytes());
                complete_utf8_prefix(&self.buffer[..end])
            }
        }
    }

    /// Raw bytes received after the sentinel
    pub fn evaluation_bytes(&self) -> Option<&[u8]> {
        self.split
            .map(|at| &self.buffer[at + SENTINEL.len()..])
    }

    /// The verdict, once its JSON has fully arrived
    pub fn verdict(&self) -> Option<EvaluationVerdict> {
        let bytes = self.evaluation_bytes()?;
        serde_json::from_slice::<EvaluationVerdict>(bytes)
            .ok()
            .filter(EvaluationVerdict::is_in_range)
    }

    /// Close the decoder after the channel ended
    pub fn finish(self) -> DecodedNarration {
        let Some(at) = self.split else {
            return DecodedNarration {
                narrative: String::from_utf8_lossy(&self.buffer).into_owned(),
                evaluation: EvaluationOutcome::Unavailable,
            };
        };

        let narrative = String::from_utf8_lossy(&self.buffer[..at]).into_owned();
        let payload = &self.buffer[at + SENTINEL.len()..];
        let evaluation = if payload.iter().all(u8::is_ascii_whitespace) {
            EvaluationOutcome::Unavailable
        } else {
            match serde_json::from_slice::<EvaluationVerdict>(payload) {
                Ok(verdict) if verdict.is_in_range() => EvaluationOutcome::Available(verdict),
                Ok(verdict) => malformed(format!("score {} is out of range", verdict.score)),
                Err(e) => malformed(e.to_string()),
            }
        };

        DecodedNarration {
            narrative,
            evaluation,
        }
    }
}

fn malformed(reason: String) -> EvaluationOutcome {
    tracing::warn!(%reason, "Discarding malformed evaluation frame");
    EvaluationOutcome::Malformed(reason)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Length of the longest proper prefix of `needle` that `buffer` ends with
fn partial_suffix_len(buffer: &[u8], needle: &[u8]) -> usize {
    let max = needle.len().saturating_sub(1).min(buffer.len());
    (1..=max)
        .rev()
        .find(|&k| buffer.ends_with(&needle[..k]))
        .unwrap_or(0)
}

fn complete_utf8_prefix(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        // incomplete trailing sequence: wait for the rest
        Err(e) if e.error_len().is_none() => {
            String::from_utf8_lossy(&bytes[..e.valid_up_to()]).into_owned()
        }
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(narrative: &str, verdict: &EvaluationVerdict) -> Vec<u8> {
        let mut bytes = narrative.as_bytes().to_vec();
        bytes.extend(encode_verdict(verdict).unwrap());
        bytes
    }

    #[test]
    fn test_round_trip_split_mid_sentinel() {
        let verdict = EvaluationVerdict::new(7, "ok");
        let bytes = wire("Hello world.", &verdict);
        let cut = "Hello world.".len() + SENTINEL.len() / 2;

        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.push(&bytes[..cut]), DecoderPhase::Narrative);
        // the half sentinel is never shown as narrative
        assert_eq!(decoder.narrative(), "Hello world.");
        assert_eq!(decoder.push(&bytes[cut..]), DecoderPhase::Evaluation);
        assert_eq!(decoder.verdict(), Some(verdict.clone()));

        let decoded = decoder.finish();
        assert_eq!(decoded.narrative, "Hello world.");
        assert_eq!(decoded.evaluation, EvaluationOutcome::Available(verdict));
    }

    #[test]
    fn test_round_trip_every_chunk_size() {
        let verdict = EvaluationVerdict::new(7, "ok");
        let bytes = wire("Hello world.", &verdict);

        for size in 1..=bytes.len() {
            let mut decoder = StreamDecoder::new();
            for chunk in bytes.chunks(size) {
                decoder.push(chunk);
            }
            let decoded = decoder.finish();
            assert_eq!(decoded.narrative, "Hello world.", "chunk size {}", size);
            assert_eq!(decoded.evaluation, EvaluationOutcome::Available(verdict.clone()));
        }
    }

    #[test]
    fn test_json_arriving_in_pieces() {
        let mut decoder = StreamDecoder::new();
        decoder.push(b"Quiet place.");
        decoder.push(SENTINEL.as_bytes());
        decoder.push(br#"{"score":5,"reas"#);
        assert_eq!(decoder.phase(), DecoderPhase::Evaluation);
        assert_eq!(decoder.verdict(), None);

        decoder.push(br#"oning":"meh"}"#);
        assert_eq!(decoder.verdict(), Some(EvaluationVerdict::new(5, "meh")));
    }

    #[test]
    fn test_missing_verdict_keeps_narrative() {
        let mut decoder = StreamDecoder::new();
        decoder.push(b"Partial tour of Gazorpazorp");
        let decoded = decoder.finish();
        assert_eq!(decoded.narrative, "Partial tour of Gazorpazorp");
        assert_eq!(decoded.evaluation, EvaluationOutcome::Unavailable);
    }

    #[test]
    fn test_sentinel_without_payload_is_unavailable() {
        let mut decoder = StreamDecoder::new();
        decoder.push(b"Tour.");
        decoder.push(SENTINEL.as_bytes());
        assert_eq!(decoder.finish().evaluation, EvaluationOutcome::Unavailable);
    }

    #[test]
    fn test_malformed_frame_is_discarded() {
        let mut decoder = StreamDecoder::new();
        decoder.push(b"Tour.");
        decoder.push(SENTINEL.as_bytes());
        decoder.push(b"{not json");
        let decoded = decoder.finish();
        assert_eq!(decoded.narrative, "Tour.");
        assert!(matches!(decoded.evaluation, EvaluationOutcome::Malformed(_)));
    }

    #[test]
    fn test_split_utf8_is_held_back() {
        let text = "Schwifty 🎶";
        let bytes = text.as_bytes();
        let mut decoder = StreamDecoder::new();
        decoder.push(&bytes[..bytes.len() - 2]);
        assert_eq!(decoder.narrative(), "Schwifty ");
        decoder.push(&bytes[bytes.len() - 2..]);
        assert_eq!(decoder.narrative(), text);
    }

    #[test]
    fn test_fragments_concatenate_exactly() {
        let fragments = ["Wel", "come", " to ", "the ", "Citadel", "..."];
        let mut decoder = StreamDecoder::new();
        for fragment in fragments {
            let bytes = encode_event(&FramedEvent::TextFragment(fragment.to_string())).unwrap();
            decoder.push(&bytes);
        }
        assert_eq!(decoder.narrative(), fragments.concat());
    }

    #[test]
    fn test_partial_suffix_len() {
        assert_eq!(partial_suffix_len(b"abc<<<", SENTINEL.as_bytes()), 3);
        assert_eq!(partial_suffix_len(b"abc", SENTINEL.as_bytes()), 0);
        assert_eq!(partial_suffix_len(b"", SENTINEL.as_bytes()), 0);
    }
}
