//! Lenient parsing of model output into MIDI notes
//!
//! The text model is asked for a bare JSON array but sometimes wraps it in
//! an object or in prose. Unparseable output becomes an empty pattern
//! rather than an error.

use crate::models::studio::MidiNote;
use serde::Deserialize;
use tracing::warn;

#[derive(Deserialize)]
#[serde(untagged)]
enum MidiPayload {
    Notes(Vec<MidiNote>),
    Wrapped { notes: Vec<MidiNote> },
}

fn parse_payload(text: &str) -> Option<Vec<MidiNote>> {
    match serde_json::from_str::<MidiPayload>(text) {
        Ok(MidiPayload::Notes(notes)) | Ok(MidiPayload::Wrapped { notes }) => Some(notes),
        Err(_) => None,
    }
}

/// First `[` through last `]`, the widest candidate array in the text
fn embedded_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

pub fn parse_midi_notes(text: &str) -> Vec<MidiNote> {
    let trimmed = text.trim();
    if let Some(notes) = parse_payload(trimmed) {
        return notes;
    }

    if let Some(candidate) = embedded_array(trimmed) {
        if let Ok(notes) = serde_json::from_str::<Vec<MidiNote>>(candidate) {
            return notes;
        }
        warn!("Failed to parse extracted JSON array from model output");
    } else {
        warn!("Model output is not in the expected note array format");
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTE: &str = r#"{"pitch":60,"start":0,"duration":1.5,"velocity":100}"#;

    #[test]
    fn test_bare_array() {
        let notes = parse_midi_notes(&format!("[{NOTE},{NOTE}]"));
        assert_eq!(notes.len(), 2);
        assert_eq!(
            notes[0],
            MidiNote {
                pitch: 60,
                start: 0.0,
                duration: 1.5,
                velocity: 100
            }
        );
    }

    #[test]
    fn test_wrapped_in_notes_object() {
        let notes = parse_midi_notes(&format!("{{\"notes\":[{NOTE}]}}"));
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn test_array_inside_prose() {
        let text = format!("Here is your pattern:\n```json\n[{NOTE}]\n```\nEnjoy!");
        assert_eq!(parse_midi_notes(&text).len(), 1);
    }

    #[test]
    fn test_garbage_is_empty() {
        assert!(parse_midi_notes("I cannot help with that.").is_empty());
        assert!(parse_midi_notes("{\"tempo\": 120}").is_empty());
        assert!(parse_midi_notes("] backwards [").is_empty());
    }
}
