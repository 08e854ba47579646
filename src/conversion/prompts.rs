//! Prompt templates sent to the text model

use serde_json::{json, Value};

/// Schema constraining MIDI responses to an array of notes
pub fn midi_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "pitch": {
                    "type": "INTEGER",
                    "description": "MIDI pitch number (0-127). Middle C (C4) is 60."
                },
                "start": {
                    "type": "NUMBER",
                    "description": "Start time in beats from the beginning of the pattern."
                },
                "duration": {
                    "type": "NUMBER",
                    "description": "Duration of the note in beats."
                },
                "velocity": {
                    "type": "INTEGER",
                    "description": "Note velocity (0-127), representing loudness."
                }
            },
            "required": ["pitch", "start", "duration", "velocity"]
        }
    })
}

pub fn midi_pattern_prompt(description: &str, pattern_type: &str, bars: u32, bpm: u32) -> String {
    format!(
        "You are an expert MIDI music composer. Generate a {bars}-bar MIDI pattern in 4/4 time \
         at {bpm} BPM for a {pattern_type} part, based on the following description: \
         \"{description}\". Ensure the pattern is creative and musically coherent. Respond ONLY \
         with a JSON object that adheres to the provided schema."
    )
}

pub fn audio_to_midi_prompt(instrument: &str) -> String {
    format!(
        "You are an expert audio-to-MIDI transcriber. From the provided audio file, extract the \
         {instrument} part and convert it into a detailed MIDI pattern in 4/4 time. Respond ONLY \
         with a JSON object that adheres to the provided schema."
    )
}

pub fn enhance_prompt(idea: &str) -> String {
    format!(
        r#"You are an expert creative writer for music generation AI.
Take the following simple musical idea and expand it into a detailed, descriptive, and evocative prompt.
The goal is to give the AI MIDI generator a rich source of inspiration.
Focus on elements like:
- **Atmosphere and Mood:** Describe the overall feeling and setting.
- **Rhythm and Tempo:** Mention specific rhythmic ideas (e.g., syncopated, driving four-on-the-floor, complex polyrhythms) and tempo characteristics.
- **Harmony and Melody:** Suggest melodic contours, chord progressions, or harmonic textures (e.g., dissonant, consonant, melancholic minor key).
- **Instrumentation Details:** Suggest how specific instruments should be played (e.g., 'a funky bassline with slides and ghost notes', 'delicate piano arpeggios').
- **Dynamics:** Describe changes in volume and intensity.

Do NOT respond with JSON or code. Respond ONLY with the text of the enhanced prompt itself.

Simple Idea: "{idea}"

Enhanced Prompt:"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_prompt_carries_parameters() {
        let prompt = midi_pattern_prompt("dark techno", "bassline", 8, 128);
        assert!(prompt.contains("8-bar"));
        assert!(prompt.contains("128 BPM"));
        assert!(prompt.contains("bassline part"));
        assert!(prompt.contains("\"dark techno\""));
    }

    #[test]
    fn test_schema_requires_all_fields() {
        let schema = midi_schema();
        assert_eq!(schema["items"]["required"].as_array().unwrap().len(), 4);
    }
}
