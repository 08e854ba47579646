//! Audiomancer backend
//!
//! Two small HTTP services for the Audiomancer frontend: a studio API that
//! relays image, prompt and MIDI generation to the Gemini API while keeping
//! the key on the server, and an audio service that wraps `ffmpeg`.

pub mod api;
pub mod audio;
pub mod conversion;
pub mod core;
pub mod models;

#[cfg(test)]
mod test_support;
