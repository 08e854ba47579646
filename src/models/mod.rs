//! API data models
//!
//! Frontend-facing bodies and the Gemini wire format.

pub mod gemini;
pub mod studio;
