//! Conversion between frontend requests and model prompts/output

pub mod chat;
pub mod midi;
pub mod prompts;
