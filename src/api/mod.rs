//! HTTP API routers for the studio and audio services

pub mod audio_endpoints;
pub mod endpoints;
