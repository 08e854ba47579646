//! Audiomancer audio service
//!
//! Accepts audio uploads, converts them with `ffmpeg` inside a temporary
//! directory, and optionally transcribes them to MIDI via the Gemini API.

use audiomancer_backend::api::audio_endpoints::{create_audio_router, AudioState};
use audiomancer_backend::audio::converter::{AudioConverter, FfmpegConverter};
use audiomancer_backend::core::config::Config;
use audiomancer_backend::core::logging::init_logging;
use audiomancer_backend::core::provider::GenerativeProvider;
use audiomancer_backend::core::providers::GeminiProvider;
use audiomancer_backend::core::server::serve;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if std::env::args().any(|arg| arg == "--help") {
        print_help();
        return;
    }

    dotenv::dotenv().ok();

    let config = match Config::from_env() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            eprintln!("Configuration Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log_level);

    println!("🎧 Audiomancer Audio Service v{}", env!("CARGO_PKG_VERSION"));
    println!("   Conversion Tool: {}", config.ffmpeg_path);
    println!("   Conversion Timeout: {}s", config.conversion_timeout);
    println!("   Max Upload: {} bytes", config.max_upload_bytes);
    println!("   Server: {}:{}", config.host, config.audio_port);
    println!();

    let converter = FfmpegConverter::from_config(&config);
    if converter.is_available().await {
        info!("Conversion tool found at {}", config.ffmpeg_path);
    } else {
        warn!(
            "Conversion tool {} cannot be executed; conversions will answer 500",
            config.ffmpeg_path
        );
    }

    let provider: Option<Arc<dyn GenerativeProvider>> = match GeminiProvider::from_config(&config) {
        Ok(provider) => provider.map(|p| Arc::new(p) as Arc<dyn GenerativeProvider>),
        Err(e) => {
            error!("Failed to create provider: {:#}", e);
            std::process::exit(1);
        }
    };
    if provider.is_none() {
        warn!("API_KEY is not set; /api/audio/to-midi will answer 500");
    }

    let app = create_audio_router(AudioState {
        config: config.clone(),
        converter: Arc::new(converter),
        provider,
    });

    if let Err(e) = serve(app, &config.host, config.audio_port).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn print_help() {
    println!("Audiomancer Audio Service v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: audiomancer-audio [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --help    Display this help message");
    println!();
    println!("Endpoints:");
    println!("  GET  /api                Health check");
    println!("  GET  /api/audio/health   Conversion tool status");
    println!("  POST /api/audio/convert  multipart: file, format (wav|mp3|ogg|flac), sampleRate, channels");
    println!("  POST /api/audio/to-midi  multipart: file, instrument");
    println!();
    println!("Environment variables:");
    println!("  CONFIG_PATH - TOML configuration file (default: config.toml, optional)");
    println!("  FFMPEG_PATH - Conversion tool executable (default: ffmpeg)");
    println!("  AUDIO_PORT - Server port (default: 5001)");
    println!("  HOST - Server host (default: 0.0.0.0)");
    println!("  API_KEY - Gemini API key, needed for audio-to-MIDI only");
    println!("  LOG_LEVEL - Logging level (default: info)");
    println!("  ALLOWED_ORIGINS - Comma separated CORS origins, '*' wildcards allowed");
}
