//! Audiomancer studio API
//!
//! Accepts image, prompt-enhancement and MIDI requests from the frontend
//! and forwards them to the Gemini API, keeping the API key server-side.

use audiomancer_backend::api::endpoints::{create_router, AppState};
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
    print_startup_banner(&config);

    let provider: Option<Arc<dyn GenerativeProvider>> = match GeminiProvider::from_config(&config) {
        Ok(Some(provider)) => Some(Arc::new(provider)),
        Ok(None) => {
            warn!("API_KEY is not set; generation endpoints will answer 500");
            None
        }
        Err(e) => {
            error!("Failed to create provider: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Some(provider) = &provider {
        info!("Using provider: {}", provider.provider_name());
    }

    let app = create_router(AppState {
        config: config.clone(),
        provider,
    });

    if let Err(e) = serve(app, &config.host, config.port).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Print startup banner with configuration
fn print_startup_banner(config: &Config) {
    println!("🔮 Audiomancer Studio API v{}", env!("CARGO_PKG_VERSION"));
    println!("✅ Configuration loaded successfully");
    println!("   API Key: {}", config.redacted_api_key());
    println!("   Base URL: {}", config.gemini_base_url);
    println!("   Image Model: {}", config.image_model);
    println!("   Text Model: {}", config.text_model);
    println!("   Chat Model: {}", config.chat_model);
    println!("   Speech Model: {} (voice {})", config.speech_model, config.speech_voice);
    println!("   Video Model: {}", config.video_model);
    println!("   Request Timeout: {}s", config.request_timeout);
    println!("   Allowed Origins: {}", config.allowed_origins.join(", "));
    println!("   Server: {}:{}", config.host, config.port);
    println!();
}

/// Print help message
fn print_help() {
    println!("Audiomancer Studio API v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: audiomancer-api [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --help    Display this help message");
    println!();
    println!("Endpoints:");
    println!("  GET  /api                  Health check");
    println!("  GET  /api/health           Detailed health check");
    println!("  POST /api/generate-image   {{\"prompt\"}} -> {{\"imageBytes\"}}");
    println!("  POST /api/enhance-prompt   {{\"prompt\"}} -> {{\"prompt\"}}");
    println!("  POST /api/generate-midi    {{\"prompt\", \"patternType\", \"duration\", \"bpm\"}} -> {{\"notes\"}}");
    println!("  POST /api/chat             {{\"message\", \"history\", \"useSearch\"}} -> text/event-stream");
    println!("  POST /api/generate-speech  {{\"text\"}} -> {{\"audioBytes\", \"mimeType\"}}");
    println!("  POST /api/generate-video   {{\"prompt\", \"aspectRatio\", \"resolution\", \"image\"}} -> {{\"operation\"}}");
    println!("  GET  /api/video-status     ?operation=... -> {{\"done\", \"videoBytes\", \"mimeType\"}}");
    println!();
    println!("Environment variables:");
    println!("  CONFIG_PATH - TOML configuration file (default: config.toml, optional)");
    println!("  API_KEY - Gemini API key (generation endpoints answer 500 without it)");
    println!("  GEMINI_BASE_URL - API base URL");
    println!("  HOST - Server host (default: 0.0.0.0)");
    println!("  PORT - Server port (default: 5000)");
    println!("  LOG_LEVEL - Logging level (default: info)");
    println!("  ALLOWED_ORIGINS - Comma separated CORS origins, '*' wildcards allowed");
}
