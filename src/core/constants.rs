//! Constants shared by both services
//!
//! Upstream model identifiers, generation defaults, and the user-facing
//! error messages returned in `{"error": ...}` bodies.

/// Upstream model and generation defaults
pub mod upstream {
    /// Default Gemini REST base URL
    pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

    /// Default image generation model
    pub const IMAGE_MODEL: &str = "imagen-4.0-generate-001";

    /// Default text model used for prompt enhancement and MIDI generation
    pub const TEXT_MODEL: &str = "gemini-2.5-pro";

    /// Default model for the streaming wizard chat
    pub const CHAT_MODEL: &str = "gemini-2.5-flash";

    /// Default text-to-speech model
    pub const SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";

    /// Default prebuilt voice for speech generation
    pub const SPEECH_VOICE: &str = "Charon";

    /// Default video generation model
    pub const VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";

    /// Number of videos requested per generation
    pub const VIDEO_COUNT: u32 = 1;

    /// Number of images requested per generation
    pub const IMAGE_COUNT: u32 = 1;

    /// Output mime type requested from the image model
    pub const IMAGE_MIME_TYPE: &str = "image/jpeg";

    /// Aspect ratio requested from the image model
    pub const IMAGE_ASPECT_RATIO: &str = "1:1";

    /// Mime type reported when the speech model omits one
    pub const SPEECH_MIME_TYPE: &str = "audio/L16;codec=pcm;rate=24000";

    /// Mime type of downloaded videos
    pub const VIDEO_MIME_TYPE: &str = "video/mp4";

    /// Header carrying the API key
    pub const API_KEY_HEADER: &str = "x-goog-api-key";

    /// Display name of the provider
    pub const PROVIDER_NAME: &str = "gemini";
}

/// Health check bodies
pub mod health {
    pub const STUDIO_RUNNING: &str = "Audiomancer Backend is Running Securely!";

    pub const AUDIO_RUNNING: &str = "Audiomancer Audio Service is Running!";
}

/// Error messages returned to clients
pub mod message {
    pub const PROMPT_REQUIRED: &str = "Prompt is required.";

    pub const API_KEY_MISSING: &str = "API key not configured on the server.";

    pub const UNEXPECTED: &str = "An unexpected server error occurred.";

    pub const NO_IMAGE: &str = "No image was generated by the API.";

    pub const IMAGE_FAILED: &str = "AI Generation Failed";

    pub const ENHANCE_FAILED: &str = "Prompt Enhancement Failed";

    pub const MIDI_FAILED: &str = "MIDI Generation Failed";

    pub const AUDIO_TO_MIDI_FAILED: &str = "Audio to MIDI Conversion Failed";

    pub const FILE_REQUIRED: &str = "An audio file is required in the 'file' field.";

    pub const TOOL_MISSING: &str = "Audio conversion tool is not available on the server.";

    pub const MESSAGE_REQUIRED: &str = "Message is required.";

    pub const TEXT_REQUIRED: &str = "Text is required.";

    pub const OPERATION_REQUIRED: &str = "A valid video operation name is required.";

    pub const NO_AUDIO: &str = "No audio data received from API.";

    pub const NO_VIDEO: &str = "No video was generated by the API.";

    pub const CHAT_FAILED: &str = "Chat Failed";

    pub const SPEECH_FAILED: &str = "Speech Generation Failed";

    pub const VIDEO_FAILED: &str = "Video Generation Failed";
}

/// Chat persona and limits
pub mod chat {
    pub const SYSTEM_INSTRUCTION: &str = "You are the Audiomancer Wizard, an AI assistant specializing in music theory, composition, and technology. Your persona is that of a wise and slightly mystical guide. Be friendly, helpful, and concise.";

    /// Earlier turns beyond this are dropped, oldest first
    pub const MAX_HISTORY_TURNS: usize = 50;

    pub const ROLE_USER: &str = "user";

    pub const ROLE_MODEL: &str = "model";
}

/// Video generation options accepted from the frontend
pub mod video {
    pub const ASPECT_RATIOS: &[&str] = &["16:9", "9:16"];

    pub const RESOLUTIONS: &[&str] = &["720p", "1080p"];

    pub const DEFAULT_ASPECT_RATIO: &str = "16:9";

    pub const DEFAULT_RESOLUTION: &str = "1080p";
}

/// MIDI pattern defaults and bounds
pub mod midi {
    pub const DEFAULT_PATTERN_TYPE: &str = "melody";

    pub const DEFAULT_BARS: u32 = 4;

    pub const DEFAULT_BPM: u32 = 120;

    pub const MIN_BARS: u32 = 1;

    pub const MAX_BARS: u32 = 64;

    pub const MIN_BPM: u32 = 20;

    pub const MAX_BPM: u32 = 300;

    /// Instrument assumed when an audio upload names none
    pub const DEFAULT_INSTRUMENT: &str = "melody";
}

/// Frontend origins allowed by default
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://localhost:3000",
    "https://*.vercel.app",
    "https://audiomancer-aii.vercel.app",
];
