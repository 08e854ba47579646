//! Target formats and per-request conversion options

use crate::audio::converter::ConversionError;
use std::fmt;
use std::str::FromStr;

/// Sample rates accepted from clients
pub const MIN_SAMPLE_RATE: u32 = 8_000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
    Ogg,
    Flac,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Flac => "flac",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Flac => "audio/flac",
        }
    }

    /// Encoder arguments passed to the conversion tool
    pub fn codec_args(self) -> &'static [&'static str] {
        match self {
            AudioFormat::Wav => &["-c:a", "pcm_s16le"],
            AudioFormat::Mp3 => &["-c:a", "libmp3lame", "-q:a", "2"],
            AudioFormat::Ogg => &["-c:a", "libvorbis", "-q:a", "5"],
            AudioFormat::Flac => &["-c:a", "flac"],
        }
    }
}

impl FromStr for AudioFormat {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" | "wave" => Ok(AudioFormat::Wav),
            "mp3" | "mpeg" => Ok(AudioFormat::Mp3),
            "ogg" | "vorbis" => Ok(AudioFormat::Ogg),
            "flac" => Ok(AudioFormat::Flac),
            other => Err(ConversionError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionOptions {
    pub format: AudioFormat,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
}

impl ConversionOptions {
    /// Mono 16 kHz MP3: small enough to inline into a model request
    pub fn for_transcription() -> Self {
        Self {
            format: AudioFormat::Mp3,
            sample_rate: Some(16_000),
            channels: Some(1),
        }
    }

    /// Build options from raw multipart field values
    pub fn from_fields(
        format: Option<&str>,
        sample_rate: Option<&str>,
        channels: Option<&str>,
    ) -> Result<Self, ConversionError> {
        let format = match format.map(str::trim).filter(|f| !f.is_empty()) {
            Some(f) => f.parse()?,
            None => AudioFormat::default(),
        };

        let sample_rate = match sample_rate.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => {
                let rate: u32 = raw.parse().map_err(|_| {
                    ConversionError::InvalidOption(format!("sampleRate must be an integer, got '{}'", raw))
                })?;
                if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate) {
                    return Err(ConversionError::InvalidOption(format!(
                        "sampleRate must be between {} and {}",
                        MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
                    )));
                }
                Some(rate)
            }
            None => None,
        };

        let channels = match channels.map(str::trim).filter(|c| !c.is_empty()) {
            Some("1") => Some(1),
            Some("2") => Some(2),
            Some(other) => {
                return Err(ConversionError::InvalidOption(format!(
                    "channels must be 1 or 2, got '{}'",
                    other
                )));
            }
            None => None,
        };

        Ok(Self {
            format,
            sample_rate,
            channels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        assert_eq!("MP3".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert_eq!(" flac ".parse::<AudioFormat>().unwrap(), AudioFormat::Flac);
        assert!(matches!(
            "aiff".parse::<AudioFormat>(),
            Err(ConversionError::UnsupportedFormat(f)) if f == "aiff"
        ));
    }

    #[test]
    fn test_options_defaults() {
        let options = ConversionOptions::from_fields(None, None, Some("")).unwrap();
        assert_eq!(options, ConversionOptions::default());
        assert_eq!(options.format, AudioFormat::Wav);
    }

    #[test]
    fn test_options_validation() {
        let options = ConversionOptions::from_fields(Some("ogg"), Some("44100"), Some("2")).unwrap();
        assert_eq!(options.format, AudioFormat::Ogg);
        assert_eq!(options.sample_rate, Some(44_100));
        assert_eq!(options.channels, Some(2));

        assert!(ConversionOptions::from_fields(None, Some("fast"), None).is_err());
        assert!(ConversionOptions::from_fields(None, Some("1000"), None).is_err());
        assert!(ConversionOptions::from_fields(None, None, Some("6")).is_err());
    }
}
