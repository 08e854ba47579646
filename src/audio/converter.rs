//! Conversion tool wrapper
//!
//! Each conversion gets its own temporary directory holding the upload and
//! the tool's output. The directory is removed when the conversion returns,
//! whatever the outcome, and the child process is killed if the request is
//! dropped or the timeout fires.

use crate::audio::format::{AudioFormat, ConversionOptions};
use crate::core::config::Config;
use crate::core::constants::message;
use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Longest stderr excerpt relayed to clients
const MAX_STDERR_CHARS: usize = 500;

/// Timeout for the `-version` availability check
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Unsupported output format '{0}'. Supported formats: wav, mp3, ogg, flac.")]
    UnsupportedFormat(String),

    #[error("{0}")]
    InvalidOption(String),

    #[error("The uploaded audio file is empty.")]
    EmptyInput,

    #[error("{}", message::TOOL_MISSING)]
    ToolUnavailable,

    #[error("Audio conversion failed: {0}")]
    Failed(String),

    #[error("Audio conversion timed out after {0}s.")]
    Timeout(u64),

    #[error("Audio conversion failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ConversionError {
    /// Whether the client sent something unusable
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ConversionError::UnsupportedFormat(_)
                | ConversionError::InvalidOption(_)
                | ConversionError::EmptyInput
        )
    }
}

/// An uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub file_name: Option<String>,
    pub data: Vec<u8>,
}

impl AudioUpload {
    pub fn new(file_name: Option<String>, data: Vec<u8>) -> Self {
        Self { file_name, data }
    }

    /// Lowercase alphanumeric extension of the client file name, or `bin`
    pub fn extension(&self) -> String {
        self.file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| {
                !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string())
    }

    /// Client file stem reduced to a header-safe character set
    pub fn safe_stem(&self) -> String {
        let stem: String = self
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).file_stem())
            .and_then(|stem| stem.to_str())
            .unwrap_or("")
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .take(64)
            .collect();

        if stem.trim_matches('_').is_empty() {
            "audio".to_string()
        } else {
            stem
        }
    }
}

/// Result of a successful conversion
#[derive(Debug, Clone)]
pub struct ConvertedAudio {
    pub data: Vec<u8>,
    pub format: AudioFormat,
    pub file_name: String,
}

/// Trait for audio conversion backends
#[async_trait]
pub trait AudioConverter: Send + Sync {
    /// Convert an upload according to `options`
    async fn convert(
        &self,
        upload: &AudioUpload,
        options: &ConversionOptions,
    ) -> Result<ConvertedAudio, ConversionError>;

    /// Whether the backing tool can be executed
    async fn is_available(&self) -> bool;
}

/// `ffmpeg`-backed converter
pub struct FfmpegConverter {
    program: PathBuf,
    timeout: Duration,
    workdir_root: Option<PathBuf>,
}

impl FfmpegConverter {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            workdir_root: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.ffmpeg_path,
            Duration::from_secs(config.conversion_timeout),
        )
    }

    /// Create per-request directories under `root` instead of the system temp dir
    pub fn with_workdir_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workdir_root = Some(root.into());
        self
    }

    fn create_workdir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("audiomancer-");
        match &self.workdir_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }

    /// Command-line arguments for converting `input` into `output`
    pub fn build_args(input: &Path, output: &Path, options: &ConversionOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-nostdin", "-y", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_owned());
        args.push("-vn".into());

        if let Some(channels) = options.channels {
            args.push("-ac".into());
            args.push(channels.to_string().into());
        }
        if let Some(rate) = options.sample_rate {
            args.push("-ar".into());
            args.push(rate.to_string().into());
        }
        args.extend(options.format.codec_args().iter().map(OsString::from));
        args.push(output.as_os_str().to_owned());
        args
    }

    /// Last lines of the tool's stderr, bounded for relaying to clients
    fn summarize_stderr(stderr: &[u8]) -> String {
        let text = String::from_utf8_lossy(stderr);
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if lines.is_empty() {
            return "the conversion tool exited with an error".to_string();
        }

        let tail = lines[lines.len().saturating_sub(3)..].join(" ");
        if tail.chars().count() > MAX_STDERR_CHARS {
            let skip = tail.chars().count() - MAX_STDERR_CHARS;
            format!("...{}", tail.chars().skip(skip).collect::<String>())
        } else {
            tail
        }
    }

    fn spawn_error(&self, error: std::io::Error) -> ConversionError {
        if error.kind() == ErrorKind::NotFound || error.kind() == ErrorKind::PermissionDenied {
            warn!("Conversion tool {} cannot be executed: {}", self.program.display(), error);
            ConversionError::ToolUnavailable
        } else {
            ConversionError::Io(error)
        }
    }
}

#[async_trait]
impl AudioConverter for FfmpegConverter {
    async fn convert(
        &self,
        upload: &AudioUpload,
        options: &ConversionOptions,
    ) -> Result<ConvertedAudio, ConversionError> {
        if upload.data.is_empty() {
            return Err(ConversionError::EmptyInput);
        }

        let workdir = self.create_workdir()?;
        let input_path = workdir.path().join(format!("input.{}", upload.extension()));
        let output_path = workdir
            .path()
            .join(format!("output.{}", options.format.extension()));

        tokio::fs::write(&input_path, &upload.data).await?;

        let args = Self::build_args(&input_path, &output_path, options);
        debug!("Running {} {:?}", self.program.display(), args);

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Conversion exceeded {}s, killing tool", self.timeout.as_secs());
                return Err(ConversionError::Timeout(self.timeout.as_secs()));
            }
        };

        if !output.status.success() {
            return Err(ConversionError::Failed(Self::summarize_stderr(&output.stderr)));
        }

        let data = match tokio::fs::read(&output_path).await {
            Ok(data) if !data.is_empty() => data,
            Ok(_) | Err(_) => {
                return Err(ConversionError::Failed(
                    "the conversion tool produced no output".to_string(),
                ));
            }
        };

        info!(
            "Converted {} bytes of .{} into {} bytes of {}",
            upload.data.len(),
            upload.extension(),
            data.len(),
            options.format
        );

        Ok(ConvertedAudio {
            data,
            format: options.format,
            file_name: format!("{}.{}", upload.safe_stem(), options.format.extension()),
        })
    }

    async fn is_available(&self) -> bool {
        let mut command = Command::new(&self.program);
        command
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        matches!(
            tokio::time::timeout(VERSION_CHECK_TIMEOUT, command.status()).await,
            Ok(Ok(status)) if status.success()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn upload(name: &str) -> AudioUpload {
        AudioUpload::new(Some(name.to_string()), b"RIFF....WAVEfmt ".to_vec())
    }

    fn dir_is_empty(path: &Path) -> bool {
        std::fs::read_dir(path).unwrap().next().is_none()
    }

    /// Executable shell script standing in for ffmpeg
    #[cfg(unix)]
    fn fake_tool(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_upload_extension_and_stem() {
        let u = upload("My Song (final).MP3");
        assert_eq!(u.extension(), "mp3");
        assert_eq!(u.safe_stem(), "My_Song__final_");

        let u = AudioUpload::new(Some("../../etc/passwd".to_string()), vec![1]);
        assert_eq!(u.extension(), "bin");
        assert_eq!(u.safe_stem(), "passwd");

        let u = AudioUpload::new(None, vec![1]);
        assert_eq!(u.extension(), "bin");
        assert_eq!(u.safe_stem(), "audio");
    }

    #[test]
    fn test_build_args() {
        let options = ConversionOptions {
            format: AudioFormat::Mp3,
            sample_rate: Some(16_000),
            channels: Some(1),
        };
        let args = FfmpegConverter::build_args(
            Path::new("/tmp/x/input.wav"),
            Path::new("/tmp/x/output.mp3"),
            &options,
        );
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(args.first().map(String::as_str), Some("-hide_banner"));
        assert!(args.windows(2).any(|w| w == ["-i", "/tmp/x/input.wav"]));
        assert!(args.windows(2).any(|w| w == ["-ac", "1"]));
        assert!(args.windows(2).any(|w| w == ["-ar", "16000"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "libmp3lame"]));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/x/output.mp3"));
    }

    #[test]
    fn test_summarize_stderr() {
        let stderr = b"line one\n\nInvalid data found when processing input\n";
        assert_eq!(
            FfmpegConverter::summarize_stderr(stderr),
            "line one Invalid data found when processing input"
        );
        assert!(FfmpegConverter::summarize_stderr(b"").contains("exited with an error"));
        let long = "x".repeat(2000);
        assert!(FfmpegConverter::summarize_stderr(long.as_bytes()).chars().count() <= MAX_STDERR_CHARS + 3);
    }

    #[test]
    fn test_error_classification() {
        assert!(ConversionError::EmptyInput.is_client_error());
        assert!(ConversionError::UnsupportedFormat("aiff".into()).is_client_error());
        assert!(!ConversionError::ToolUnavailable.is_client_error());
        assert!(!ConversionError::Timeout(5).is_client_error());
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let converter = FfmpegConverter::new("ffmpeg", Duration::from_secs(5));
        let err = converter
            .convert(&AudioUpload::new(None, Vec::new()), &ConversionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::EmptyInput));
    }

    #[tokio::test]
    async fn test_missing_tool_and_workdir_cleanup() {
        let root = TempDir::new().unwrap();
        let converter =
            FfmpegConverter::new("/nonexistent/audiomancer-ffmpeg", Duration::from_secs(5))
                .with_workdir_root(root.path());

        let err = converter
            .convert(&upload("take.wav"), &ConversionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ConversionError::ToolUnavailable));
        assert!(dir_is_empty(root.path()));
        assert!(!converter.is_available().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tool_reports_failure_and_cleans_up() {
        let root = TempDir::new().unwrap();
        let converter = FfmpegConverter::new("false", Duration::from_secs(5))
            .with_workdir_root(root.path());

        let err = converter
            .convert(&upload("take.wav"), &ConversionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ConversionError::Failed(_)));
        assert!(dir_is_empty(root.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_without_output_is_failure() {
        let root = TempDir::new().unwrap();
        let converter = FfmpegConverter::new("true", Duration::from_secs(5))
            .with_workdir_root(root.path());

        let err = converter
            .convert(&upload("take.wav"), &ConversionOptions::default())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("produced no output"));
        assert!(dir_is_empty(root.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_tool_times_out_and_cleans_up() {
        let bin = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let tool = fake_tool(bin.path(), "exec sleep 30");
        let converter =
            FfmpegConverter::new(tool, Duration::from_secs(1)).with_workdir_root(root.path());

        let started = std::time::Instant::now();
        let err = converter
            .convert(&upload("take.wav"), &ConversionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ConversionError::Timeout(1)));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(dir_is_empty(root.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_conversion_returns_output_and_cleans_up() {
        let bin = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        // Copies the `-i` argument to the last argument
        let tool = fake_tool(
            bin.path(),
            r#"in=""
while [ $# -gt 1 ]; do
  if [ "$1" = "-i" ]; then in="$2"; fi
  shift
done
cp "$in" "$1""#,
        );
        let converter =
            FfmpegConverter::new(tool, Duration::from_secs(5)).with_workdir_root(root.path());
        let options = ConversionOptions {
            format: AudioFormat::Mp3,
            ..ConversionOptions::default()
        };

        let converted = converter
            .convert(&upload("Night Drive.wav"), &options)
            .await
            .unwrap();

        assert_eq!(converted.data, b"RIFF....WAVEfmt ".to_vec());
        assert_eq!(converted.format, AudioFormat::Mp3);
        assert_eq!(converted.file_name, "Night_Drive.mp3");
        assert!(dir_is_empty(root.path()));
    }
}
