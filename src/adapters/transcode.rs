//! Audio transcoding fallback via a local ffmpeg binary.
//!
//! Used by the transcription gateway when every (model, mime) candidate
//! failed with retryable format errors: resample the audio to mono
//! 16 kHz PCM WAV and run the candidate matrix once more.

use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

use super::Transcoder;

/// Transcoder backed by a local ffmpeg binary (`FFMPEG_PATH` overrides
/// the binary location).
pub struct FfmpegTranscoder;

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn resample_to_wav(&self, audio: &[u8]) -> Result<Vec<u8>> {
        resample_to_wav(audio).await
    }
}

/// Resample audio bytes to mono 16 kHz PCM WAV.
pub async fn resample_to_wav(audio: &[u8]) -> Result<Vec<u8>> {
    let ffmpeg_path = std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string());

    // ffmpeg needs seekable output for WAV headers, so go through a temp dir
    let temp_dir = tempfile::tempdir().context("Failed to create temp dir")?;
    let input_path = temp_dir.path().join("input.bin");
    let output_path = temp_dir.path().join("output.wav");

    tokio::fs::write(&input_path, audio)
        .await
        .context("Failed to write audio to temp file")?;

    let output = Command::new(&ffmpeg_path)
        .arg("-y")
        .arg("-i")
        .arg(&input_path)
        .args(["-ac", "1", "-ar", "16000", "-acodec", "pcm_s16le"])
        .arg(&output_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .context("Failed to run ffmpeg")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("ffmpeg failed: {}", stderr.trim());
    }

    let wav = tokio::fs::read(&output_path)
        .await
        .context("Failed to read transcoded audio")?;

    if wav.is_empty() {
        anyhow::bail!("ffmpeg produced empty output");
    }

    Ok(wav)
}
