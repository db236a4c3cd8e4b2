use anyhow::{Result, anyhow};
use async_trait::async_trait;
use image::ImageFormat;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;
use tracing::error;

/// Thumbnail dimension (max width or height)
const THUMB_SIZE: u32 = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

pub struct TranscodeOutput {
    pub data: Vec<u8>,
    pub bitrate_kbps: Option<i32>,
}

/// Extracts basic stream metadata from a merged asset.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, data: &[u8]) -> Result<MediaInfo>;
}

/// Produces one rendition of a source asset at a target quality.
#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    async fn transcode(&self, source: &[u8], quality: &str) -> Result<TranscodeOutput>;
}

/// Extracts a representative frame as a WebP thumbnail.
#[async_trait]
pub trait ThumbnailExtractor: Send + Sync {
    async fn extract(&self, source: &[u8]) -> Result<Vec<u8>>;
}

/// Target height and video bitrate for one ladder entry. Unknown labels
/// fall back to passthrough scaling at a middling bitrate.
fn quality_params(quality: &str) -> (u32, u32) {
    match quality {
        "360p" => (360, 800),
        "480p" => (480, 1400),
        "720p" => (720, 2800),
        "1080p" => (1080, 5000),
        "1440p" => (1440, 9000),
        "2160p" => (2160, 16000),
        _ => (720, 2800),
    }
}

pub struct FfprobeMediaProbe;

#[async_trait]
impl MediaProbe for FfprobeMediaProbe {
    async fn probe(&self, data: &[u8]) -> Result<MediaInfo> {
        let mut input_file = NamedTempFile::new()?;
        input_file.write_all(data)?;
        let input_path = input_file.into_temp_path();

        let output = Command::new("ffprobe")
            .arg("-v")
            .arg("error")
            .arg("-select_streams")
            .arg("v:0")
            .arg("-show_entries")
            .arg("stream=codec_name,width,height")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("json")
            .arg(input_path.as_os_str())
            .output()?;

        if !output.status.success() {
            let err_msg = String::from_utf8_lossy(&output.stderr);
            error!("ffprobe failed: {}", err_msg);
            return Err(anyhow!("ffprobe failed: {}", err_msg));
        }

        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        let stream = parsed["streams"]
            .get(0)
            .ok_or_else(|| anyhow!("no video stream found"))?;

        Ok(MediaInfo {
            duration_secs: parsed["format"]["duration"]
                .as_str()
                .and_then(|d| d.parse().ok())
                .unwrap_or(0.0),
            width: stream["width"].as_u64().unwrap_or(0) as u32,
            height: stream["height"].as_u64().unwrap_or(0) as u32,
            codec: stream["codec_name"].as_str().unwrap_or("unknown").to_string(),
        })
    }
}

pub struct FfmpegTranscoder;

#[async_trait]
impl MediaTranscoder for FfmpegTranscoder {
    async fn transcode(&self, source: &[u8], quality: &str) -> Result<TranscodeOutput> {
        let (height, bitrate_kbps) = quality_params(quality);

        let mut input_file = NamedTempFile::new()?;
        input_file.write_all(source)?;
        let input_path = input_file.into_temp_path();

        let output_file = NamedTempFile::with_suffix(".mp4")?;
        let output_path = output_file.path().to_string_lossy().to_string();

        let output = Command::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(input_path.as_os_str())
            .arg("-vf")
            .arg(format!("scale=-2:{}", height))
            .arg("-b:v")
            .arg(format!("{}k", bitrate_kbps))
            .arg("-c:a")
            .arg("aac")
            .arg("-movflags")
            .arg("+faststart")
            .arg(&output_path)
            .output()?;

        if !output.status.success() {
            let err_msg = String::from_utf8_lossy(&output.stderr);
            error!("ffmpeg transcode to {} failed: {}", quality, err_msg);
            return Err(anyhow!("ffmpeg transcode failed: {}", err_msg));
        }

        let data = tokio::fs::read(&output_path).await?;
        Ok(TranscodeOutput {
            data,
            bitrate_kbps: Some(bitrate_kbps as i32),
        })
    }
}

pub struct FfmpegThumbnailExtractor;

#[async_trait]
impl ThumbnailExtractor for FfmpegThumbnailExtractor {
    async fn extract(&self, source: &[u8]) -> Result<Vec<u8>> {
        let mut input_file = NamedTempFile::new()?;
        input_file.write_all(source)?;
        let input_path = input_file.into_temp_path();

        // PNG intermediate for a lossless hand-off to the WebP encoder
        let output_file = NamedTempFile::with_suffix(".png")?;
        let output_path = output_file.path().to_string_lossy().to_string();

        let output = Command::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(input_path.as_os_str())
            .arg("-ss")
            .arg("00:00:01.000")
            .arg("-vframes")
            .arg("1")
            .arg("-vf")
            .arg(format!("scale={}:-1", THUMB_SIZE))
            .arg(&output_path)
            .output()?;

        if !output.status.success() {
            let err_msg = String::from_utf8_lossy(&output.stderr);
            error!("ffmpeg frame extraction failed: {}", err_msg);
            return Err(anyhow!("ffmpeg frame extraction failed: {}", err_msg));
        }

        let png_data = tokio::fs::read(&output_path).await?;
        let img = image::load_from_memory(&png_data)
            .map_err(|e| anyhow!("Failed to load extracted frame: {}", e))?;

        let mut out_data = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut out_data);
        img.write_to(&mut cursor, ImageFormat::WebP)
            .map_err(|e| anyhow!("Failed to encode WebP thumbnail: {}", e))?;
        Ok(out_data)
    }
}

/// Simulated probe for development and tests. Reports a fixed stream
/// description without inspecting the payload.
pub struct SimMediaProbe;

#[async_trait]
impl MediaProbe for SimMediaProbe {
    async fn probe(&self, data: &[u8]) -> Result<MediaInfo> {
        Ok(MediaInfo {
            duration_secs: data.len() as f64 / 1_000_000.0,
            width: 1920,
            height: 1080,
            codec: "h264".to_string(),
        })
    }
}

/// Simulated transcoder: passes the source bytes through unchanged.
pub struct SimTranscoder;

#[async_trait]
impl MediaTranscoder for SimTranscoder {
    async fn transcode(&self, source: &[u8], quality: &str) -> Result<TranscodeOutput> {
        let (_, bitrate_kbps) = quality_params(quality);
        Ok(TranscodeOutput {
            data: source.to_vec(),
            bitrate_kbps: Some(bitrate_kbps as i32),
        })
    }
}

pub struct SimThumbnailExtractor;

#[async_trait]
impl ThumbnailExtractor for SimThumbnailExtractor {
    async fn extract(&self, _source: &[u8]) -> Result<Vec<u8>> {
        Ok(b"RIFF\0\0\0\0WEBP".to_vec())
    }
}
