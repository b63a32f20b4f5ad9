//! Image normalization: probe uploads with ffprobe, pass small images in a
//! browser-friendly format through untouched, and re-encode everything else to
//! AVIF with ffmpeg.

use std::path::Path;

use common::storage::BoxReader;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, TryStreamExt};
use serde::Deserialize;
use tempfile::TempPath;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::config::MediaConfig;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("unsupported image: {0}")]
    Unsupported(String),
    #[error("could not read image: {0}")]
    Probe(String),
    #[error("image conversion failed: {0}")]
    Encode(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// What ffprobe reports about the first video stream of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub format_name: String,
    pub pix_fmt: String,
    pub animated: bool,
}

/// An image ready for upload. The scratch file is removed on drop.
pub struct ProcessedImage {
    file: TempPath,
    pub width: u32,
    pub height: u32,
    pub content_type: &'static str,
    pub extension: &'static str,
    pub file_size: u64,
}

impl ProcessedImage {
    pub async fn reader(&self) -> std::io::Result<BoxReader> {
        let file = tokio::fs::File::open(&self.file).await?;
        Ok(Box::new(file))
    }
}

impl std::fmt::Debug for ProcessedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("content_type", &self.content_type)
            .field("file_size", &self.file_size)
            .finish()
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    codec_name: Option<String>,
    pix_fmt: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

fn positive(v: Option<&str>) -> bool {
    v.and_then(|s| s.parse::<f64>().ok()).is_some_and(|d| d > 0.0)
}

pub fn parse_probe(json: &[u8]) -> Result<Probe, MediaError> {
    let out: ProbeOutput =
        serde_json::from_slice(json).map_err(|e| MediaError::Probe(e.to_string()))?;
    let stream = out
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| MediaError::Probe("no image stream found".into()))?;
    let (Some(width), Some(height)) = (stream.width, stream.height) else {
        return Err(MediaError::Probe("missing dimensions".into()));
    };
    if width == 0 || height == 0 {
        return Err(MediaError::Probe("empty image".into()));
    }

    let format = out.format.unwrap_or(ProbeFormat {
        format_name: None,
        duration: None,
    });
    let format_name = format.format_name.unwrap_or_default();
    let codec = stream.codec_name.unwrap_or_default();
    let frames = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(1);
    let is_gif = codec == "gif" || format_name.contains("gif");
    let animated = frames > 1
        || (is_gif && (positive(stream.duration.as_deref()) || positive(format.duration.as_deref())));

    Ok(Probe {
        width,
        height,
        codec,
        format_name,
        pix_fmt: stream.pix_fmt.unwrap_or_default(),
        animated,
    })
}

/// Browser-friendly content type and file extension, if the probed image has one.
pub fn detect_type(probe: &Probe) -> Option<(&'static str, &'static str)> {
    match probe.codec.as_str() {
        "mjpeg" | "jpeg" => Some(("image/jpeg", "jpg")),
        "png" | "apng" => Some(("image/png", "png")),
        "gif" => Some(("image/gif", "gif")),
        "webp" => Some(("image/webp", "webp")),
        "av1" if probe.format_name.contains("avif") || probe.format_name.contains("mp4") => {
            Some(("image/avif", "avif"))
        }
        _ => None,
    }
}

pub fn has_alpha(pix_fmt: &str) -> bool {
    pix_fmt.starts_with("yuva")
        || pix_fmt.starts_with("ya")
        || pix_fmt.starts_with("pal")
        || ["rgba", "argb", "bgra", "abgr", "gbrap"]
            .iter()
            .any(|f| pix_fmt.starts_with(f))
}

/// `(crf, cpu-used)` for the longest output side.
pub fn encode_params(longest_side: u32) -> (u8, u8) {
    match longest_side {
        0..=512 => (28, 4),
        513..=1024 => (30, 5),
        1025..=2000 => (32, 6),
        _ => (35, 7),
    }
}

/// ffmpeg arguments converting `input` into an AVIF at `output`, bounded by
/// `max_resolution` on both sides.
pub fn avif_args(input: &Path, output: &Path, probe: &Probe, max_resolution: u32) -> Vec<String> {
    let longest = probe.width.max(probe.height).min(max_resolution);
    let (crf, cpu) = encode_params(longest);
    let pix_fmt = if has_alpha(&probe.pix_fmt) { "yuva420p" } else { "yuv420p" };
    let filter = format!(
        "scale='min({r},iw)':'min({r},ih)':force_original_aspect_ratio=decrease,\
         scale=trunc(iw/2)*2:trunc(ih/2)*2,format={pix_fmt}",
        r = max_resolution
    );

    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-vf".into(),
        filter,
        "-c:v".into(),
        "libaom-av1".into(),
        "-crf".into(),
        crf.to_string(),
        "-cpu-used".into(),
        cpu.to_string(),
    ];
    if !probe.animated {
        args.extend(["-still-picture", "1", "-frames:v", "1"].map(String::from));
    }
    args.extend(["-f".to_string(), "avif".to_string(), output.to_string_lossy().into_owned()]);
    args
}

fn scratch(suffix: &str) -> std::io::Result<TempPath> {
    Ok(tempfile::Builder::new()
        .prefix("nakama-media-")
        .suffix(suffix)
        .tempfile()?
        .into_temp_path())
}

#[derive(Clone)]
pub struct ImagePipeline {
    ffmpeg: String,
    ffprobe: String,
    concurrency: usize,
}

impl ImagePipeline {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_bin.clone(),
            ffprobe: config.ffprobe_bin.clone(),
            concurrency: config.concurrency.max(1),
        }
    }

    /// Process every input concurrently. Output order matches input order; the
    /// first failure aborts the batch and drops every scratch file.
    #[instrument(skip(self, inputs), fields(count = inputs.len()))]
    pub async fn process(
        &self,
        inputs: Vec<BoxReader>,
        max_resolution: u32,
    ) -> Result<Vec<ProcessedImage>, MediaError> {
        let jobs: Vec<BoxFuture<'_, Result<ProcessedImage, MediaError>>> = inputs
            .into_iter()
            .map(|input| self.process_one(input, max_resolution).boxed())
            .collect();
        futures::stream::iter(jobs)
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    async fn process_one(&self, mut input: BoxReader, max_resolution: u32) -> Result<ProcessedImage, MediaError> {
        let source = scratch(".src")?;
        let mut file = tokio::fs::File::create(&source).await?;
        tokio::io::copy(&mut input, &mut file).await?;
        file.sync_all().await?;
        drop(file);

        let probe = self.probe(&source).await?;
        let passthrough = detect_type(&probe).filter(|_| probe.width.max(probe.height) <= max_resolution);
        if let Some((content_type, extension)) = passthrough {
            let file_size = tokio::fs::metadata(&source).await?.len();
            debug!(content_type, file_size, "Keeping image as uploaded");
            return Ok(ProcessedImage {
                file: source,
                width: probe.width,
                height: probe.height,
                content_type,
                extension,
                file_size,
            });
        }

        let output = scratch(".avif")?;
        let args = avif_args(&source, &output, &probe, max_resolution);
        let result = Command::new(&self.ffmpeg)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MediaError::Encode(format!("failed to execute {}: {e}", self.ffmpeg)))?;
        if !result.status.success() {
            return Err(MediaError::Encode(
                String::from_utf8_lossy(&result.stderr).trim().to_string(),
            ));
        }
        drop(source);

        let encoded = self.probe(&output).await?;
        let file_size = tokio::fs::metadata(&output).await?.len();
        debug!(
            from = %probe.codec,
            width = encoded.width,
            height = encoded.height,
            file_size,
            "Re-encoded image to AVIF"
        );
        Ok(ProcessedImage {
            file: output,
            width: encoded.width,
            height: encoded.height,
            content_type: "image/avif",
            extension: "avif",
            file_size,
        })
    }

    async fn probe(&self, path: &Path) -> Result<Probe, MediaError> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,codec_name,pix_fmt,nb_frames,duration:format=format_name,duration",
                "-of",
                "json",
            ])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MediaError::Probe(format!("failed to execute {}: {e}", self.ffprobe)))?;
        if !output.status.success() {
            return Err(MediaError::Unsupported(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        parse_probe(&output.stdout)
    }
}
