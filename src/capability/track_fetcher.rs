use crate::error::{AppError, Result};
use crate::util::cache_filename;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct FetchedTrack {
    pub path: PathBuf,
    pub duration_s: f64,
}

/// Downloads a track by (artist, title) query to the cache directory;
/// blocking (from the caller's perspective — the call resolves only once
/// the file is on disk), idempotent with respect to the destination path.
#[async_trait]
pub trait TrackFetcher: Send + Sync {
    async fn fetch(&self, query: &str, artist: &str, title: &str) -> Result<FetchedTrack>;
}

pub struct NullTrackFetcher;

#[async_trait]
impl TrackFetcher for NullTrackFetcher {
    async fn fetch(&self, _query: &str, _artist: &str, _title: &str) -> Result<FetchedTrack> {
        Err(AppError::FetchFailed("track fetcher not configured".to_string()))
    }
}

/// Fetcher backed by an external `yt-dlp` binary, extracting audio as MP3
/// into the cache directory. Idempotent: if the sanitized destination path
/// already holds a valid file, it's reused; otherwise `yt-dlp` is invoked
/// and allowed to overwrite it.
pub struct YtDlpTrackFetcher {
    ytdlp_path: String,
    ffmpeg_path: String,
    cache_dir: PathBuf,
}

impl YtDlpTrackFetcher {
    pub fn new(ytdlp_path: String, ffmpeg_path: String, cache_dir: PathBuf) -> Self {
        Self {
            ytdlp_path,
            ffmpeg_path,
            cache_dir,
        }
    }

    fn destination(&self, artist: &str, title: &str) -> PathBuf {
        self.cache_dir.join(cache_filename(artist, title))
    }
}

#[async_trait]
impl TrackFetcher for YtDlpTrackFetcher {
    async fn fetch(&self, query: &str, artist: &str, title: &str) -> Result<FetchedTrack> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let destination = self.destination(artist, title);

        if tokio::fs::try_exists(&destination).await.unwrap_or(false) {
            let duration_s = probe_duration(&self.ffmpeg_path, &destination).await?;
            return Ok(FetchedTrack {
                path: destination,
                duration_s,
            });
        }

        let search_url = format!("ytsearch1:{query}");
        let output_template = format!(
            "{}.%(ext)s",
            destination
                .with_extension("")
                .to_string_lossy()
        );

        let output = Command::new(&self.ytdlp_path)
            .args([
                "-f",
                "bestaudio/best",
                "--extract-audio",
                "--audio-format",
                "mp3",
                "--audio-quality",
                "192",
                "--no-playlist",
                "-o",
                &output_template,
                &search_url,
            ])
            .output()
            .await
            .map_err(|e| AppError::FetchFailed(format!("failed to spawn yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::FetchFailed(format!("yt-dlp failed: {stderr}")));
        }

        if !tokio::fs::try_exists(&destination).await.unwrap_or(false) {
            return Err(AppError::FetchFailed(format!(
                "yt-dlp reported success but {} is missing",
                destination.display()
            )));
        }

        let duration_s = probe_duration(&self.ffmpeg_path, &destination).await?;
        Ok(FetchedTrack {
            path: destination,
            duration_s,
        })
    }
}

async fn probe_duration(ffmpeg_path: &str, path: &Path) -> Result<f64> {
    // ffprobe ships alongside ffmpeg; derive its path from the configured
    // ffmpeg binary's directory when possible, else fall back to "ffprobe"
    // on PATH.
    let ffprobe_path = Path::new(ffmpeg_path)
        .parent()
        .map(|dir| dir.join("ffprobe"))
        .filter(|p| p.components().count() > 1)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "ffprobe".to_string());

    let output = Command::new(&ffprobe_path)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| AppError::FetchFailed(format!("failed to spawn ffprobe: {e}")))?;

    if !output.status.success() {
        // Fallback matching the original's behavior of never failing a
        // download solely because probing its duration failed.
        return Ok(210.0);
    }

    String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse::<f64>()
        .or(Ok(210.0))
}
