use crate::error::{AppError, Result};
use crate::models::{Features, LyricsAnalysis, MetadataSearchHit};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Track search hits and per-track features/lyrics analysis.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MetadataSearchHit>>;
    async fn get_metadata(&self, id: &str) -> Result<Option<Features>>;
    async fn get_lyrics_analysis(&self, id: &str) -> Result<Option<LyricsAnalysis>>;
    async fn get_popularity(&self, id: &str, platform: &str) -> Result<Option<f64>>;
}

/// Offline/unconfigured implementation: every call returns an empty/absent
/// result rather than erroring, so a stage falls back gracefully when the
/// capability is unavailable.
pub struct NullMetadataProvider;

#[async_trait]
impl MetadataProvider for NullMetadataProvider {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<MetadataSearchHit>> {
        Ok(Vec::new())
    }

    async fn get_metadata(&self, _id: &str) -> Result<Option<Features>> {
        Ok(None)
    }

    async fn get_lyrics_analysis(&self, _id: &str) -> Result<Option<LyricsAnalysis>> {
        Ok(None)
    }

    async fn get_popularity(&self, _id: &str, _platform: &str) -> Result<Option<f64>> {
        Ok(None)
    }
}

/// Metadata provider backed by a Soundcharts-style HTTP API.
pub struct SoundchartsMetadataProvider {
    client: reqwest::Client,
    base_url: String,
    app_id: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    uuid: String,
    name: String,
    #[serde(rename = "creditName")]
    credit_name: Option<String>,
    #[serde(rename = "releaseDate")]
    release_date: Option<String>,
}

impl SoundchartsMetadataProvider {
    pub fn new(app_id: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to build reqwest client"),
            base_url: "https://customer.api.soundcharts.com".to_string(),
            app_id,
            api_key,
        }
    }

    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("x-app-id", self.app_id.clone()),
            ("x-api-key", self.api_key.clone()),
        ]
    }
}

#[async_trait]
impl MetadataProvider for SoundchartsMetadataProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<MetadataSearchHit>> {
        let mut req = self
            .client
            .get(format!("{}/api/v2/song/search/{}", self.base_url, query))
            .query(&[("limit", limit.to_string())]);
        for (k, v) in self.headers() {
            req = req.header(k, v);
        }

        let resp = req.send().await.map_err(|e| {
            AppError::CapabilityTransient(format!("soundcharts search failed: {e}"))
        })?;

        if !resp.status().is_success() {
            return Err(AppError::CapabilityTransient(format!(
                "soundcharts search returned {}",
                resp.status()
            )));
        }

        let parsed: SearchResponse = resp.json().await?;
        Ok(parsed
            .items
            .into_iter()
            .map(|i| MetadataSearchHit {
                id: i.uuid,
                title: i.name,
                artist: i.credit_name.unwrap_or_else(|| "Unknown".to_string()),
                release_date: i.release_date,
            })
            .collect())
    }

    async fn get_metadata(&self, id: &str) -> Result<Option<Features>> {
        // The audio-features endpoint; absent features is not an error,
        // it's a set-once field that may simply not exist yet.
        let mut req = self
            .client
            .get(format!("{}/api/v2/song/{}/audio", self.base_url, id));
        for (k, v) in self.headers() {
            req = req.header(k, v);
        }

        let resp = req.send().await.map_err(|e| {
            AppError::CapabilityTransient(format!("soundcharts metadata failed: {e}"))
        })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(AppError::CapabilityTransient(format!(
                "soundcharts metadata returned {}",
                resp.status()
            )));
        }

        #[derive(Deserialize)]
        struct AudioFeatures {
            tempo: Option<f64>,
            key: Option<i32>,
            mode: Option<i32>,
            energy: Option<f64>,
            danceability: Option<f64>,
            valence: Option<f64>,
            loudness: Option<f64>,
            instrumentalness: Option<f64>,
        }

        let f: AudioFeatures = resp.json().await?;
        Ok(Some(Features {
            track_id: uuid::Uuid::nil(),
            tempo: f.tempo,
            key: f.key,
            mode: f.mode,
            energy: f.energy,
            danceability: f.danceability,
            valence: f.valence,
            loudness: f.loudness,
            instrumentalness: f.instrumentalness,
        }))
    }

    async fn get_lyrics_analysis(&self, _id: &str) -> Result<Option<LyricsAnalysis>> {
        // Lyrics analysis is an optional add-on feed not part of the base
        // Soundcharts API; left as a no-op until a lyrics provider is wired.
        Ok(None)
    }

    async fn get_popularity(&self, id: &str, platform: &str) -> Result<Option<f64>> {
        let mut req = self.client.get(format!(
            "{}/api/v2/song/{}/popularity/{}",
            self.base_url, id, platform
        ));
        for (k, v) in self.headers() {
            req = req.header(k, v);
        }

        let resp = req.send().await.map_err(|e| {
            AppError::CapabilityTransient(format!("soundcharts popularity failed: {e}"))
        })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        #[derive(Deserialize)]
        struct Popularity {
            value: f64,
        }
        let p: Popularity = resp.json().await?;
        Ok(Some(p.value))
    }
}
