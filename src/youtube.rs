use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use futures::StreamExt;
use reqwest::{Body, Client, StatusCode};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;
use yt_upload::expand_tilde;

const API_BASE: &str = "https://www.googleapis.com";

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub id: String,
}

/// Snapshot of the fields the poller cares about from a `videos.list`
/// response.
#[derive(Debug, Default)]
pub struct VideoStatus {
    pub processing_status: Option<String>,
    pub time_left_ms: Option<u64>,
    pub thumbnail_url: Option<String>,
}

pub struct YouTubeClient {
    client: Client,
    access_token: String,
    api_base: String,
}

impl YouTubeClient {
    pub fn new(access_token: String) -> Self {
        Self {
            client: Client::new(),
            access_token,
            api_base: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_api_base(access_token: &str, api_base: String) -> Self {
        Self {
            client: Client::new(),
            access_token: access_token.to_string(),
            api_base,
        }
    }

    /// Streams the file to the insert endpoint as a two-part upload: the
    /// metadata JSON and the media bytes. The file is never read fully into
    /// memory; its size is only needed for the progress denominator.
    pub async fn upload(&self, video_path: &str, metadata: &Value) -> Result<String> {
        let file_size = tokio::fs::metadata(video_path)
            .await
            .with_context(|| format!("failed to stat '{video_path}'"))?
            .len();
        let file = tokio::fs::File::open(video_path)
            .await
            .with_context(|| format!("failed to open '{video_path}'"))?;

        let mut sent: u64 = 0;
        let progress = ReaderStream::new(file).inspect(move |chunk| {
            if let Ok(chunk) = chunk {
                sent += chunk.len() as u64;
                print!("\rUploading... {}%", percent_complete(sent, file_size));
                let _ = io::stdout().flush();
            }
        });

        let file_name = Path::new(video_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());

        let form = reqwest::multipart::Form::new()
            .part(
                "metadata",
                reqwest::multipart::Part::text(metadata.to_string())
                    .mime_str("application/json")?,
            )
            .part(
                "media",
                reqwest::multipart::Part::stream_with_length(Body::wrap_stream(progress), file_size)
                    .file_name(file_name)
                    .mime_str("video/*")?,
            );

        let response = self
            .client
            .post(format!("{}/upload/youtube/v3/videos", self.api_base))
            .query(&[("part", "snippet,status"), ("notifySubscribers", "false")])
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .context("video upload request failed")?;

        println!("\rUploading... {}%", percent_complete(file_size, file_size));

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            log::error!("upload rejected ({status}): {body}");
            bail!("upload failed ({status}): {body}");
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .context("failed to parse the upload response")?;
        Ok(uploaded.id)
    }

    pub async fn video_status(&self, video_id: &str) -> Result<VideoStatus> {
        let body: VideoListResponse = self
            .client
            .get(format!("{}/youtube/v3/videos", self.api_base))
            .query(&[("part", "processingDetails,snippet"), ("id", video_id)])
            .bearer_auth(&self.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("failed to parse the video status response")?;

        let item = body
            .items
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("video '{video_id}' missing from the status response"))?;

        Ok(VideoStatus {
            processing_status: item
                .processing_details
                .as_ref()
                .and_then(|d| d.processing_status.clone()),
            time_left_ms: item
                .processing_details
                .and_then(|d| d.processing_progress)
                .and_then(|p| p.time_left_ms),
            thumbnail_url: item
                .snippet
                .and_then(|s| s.thumbnails)
                .and_then(|t| t.maxres)
                .map(|t| t.url),
        })
    }

    pub async fn fetch_thumbnail(&self, url: &str) -> Result<StatusCode> {
        Ok(self.client.get(url).send().await?.status())
    }
}

pub fn percent_complete(sent: u64, total: u64) -> u64 {
    // a 0-byte file is done the moment the request finishes
    if total == 0 {
        return 100;
    }
    (sent as f64 / total as f64 * 100.0).round() as u64
}

/// Merges override metadata over the defaults document, one level deep:
/// top-level sections ("snippet", "status") are combined key-wise with the
/// override winning, nested values are replaced wholesale.
pub fn merge_metadata(defaults: &Value, overrides: &Value) -> Value {
    let mut merged = defaults.clone();
    let (Some(base), Some(over)) = (merged.as_object_mut(), overrides.as_object()) else {
        return overrides.clone();
    };

    for (section, value) in over {
        let merged_section = match (base.get(section), value.as_object()) {
            (Some(Value::Object(base_section)), Some(over_section)) => {
                let mut section_map = base_section.clone();
                for (key, v) in over_section {
                    section_map.insert(key.clone(), v.clone());
                }
                Value::Object(section_map)
            }
            _ => value.clone(),
        };
        base.insert(section.clone(), merged_section);
    }

    merged
}

/// Reads the defaults document, falling back to built-in values when the
/// file does not exist (nothing configured yet).
pub fn load_default_metadata(path: &str) -> Result<Value> {
    let expanded = expand_tilde(path);
    match fs::read_to_string(&expanded) {
        Ok(content) => serde_json::from_str(&content)
            .with_context(|| format!("failed to parse defaults document '{expanded}'")),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(builtin_default_metadata()),
        Err(err) => {
            Err(err).with_context(|| format!("failed to read defaults document '{expanded}'"))
        }
    }
}

pub fn builtin_default_metadata() -> Value {
    json!({
        "snippet": { "categoryId": "22" },
        "status": { "privacyStatus": "private" }
    })
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResource {
    processing_details: Option<ProcessingDetails>,
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessingDetails {
    processing_status: Option<String>,
    processing_progress: Option<ProcessingProgress>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessingProgress {
    // the API serializes this unsigned long as a JSON string
    #[serde(default, deserialize_with = "u64_from_string_or_number")]
    time_left_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    maxres: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

fn u64_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }))
}
