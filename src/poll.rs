use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::youtube::{VideoStatus, YouTubeClient};

pub const VIDEO_POLL_INTERVAL: Duration = Duration::from_millis(3000);
pub const THUMBNAIL_POLL_INTERVAL: Duration = Duration::from_millis(5000);
const SPINNER_TICK: Duration = Duration::from_millis(120);

/// Blocks until the uploaded video is fully consumable: encoding finished
/// and, when one is coming, the maxres thumbnail is served. Unbounded by
/// design; processing time is entirely server-controlled.
pub async fn await_ready(client: &YouTubeClient, video_id: &str) -> Result<()> {
    await_ready_with(client, video_id, VIDEO_POLL_INTERVAL, THUMBNAIL_POLL_INTERVAL).await
}

pub(crate) async fn await_ready_with(
    client: &YouTubeClient,
    video_id: &str,
    video_interval: Duration,
    thumbnail_interval: Duration,
) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.enable_steady_tick(SPINNER_TICK);
    spinner.set_message("Waiting for YouTube to finish processing...");

    let final_status = wait_for_processing(client, video_id, video_interval).await;

    spinner.set_message("Waiting for the thumbnail...");
    wait_for_thumbnail(client, final_status.thumbnail_url.as_deref(), thumbnail_interval).await;

    spinner.finish_and_clear();
    Ok(())
}

/// Polls `videos.list` until processing reports "succeeded". The wait
/// between polls follows the server's remaining-time estimate when it sends
/// one and otherwise sticks with the last interval used.
async fn wait_for_processing(
    client: &YouTubeClient,
    video_id: &str,
    initial_interval: Duration,
) -> VideoStatus {
    let mut interval = initial_interval;
    loop {
        tokio::time::sleep(interval).await;

        let status = match client.video_status(video_id).await {
            Ok(status) => status,
            Err(err) => {
                // transport hiccups never end the wait
                log::warn!("status poll failed, retrying: {err:#}");
                continue;
            }
        };

        if status.processing_status.as_deref() == Some("succeeded") {
            return status;
        }

        log::debug!(
            "processing status {:?}, estimated {:?} ms left",
            status.processing_status,
            status.time_left_ms
        );
        interval = next_interval(status.time_left_ms, interval);
    }
}

async fn wait_for_thumbnail(
    client: &YouTubeClient,
    thumbnail_url: Option<&str>,
    interval: Duration,
) {
    // No maxres thumbnail in the final status response means there is
    // nothing to wait on; the watch page falls back to a generated frame.
    let Some(url) = thumbnail_url else { return };

    loop {
        tokio::time::sleep(interval).await;
        match client.fetch_thumbnail(url).await {
            Ok(status) if status.is_success() => return,
            Ok(status) => log::debug!("thumbnail not served yet ({status})"),
            Err(err) => log::debug!("thumbnail fetch failed, retrying: {err}"),
        }
    }
}

pub(crate) fn next_interval(server_estimate_ms: Option<u64>, previous: Duration) -> Duration {
    server_estimate_ms.map(Duration::from_millis).unwrap_or(previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::youtube::YouTubeClient;

    const FAST: Duration = Duration::from_millis(10);

    #[test]
    fn server_estimate_drives_the_next_interval() {
        assert_eq!(
            next_interval(Some(1234), VIDEO_POLL_INTERVAL),
            Duration::from_millis(1234)
        );
    }

    #[test]
    fn missing_estimate_reuses_the_previous_interval() {
        // iteration 2 omitted the estimate: iteration 3 keeps the last
        // computed wait, not the hardcoded default
        let adapted = next_interval(Some(700), VIDEO_POLL_INTERVAL);
        assert_eq!(next_interval(None, adapted), Duration::from_millis(700));
    }

    #[tokio::test]
    async fn polling_completes_once_processing_succeeds() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/youtube/v3/videos")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"items": [{"processingDetails": {"processingStatus": "succeeded"}}]}"#)
            .create_async()
            .await;

        let client = YouTubeClient::with_api_base("at-1", server.url());
        await_ready_with(&client, "vid-1", FAST, FAST).await.unwrap();
    }

    #[tokio::test]
    async fn polling_never_ends_on_a_status_other_than_succeeded() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/youtube/v3/videos")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"items": [{"processingDetails": {"processingStatus": "processing", "processingProgress": {"timeLeftMs": "5"}}}]}"#,
            )
            .create_async()
            .await;

        let client = YouTubeClient::with_api_base("at-1", server.url());
        let still_waiting = tokio::time::timeout(
            Duration::from_millis(150),
            await_ready_with(&client, "vid-1", FAST, FAST),
        )
        .await;

        assert!(still_waiting.is_err());
    }

    #[tokio::test]
    async fn thumbnail_wait_ends_on_the_first_success_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/youtube/v3/videos")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"items": [{{
                    "processingDetails": {{"processingStatus": "succeeded"}},
                    "snippet": {{"thumbnails": {{"maxres": {{"url": "{}/thumb.jpg"}}}}}}
                }}]}}"#,
                server.url()
            ))
            .create_async()
            .await;
        let thumb_mock = server
            .mock("GET", "/thumb.jpg")
            .with_status(200)
            .with_body("jpeg bytes")
            .create_async()
            .await;

        let client = YouTubeClient::with_api_base("at-1", server.url());
        await_ready_with(&client, "vid-1", FAST, FAST).await.unwrap();
        thumb_mock.assert_async().await;
    }

    #[tokio::test]
    async fn thumbnail_wait_retries_while_the_get_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/youtube/v3/videos")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"items": [{{
                    "processingDetails": {{"processingStatus": "succeeded"}},
                    "snippet": {{"thumbnails": {{"maxres": {{"url": "{}/thumb.jpg"}}}}}}
                }}]}}"#,
                server.url()
            ))
            .create_async()
            .await;
        server
            .mock("GET", "/thumb.jpg")
            .with_status(404)
            .create_async()
            .await;

        let client = YouTubeClient::with_api_base("at-1", server.url());
        let still_waiting = tokio::time::timeout(
            Duration::from_millis(150),
            await_ready_with(&client, "vid-1", FAST, FAST),
        )
        .await;

        assert!(still_waiting.is_err());
    }

    #[tokio::test]
    async fn absent_thumbnail_url_ends_the_wait_immediately() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/youtube/v3/videos")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"items": [{"processingDetails": {"processingStatus": "succeeded"}}]}"#)
            .create_async()
            .await;

        let client = YouTubeClient::with_api_base("at-1", server.url());
        // no thumbnail URL in the response: nothing to poll for
        tokio::time::timeout(
            Duration::from_millis(500),
            await_ready_with(&client, "vid-1", FAST, FAST),
        )
        .await
        .expect("wait should end without a thumbnail loop")
        .unwrap();
    }
}
