use anyhow::Result;
use clap::Parser;
use dialoguer::Input;
use serde_json::json;
use yt_upload::*;

mod auth;
mod clipboard;
mod poll;
mod store;
mod youtube;
#[cfg(test)]
mod test;

use store::{FileSecretStore, SecretStore, ACCOUNT, SERVICE};
use youtube::YouTubeClient;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    // Collect and confirm all inputs before any network traffic.
    let video_path = resolve_video_path(args.video.as_deref())?;

    let mut title_binding = Input::<String>::new();
    let mut title_input = title_binding.with_prompt("Title");
    if let Some(suggestion) = suggested_title(&video_path) {
        title_input = title_input.default(suggestion);
    }
    let title = title_input.interact_text()?;
    let description: String = Input::new()
        .with_prompt("Description")
        .allow_empty(true)
        .interact_text()?;

    let oauth_config = auth::load_oauth_config(&args.oauth_config)?;
    let authenticator = auth::Authenticator::new(&oauth_config, args.callback_port)?;

    let secret_store = FileSecretStore::new()?;
    let stored_token = secret_store.get(SERVICE, ACCOUNT)?;

    let credential = authenticator
        .ensure_authorized(stored_token.as_deref())
        .await?;

    // Rewritten even when unchanged so the persisted state stays current.
    secret_store.set(SERVICE, ACCOUNT, &credential.refresh_token)?;

    let defaults = youtube::load_default_metadata(&args.defaults)?;
    let overrides = json!({
        "snippet": { "title": title, "description": description }
    });
    let metadata = youtube::merge_metadata(&defaults, &overrides);

    let client = YouTubeClient::new(credential.access_token);

    println!("Uploading {video_path}");
    let video_id = client.upload(&video_path, &metadata).await?;
    println!("Upload accepted (video id {video_id}), waiting for processing");

    poll::await_ready(&client, &video_id).await?;

    let url = watch_url(&video_id);
    println!("Done! {url}");
    match clipboard::copy(&url) {
        Ok(()) => println!("Link copied to the clipboard."),
        Err(err) => log::warn!("could not copy the link to the clipboard: {err}"),
    }

    Ok(())
}

/// Resolves the video path from the positional argument or an interactive
/// prompt, stripping drag-and-drop quotes and re-prompting until the path
/// points at a file.
fn resolve_video_path(arg: Option<&str>) -> Result<String> {
    let mut candidate = match arg {
        Some(path) => path.to_string(),
        None => Input::new().with_prompt("Video file").interact_text()?,
    };

    loop {
        let path = expand_tilde(strip_surrounding_quotes(&candidate));
        if std::path::Path::new(&path).is_file() {
            return Ok(path);
        }
        eprintln!("'{path}' is not a file.");
        candidate = Input::new().with_prompt("Video file").interact_text()?;
    }
}
