use clap::{command, Parser};
use std::path::Path;

#[derive(Parser, Debug)]
#[command(version = "0.1",
          about = "Upload a video to YouTube and wait until it is ready",
          long_about = None)]
pub struct Args {
    #[arg(
        value_name = "VIDEO_FILE",
        help = "Path to the video file to upload (prompted for if omitted)"
    )]
    pub video: Option<String>,

    #[arg(
        short = 'c',
        long = "oauth-config",
        value_name = "CONFIG_FILE",
        help = "OAuth client configuration file (JSON)",
        default_value = "~/.client_secrets.json"
    )]
    pub oauth_config: String,

    #[arg(
        long = "defaults",
        value_name = "METADATA_FILE",
        help = "JSON file with default snippet/status metadata",
        default_value = "~/.yt-upload-defaults.json"
    )]
    pub defaults: String,

    #[arg(
        long = "callback-port",
        value_name = "PORT",
        help = "Local port for the OAuth callback listener",
        default_value_t = 3000
    )]
    pub callback_port: u16,
}

pub fn expand_tilde(path: &str) -> String {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest).to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string()),
        None => path.to_string(),
    }
}

/// Strips the quotes terminals wrap around drag-and-dropped paths.
pub fn strip_surrounding_quotes(input: &str) -> &str {
    let trimmed = input.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    trimmed
}

pub fn suggested_title(path: &str) -> Option<String> {
    let stem = Path::new(path)
        .file_stem()?
        .to_string_lossy()
        .trim()
        .to_string();
    (!stem.is_empty()).then_some(stem)
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}
