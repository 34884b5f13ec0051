use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::fmt::Debug;
use std::process::Stdio;
use tavern_core::TrackMetadata;
use tokio::{io::AsyncReadExt, process::Command};
use url::Url;

use crate::util::URL_SCHEME_REGEX;

use super::{InputError, Inputable};

const YT_UNAVAILABLE: &str = "Video unavailable. This video is not available";
const YT_NOT_FOUND: &str = "Video unavailable";
const YT_ID_ERROR: &str = "Incomplete YouTube ID";

/// A YouTube video that can be played in the background.
#[derive(Clone)]
pub struct YouTubeVideoInput {
    id: String,
    title: String,
    duration: f64,
    thumbnail: Option<String>,
    source_url: String,
}

#[derive(Debug, Deserialize)]
struct FlatYouTubeVideo {
    id: String,
    title: String,
    duration: Option<f64>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
    width: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct YouTubePlaylist {
    #[allow(dead_code)]
    entries: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum YouTubeResource {
    // Playlists also carry an id and title, so they must be tried first
    Playlist(YouTubePlaylist),
    Video(FlatYouTubeVideo),
}

#[async_trait]
impl Inputable for YouTubeVideoInput {
    fn test(query: &str) -> bool {
        let query = URL_SCHEME_REGEX.replace(query, "https://");
        let Ok(url) = Url::parse(&query) else {
            return false;
        };

        let is_youtube = url
            .host_str()
            .filter(|s| s.ends_with("youtube.com"))
            .is_some();

        if is_youtube {
            // Test /watch?v=...
            if url.path().starts_with("/watch")
                && url.query_pairs().any(|(k, v)| k == "v" && !v.is_empty())
            {
                return true;
            }

            // Test /v/... and /shorts/...
            if url.path().starts_with("/v/") || url.path().starts_with("/shorts/") {
                return true;
            }
        }

        // Test youtu.be/...
        url.host_str() == Some("youtu.be") && url.path().len() > 1
    }

    async fn fetch(query: &str) -> Result<Self, InputError> {
        let output = run_yt_dlp(&[
            // Only ever look at the single video, even if the URL mentions a playlist
            "--no-playlist",
            "--skip-download",
            // Get a JSON output, in a single line.
            "-J",
            "--",
            query,
        ])
        .await?;

        let resource: YouTubeResource =
            serde_json::from_str(&output).map_err(|e| InputError::ParseError(e.to_string()))?;

        match resource {
            YouTubeResource::Video(video) => Ok(Self::from_flat(video, query)),
            YouTubeResource::Playlist(_) => Err(InputError::Invalid(
                "Playlists cannot be added as a single track".to_string(),
            )),
        }
    }

    async fn locate(query: &str) -> Result<String, InputError> {
        let output = run_yt_dlp(&["--no-playlist", "-f", "bestaudio/best", "-g", "--", query]).await?;

        output
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(ToOwned::to_owned)
            .ok_or_else(|| InputError::Other("No supported format found".to_string()))
    }

    fn metadata(&self) -> TrackMetadata {
        TrackMetadata {
            source_url: self.source_url.clone(),
            title: self.title.clone(),
            duration: self.duration,
            thumbnail: self.thumbnail.clone(),
        }
    }
}

impl YouTubeVideoInput {
    fn from_flat(video: FlatYouTubeVideo, query: &str) -> Self {
        YouTubeVideoInput {
            source_url: URL_SCHEME_REGEX.replace(query, "https://").to_string(),
            thumbnail: determine_thumbnail(video.thumbnails),
            duration: video.duration.unwrap_or_default(),
            title: video.title,
            id: video.id,
        }
    }
}

impl Debug for YouTubeVideoInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "YouTube: {}", &self.id)
    }
}

/// Runs yt-dlp with the given arguments and returns its standard output.
async fn run_yt_dlp(args: &[&str]) -> Result<String, InputError> {
    debug!("Running yt-dlp {}", args.join(" "));

    let mut child = Command::new("yt-dlp")
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| InputError::Other(e.to_string()))?;

    let mut output = String::new();
    let mut error_output = String::new();

    if let Some(mut stdout) = child.stdout.take() {
        stdout
            .read_to_string(&mut output)
            .await
            .map_err(|e| InputError::FetchError(e.to_string()))?;
    }

    if let Some(mut stderr) = child.stderr.take() {
        stderr.read_to_string(&mut error_output).await.ok();
    }

    let exit = child
        .wait()
        .await
        .map_err(|e| InputError::Other(e.to_string()))?;

    if !exit.success() {
        if error_output.contains(YT_UNAVAILABLE) {
            return Err(InputError::Unavailable);
        }

        if error_output.contains(YT_NOT_FOUND) {
            return Err(InputError::NotFound);
        }

        if error_output.contains(YT_ID_ERROR) {
            return Err(InputError::Invalid("Invalid Video ID".to_string()));
        }

        return Err(InputError::FetchError(error_output));
    }

    Ok(output)
}

fn determine_thumbnail(mut thumbnails: Vec<Thumbnail>) -> Option<String> {
    // Sort to get the largest at end
    thumbnails.sort_by(|a, b| a.width.cmp(&b.width));

    thumbnails.pop().map(|t| t.url)
}
