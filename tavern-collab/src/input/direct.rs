use async_trait::async_trait;
use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use reqwest::{Client, StatusCode};
use tavern_core::TrackMetadata;
use url::Url;

use super::{InputError, Inputable};

lazy_static! {
    static ref REGEX: Regex =
        Regex::new(r"(?i)^https?://[^\s?#]+\.(mp3|ogg|oga|opus|wav|flac|m4a|aac|webm)([?#]\S*)?$")
            .unwrap();
}

/// An audio file served over plain http(s).
#[derive(Debug, Clone)]
pub struct DirectInput {
    url: Url,
}

#[async_trait]
impl Inputable for DirectInput {
    fn test(query: &str) -> bool {
        REGEX.is_match(query)
    }

    async fn fetch(query: &str) -> Result<Self, InputError> {
        let url = Url::parse(query).map_err(|e| InputError::Invalid(e.to_string()))?;

        let response = Client::new()
            .head(url.clone())
            .send()
            .await
            .map_err(|e| InputError::FetchError(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(InputError::NotFound),
            status if status.is_success() => Ok(Self { url }),
            _ => Err(InputError::Unavailable),
        }
    }

    async fn locate(query: &str) -> Result<String, InputError> {
        // The file is streamed straight from where it lives
        Ok(query.to_string())
    }

    fn metadata(&self) -> TrackMetadata {
        TrackMetadata {
            source_url: self.url.to_string(),
            title: file_title(&self.url),
            // Unknown until a client loads it
            duration: 0.,
            thumbnail: None,
        }
    }
}

/// Derives a readable title from the last path segment of a URL
fn file_title(url: &Url) -> String {
    let file_name = url
        .path_segments()
        .and_then(|s| s.filter(|s| !s.is_empty()).last())
        .unwrap_or_default();

    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);

    let decoded = percent_decode_str(stem).decode_utf8_lossy().into_owned();

    if decoded.is_empty() {
        url.to_string()
    } else {
        decoded
    }
}
