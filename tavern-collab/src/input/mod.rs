use async_trait::async_trait;
use tavern_core::TrackMetadata;
use thiserror::Error;

mod direct;
mod youtube;

pub use direct::DirectInput;
pub use youtube::YouTubeVideoInput;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Input did not match any supported source")]
    NoMatch,

    #[error("Input is invalid: {0}")]
    Invalid(String),

    #[error("Input type is supported but resource was not found")]
    NotFound,

    #[error("Resource was found but is unavailable")]
    Unavailable,

    #[error("Failed to fetch resource: {0}")]
    FetchError(String),

    #[error("Failed to parse resource: {0}")]
    ParseError(String),

    #[error("{0}")]
    Other(String),
}

/// Represents any resource that can be added to a queue
#[derive(Debug)]
pub enum Input {
    YouTube(YouTubeVideoInput),
    Direct(DirectInput),
}

impl Input {
    /// Looks up the resource behind a URL.
    pub async fn query(input: &str) -> Result<Self, InputError> {
        if YouTubeVideoInput::test(input) {
            return Ok(Input::YouTube(YouTubeVideoInput::fetch(input).await?));
        }

        if DirectInput::test(input) {
            return Ok(Input::Direct(DirectInput::fetch(input).await?));
        }

        Err(InputError::NoMatch)
    }

    /// Resolves a playable audio URL for a resource previously returned by [Input::query].
    pub async fn locate(source_url: &str) -> Result<String, InputError> {
        if YouTubeVideoInput::test(source_url) {
            return YouTubeVideoInput::locate(source_url).await;
        }

        if DirectInput::test(source_url) {
            return DirectInput::locate(source_url).await;
        }

        Err(InputError::NoMatch)
    }

    pub fn metadata(&self) -> TrackMetadata {
        match self {
            Input::YouTube(input) => input.metadata(),
            Input::Direct(input) => input.metadata(),
        }
    }
}

/// Represents a type that can be used as an input to tavern
#[async_trait]
pub trait Inputable {
    /// Returns true if the given query matches the pattern of this inputable
    fn test(query: &str) -> bool;

    /// Attempts to fetch the resource from the given query.
    async fn fetch(query: &str) -> Result<Self, InputError>
    where
        Self: Sized;

    /// Resolves the URL the audio can actually be streamed from.
    /// These links may expire, so they should not be kept around for long.
    async fn locate(query: &str) -> Result<String, InputError>
    where
        Self: Sized;

    /// Returns the metadata of the input
    fn metadata(&self) -> TrackMetadata;
}

/// The media lookups the coordinator depends on. Both may be slow and may fail.
#[async_trait]
pub trait MediaInputs: Send + Sync {
    async fn query(&self, url: &str) -> Result<TrackMetadata, InputError>;
    async fn locate(&self, source_url: &str) -> Result<String, InputError>;
}

/// Resolves media using the built-in [Input] sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultInputs;

#[async_trait]
impl MediaInputs for DefaultInputs {
    async fn query(&self, url: &str) -> Result<TrackMetadata, InputError> {
        Ok(Input::query(url).await?.metadata())
    }

    async fn locate(&self, source_url: &str) -> Result<String, InputError> {
        Input::locate(source_url).await
    }
}
