mod models;
mod net;
mod parser;
mod portals;
mod settings;
mod stub;
mod text;

pub use models::{
    Branch, Chapter, ChapterBuilder, ChapterBuilderError, Cover, Kind, Person, Slide, Status,
    Title,
};
pub use net::{service, ApiRequest, ApiResponse, Requestor};
pub use parser::{slug_from_url, Parser};
pub use portals::{LogPortals, Portals};
pub use settings::{CommonSettings, CustomSettings, Settings};
pub use stub::{Comparison, StubDetector, DEFAULT_THRESHOLD};
pub use text::{html_to_text, remove_recurring_substrings, rusificate_link, zerotify};

#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error(transparent)]
    RequestError(#[from] reqwest::Error),
    #[error(transparent)]
    DeserializeError(#[from] serde_json::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    ImageError(#[from] image::ImageError),
    #[error(transparent)]
    BuilderError(#[from] ChapterBuilderError),
    #[error("invalid url '{0}'")]
    UrlParseError(String),
    #[error("{message} (status {status})")]
    Status { status: u16, message: String },
    #[error("authorization token is not a valid header value")]
    InvalidToken,
}
