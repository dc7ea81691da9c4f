use predwatch_data::FeedError;
use thiserror::Error;

/// Fatal dashboard errors. Feed failures during polling are never fatal; only building
/// the feed client can surface a [`FeedError`] here.
#[derive(Debug, Error)]
pub enum TuiError {
    #[error("terminal I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("feed setup: {0}")]
    Feed(#[from] FeedError),
}
