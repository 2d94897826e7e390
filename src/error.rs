use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use crate::layers::LayerId;

/// Failure to turn an image reference into decoded pixels.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Reading the source failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The bytes are not a decodable image.
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// Decoding produced an image with a zero dimension.
    #[error("decoded image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },

    /// The load did not settle within the configured timeout.
    #[error("image load timed out after {0:?}")]
    TimedOut(Duration),

    /// The decode task panicked or was aborted.
    #[error("decode task failed: {0}")]
    Task(String),
}

/// Failure reported by a background-removal collaborator.
#[derive(Debug, Error)]
pub enum RemovalError {
    /// Requested output quality is outside `(0, 1]`.
    #[error("removal quality must be in (0, 1], got {0}")]
    InvalidQuality(f32),

    /// The removal command could not be started or fed.
    #[error("failed to run background removal command `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The removal command exited unsuccessfully.
    #[error("background removal exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    /// The collaborator returned no image data.
    #[error("background removal returned no image data")]
    EmptyOutput,

    /// There is no background photo to cut the subject out of.
    #[error("no background image selected")]
    NoBackground,

    /// The image handed to background removal could not be read.
    #[error("could not read image for background removal: {0}")]
    Source(#[from] LoadError),

    /// Any other collaborator-specific failure.
    #[error("background removal failed: {0}")]
    Other(String),
}

/// Fatal composite failure. Prior editor state is never touched.
#[derive(Debug, Error)]
pub enum CompositeError {
    /// No background to draw on.
    #[error("background image could not be loaded: {0}")]
    BackgroundDecode(#[source] LoadError),

    /// PNG encoding of the finished surface failed.
    #[error("failed to encode composite: {0}")]
    Encode(#[from] image::ImageError),

    /// Drawing failed or the render task did not finish.
    #[error("render error: {0}")]
    Render(anyhow::Error),
}

/// Non-fatal problem encountered while compositing; the layer is skipped.
#[derive(Debug, Error)]
pub enum CompositeWarning {
    /// An overlay's pixels could not be decoded.
    #[error("overlay {id} skipped: {error}")]
    OverlayDecode {
        id: LayerId,
        #[source]
        error: LoadError,
    },

    /// The foreground cut-out could not be decoded; drawn without it.
    #[error("foreground cut-out skipped: {0}")]
    ForegroundDecode(#[source] LoadError),

    /// No font face could be resolved for a text layer.
    #[error("text layer {id} skipped: no font available for family `{family}`")]
    FontUnavailable { id: LayerId, family: String },
}
