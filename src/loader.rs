//! Asynchronous image loading.
//!
//! Loads never block the caller: reading happens through `tokio::fs` and
//! decoding on the blocking pool. Each load is independent and settles in its
//! own time; a failure is returned as a [`LoadError`] value so that callers
//! can carry on with unrelated layers.

use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use tracing::{debug, trace};

use crate::error::LoadError;

/// Opaque reference to encoded image data.
#[derive(Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Encoded bytes held in memory, shared by every layer that refers to them.
    Bytes(Arc<[u8]>),
    /// Encoded image on disk.
    Path(PathBuf),
}

impl ImageSource {
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Bytes(bytes.into())
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Encoded bytes of the image, read from disk for [`ImageSource::Path`].
    pub async fn read(&self) -> Result<Arc<[u8]>, LoadError> {
        match self {
            Self::Bytes(bytes) => Ok(Arc::clone(bytes)),
            Self::Path(path) => Ok(tokio::fs::read(path).await?.into()),
        }
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Path(path) => write!(f, "Path({})", path.display()),
        }
    }
}

/// Decoded RGBA8 pixels with known intrinsic size. Never mutated after decode.
#[derive(Debug, Clone)]
pub struct DecodedImage(Arc<RgbaImage>);

impl DecodedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self(Arc::new(pixels))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageLoader {
    timeout: Option<Duration>,
}

impl ImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat a load that has not settled after `timeout` as failed.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub async fn load(&self, source: &ImageSource) -> Result<DecodedImage, LoadError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, load_source(source))
                .await
                .map_err(|_| LoadError::TimedOut(limit))?,
            None => load_source(source).await,
        }
    }
}

async fn load_source(source: &ImageSource) -> Result<DecodedImage, LoadError> {
    let bytes = source.read().await?;
    trace!(?source, len = bytes.len(), "decoding image");
    let decoded = tokio::task::spawn_blocking(move || decode_rgba8_apply_exif(&bytes))
        .await
        .map_err(|err| LoadError::Task(err.to_string()))??;
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(LoadError::Empty { width, height });
    }
    debug!(?source, width, height, "decoded image");
    Ok(DecodedImage::new(decoded))
}

/// Decodes to RGBA8 and applies the EXIF orientation when one is present,
/// the way browsers present uploaded photos.
pub fn decode_rgba8_apply_exif(bytes: &[u8]) -> Result<RgbaImage, LoadError> {
    let img = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;
    let img = img.to_rgba8();

    let orientation = read_orientation(bytes).unwrap_or(1);
    Ok(apply_orientation(img, orientation))
}

fn apply_orientation(img: RgbaImage, orientation: u16) -> RgbaImage {
    use image::imageops::{flip_horizontal, flip_vertical, rotate90, rotate180, rotate270};
    match orientation {
        2 => flip_horizontal(&img),
        3 => rotate180(&img),
        4 => flip_vertical(&img),
        // transpose
        5 => flip_horizontal(&rotate90(&img)),
        6 => rotate90(&img),
        // transverse
        7 => flip_horizontal(&rotate270(&img)),
        8 => rotate270(&img),
        _ => img,
    }
}

fn read_orientation(bytes: &[u8]) -> Option<u16> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let orientation = field.value.get_uint(0)? as u16;
    debug!(orientation, "exif orientation");
    Some(orientation)
}
