//! Artwork thumbnails for the now-playing item

use anyhow::{Context, Result};

/// Edge length of the menu thumbnail in pixels
pub const THUMBNAIL_SIZE: u32 = 64;

/// Decoded RGBA thumbnail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode raw artwork bytes (JPEG or PNG) and scale them to fit
/// [`THUMBNAIL_SIZE`], keeping the aspect ratio.
pub fn thumbnail(bytes: &[u8]) -> Result<Thumbnail> {
    let mut image = image::load_from_memory(bytes).context("Failed to decode artwork")?;
    if image.width() > THUMBNAIL_SIZE || image.height() > THUMBNAIL_SIZE {
        image = image.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE);
    }
    let image = image.into_rgba8();

    let (width, height) = image.dimensions();
    Ok(Thumbnail {
        rgba: image.into_raw(),
        width,
        height,
    })
}
