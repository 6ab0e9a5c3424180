use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while distilling an image.
///
/// All variants are validation failures: they are raised immediately and
/// retrying with the same input gives the same error.
#[derive(Debug, Error)]
pub enum Error {
    /// Palette size must be at least 1.
    #[error("palette size must be at least 1, got {0}")]
    InvalidK(usize),

    /// There were no pixels to cluster.
    #[error("cannot extract a palette from an empty image")]
    EmptyInput,

    /// The block region has zero area or does not overlap the image.
    #[error("invalid region {width}x{height} at ({x}, {y}) for a {image_width}x{image_height} image")]
    InvalidRegion {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        image_width: u32,
        image_height: u32,
    },

    /// Nearest-color lookup against a palette with no entries.
    #[error("palette has no entries")]
    EmptyPalette,

    #[error("block size must be at least 1")]
    InvalidBlockSize,

    #[error("invalid hex color {0:?} (expected RRGGBB)")]
    InvalidHexColor(String),

    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
}
