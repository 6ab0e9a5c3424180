//! Reduce an image to a mosaic of its own dominant colors.
//!
//! The pipeline:
//! 1. Extract up to K dominant colors with K-means in CIE L*a*b*
//!    ([`extract_palette`]).
//! 2. Split the image into square blocks and average each one
//!    ([`average_color`]).
//! 3. Paint every block with the palette entry closest to its average under
//!    CIEDE2000 ([`nearest_color`]).
//!
//! [`distill`] runs the whole thing on a decoded image; [`distill_bytes`]
//! additionally decodes the input and encodes the result as PNG. The same
//! entry point is exported to JavaScript from the [`wasm`] module.

use std::io::Cursor;

use image::ImageFormat;
use tracing::debug;

pub mod average;
pub mod color;
pub mod distill;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod wasm;

pub use average::{Region, average_color};
pub use color::{ciede2000, from_lab, to_lab};
pub use distill::{DistillOptions, Distilled, distill, distill_with_palette};
pub use error::{Error, Result};
pub use extract::{KmeansOptions, Palette, Sampling, Swatch, extract_palette, parse_hex};
pub use matcher::{Match, nearest_color};

/// Decode `input`, distill it and encode the result as PNG.
///
/// With `palette_hex` the given colors are used as-is and no clustering
/// happens. Returns the PNG bytes and the palette as `RRGGBB` strings.
pub fn distill_bytes(
    input: &[u8],
    options: &DistillOptions,
    palette_hex: Option<&[String]>,
) -> Result<(Vec<u8>, Vec<String>)> {
    let img = image::load_from_memory(input)?;
    debug!(width = img.width(), height = img.height(), "decoded input");

    let (distilled, palette) = match palette_hex {
        Some(colors) => {
            let palette = Palette::from_hex(colors)?;
            (distill_with_palette(&img, &palette, options.block_size)?, palette)
        }
        None => {
            let Distilled { image, palette } = distill(&img, options)?;
            (image, palette)
        }
    };

    let mut buf = Vec::new();
    distilled.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;

    Ok((buf, palette.to_hex()))
}

/// Decode `input` and return its `n_colors` dominant colors as `RRGGBB`
/// strings, most common first.
pub fn extract_palette_bytes(
    input: &[u8],
    n_colors: usize,
    options: &KmeansOptions,
) -> Result<Vec<String>> {
    let img = image::load_from_memory(input)?;
    Ok(extract_palette(&img, n_colors, options)?.to_hex())
}
