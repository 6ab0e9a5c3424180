//! Block-wise repainting of an image with its own dominant colors.

use image::{GenericImageView, Pixel, RgbImage};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::average::{Region, average_color};
use crate::error::{Error, Result};
use crate::extract::{KmeansOptions, Palette, extract_palette};
use crate::matcher::nearest_color;

/// Parameters for [`distill`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistillOptions {
    /// Side of the square blocks, in pixels.
    pub block_size: u32,
    /// Number of dominant colors to extract.
    pub colors: usize,
    pub kmeans: KmeansOptions,
}

impl Default for DistillOptions {
    fn default() -> Self {
        Self {
            block_size: 50,
            colors: 8,
            kmeans: KmeansOptions::default(),
        }
    }
}

/// A distilled image together with the palette it was painted with.
#[derive(Clone, Debug)]
pub struct Distilled {
    pub image: RgbImage,
    pub palette: Palette,
}

/// Extract a palette from `image`, then repaint every block with the palette
/// color nearest to the block's average.
pub fn distill<I>(image: &I, options: &DistillOptions) -> Result<Distilled>
where
    I: GenericImageView + Sync,
    I::Pixel: Pixel<Subpixel = u8>,
{
    if options.block_size == 0 {
        return Err(Error::InvalidBlockSize);
    }
    let palette = extract_palette(image, options.colors, &options.kmeans)?;
    debug!(
        requested = options.colors,
        extracted = palette.len(),
        palette = ?palette.to_hex(),
        "extracted palette"
    );
    let image = distill_with_palette(image, &palette, options.block_size)?;
    Ok(Distilled { image, palette })
}

/// Repaint `image` block by block using a fixed `palette`.
///
/// Blocks are half-open `block_size` squares laid out from `(0, 0)`; the last
/// row and column are clipped to the image. The output is split into bands of
/// `block_size` rows and each band is written by exactly one task, so with the
/// `parallel` feature bands are painted concurrently without sharing pixels.
pub fn distill_with_palette<I>(image: &I, palette: &Palette, block_size: u32) -> Result<RgbImage>
where
    I: GenericImageView + Sync,
    I::Pixel: Pixel<Subpixel = u8>,
{
    if block_size == 0 {
        return Err(Error::InvalidBlockSize);
    }
    if palette.is_empty() {
        return Err(Error::EmptyPalette);
    }

    let (width, height) = image.dimensions();
    let mut out = RgbImage::new(width, height);
    if width == 0 || height == 0 {
        return Ok(out);
    }

    let row_len = width as usize * 3;
    let band_len = (row_len as u64 * block_size as u64).min(out.len() as u64) as usize;
    debug!(
        width,
        height,
        block_size,
        blocks_x = width.div_ceil(block_size),
        blocks_y = height.div_ceil(block_size),
        "painting blocks"
    );

    let paint_band = |(band_index, band): (usize, &mut [u8])| -> Result<()> {
        let y = band_index as u32 * block_size;
        for x in (0..width).step_by(block_size as usize) {
            let average = average_color(image, Region::block(x, y, block_size))?;
            let color = nearest_color(average, palette)?.color;
            let rgb = [color.red, color.green, color.blue];

            let x_end = x.saturating_add(block_size).min(width) as usize;
            for row in band.chunks_exact_mut(row_len) {
                for px in row[x as usize * 3..x_end * 3].chunks_exact_mut(3) {
                    px.copy_from_slice(&rgb);
                }
            }
        }
        Ok(())
    };

    #[cfg(feature = "parallel")]
    out.par_chunks_mut(band_len).enumerate().try_for_each(paint_band)?;
    #[cfg(not(feature = "parallel"))]
    out.chunks_mut(band_len).enumerate().try_for_each(paint_band)?;

    Ok(out)
}
