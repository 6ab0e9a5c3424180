//! Block averaging.

use image::{GenericImageView, Pixel};
use palette::Srgb;

use crate::error::{Error, Result};

/// A half-open rectangle `[x, x + width) × [y, y + height)` in image
/// coordinates. It may extend past the image; readers clip it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Square block of side `size` with its top-left corner at `(x, y)`.
    pub fn block(x: u32, y: u32, size: u32) -> Self {
        Self::new(x, y, size, size)
    }

    /// Intersect with a `image_width × image_height` image. Returns `None`
    /// when nothing is left.
    pub fn clip(&self, image_width: u32, image_height: u32) -> Option<Region> {
        let x_end = self.x.saturating_add(self.width).min(image_width);
        let y_end = self.y.saturating_add(self.height).min(image_height);
        if self.x >= x_end || self.y >= y_end {
            return None;
        }
        Some(Region::new(self.x, self.y, x_end - self.x, y_end - self.y))
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    fn invalid(&self, image_width: u32, image_height: u32) -> Error {
        Error::InvalidRegion {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            image_width,
            image_height,
        }
    }
}

/// Mean color of `region`, clipped to the bounds of `image`.
///
/// Channels are summed in `u64` and divided with truncation, so a 2×2 block of
/// two pure reds and two blacks averages to `(127, 0, 0)`. Pixels outside the
/// image are never read nor counted. Alpha is ignored.
pub fn average_color<I>(image: &I, region: Region) -> Result<Srgb<u8>>
where
    I: GenericImageView,
    I::Pixel: Pixel<Subpixel = u8>,
{
    let (image_width, image_height) = image.dimensions();
    if region.width == 0 || region.height == 0 {
        return Err(region.invalid(image_width, image_height));
    }
    let clipped = region
        .clip(image_width, image_height)
        .ok_or_else(|| region.invalid(image_width, image_height))?;

    let (r, g, b) = (clipped.y..clipped.y + clipped.height)
        .flat_map(|y| (clipped.x..clipped.x + clipped.width).map(move |x| (x, y)))
        .fold((0u64, 0u64, 0u64), |(r, g, b), (x, y)| {
            let [pr, pg, pb] = image.get_pixel(x, y).to_rgb().0;
            (r + pr as u64, g + pg as u64, b + pb as u64)
        });

    let count = clipped.area();
    Ok(Srgb::new(
        (r / count) as u8,
        (g / count) as u8,
        (b / count) as u8,
    ))
}
