use palette::Srgb;

use crate::color::{ciede2000, to_lab};
use crate::error::{Error, Result};
use crate::extract::Palette;

/// Result of a nearest-color lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Match {
    /// Position of the winning entry in the palette.
    pub index: usize,
    pub color: Srgb<u8>,
    /// CIEDE2000 difference between the query and `color`.
    pub distance: f64,
}

/// Find the palette entry perceptually closest to `query` (CIEDE2000).
///
/// Ties go to the entry that comes first in the palette.
pub fn nearest_color(query: Srgb<u8>, palette: &Palette) -> Result<Match> {
    let lab = to_lab(query);
    let mut best: Option<Match> = None;
    for (index, swatch) in palette.iter().enumerate() {
        let distance = ciede2000(&lab, &swatch.lab);
        if best.is_none_or(|b| distance < b.distance) {
            best = Some(Match { index, color: swatch.rgb, distance });
        }
    }
    best.ok_or(Error::EmptyPalette)
}
