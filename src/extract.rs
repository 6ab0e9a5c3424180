//! Dominant-color extraction with K-means in Lab space.
//!
//! Steps:
//! 1. Take a nearest-neighbour sample grid of the image (half its width by
//!    default) and convert every sample to Lab.
//! 2. Seed up to `k` centers with k-means++ driven by a seeded `StdRng`.
//! 3. Alternate nearest-center assignment and mean update until nothing is
//!    reassigned, no center moves more than `convergence`, or
//!    `max_iterations` is reached. Empty clusters are re-seeded to the sample
//!    farthest from its own center.
//! 4. Keep the populated clusters, most populous first, rounded to 8-bit sRGB
//!    and deduplicated.

use image::{GenericImageView, Pixel};
use palette::{Lab, Srgb};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::color::{from_lab, lab_distance_sq, to_lab};
use crate::error::{Error, Result};

/// Which pixels feed the clustering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sampling {
    /// Every pixel of the image.
    All,
    /// A grid at most this many columns wide, rows scaled to keep the aspect
    /// ratio.
    Width(u32),
    /// A grid half as wide as the image.
    HalfWidth,
}

/// Tuning knobs for [`extract_palette`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KmeansOptions {
    pub max_iterations: usize,
    /// Stop once no center moves further than this (squared Lab distance).
    pub convergence: f32,
    /// Seed for the k-means++ initialisation. Identical input, `k` and seed
    /// give an identical palette.
    pub seed: u64,
    pub sampling: Sampling,
}

impl Default for KmeansOptions {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            convergence: 1e-4,
            seed: 0,
            sampling: Sampling::HalfWidth,
        }
    }
}

/// One palette entry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Swatch {
    pub rgb: Srgb<u8>,
    /// Lab of the rounded `rgb`, so matching `rgb` itself yields distance 0.
    pub lab: Lab,
    /// Fraction of the sampled pixels that fell in this cluster. Zero for
    /// palettes that were not clustered.
    pub share: f32,
}

impl Swatch {
    pub fn new(rgb: Srgb<u8>, share: f32) -> Self {
        Self { rgb, lab: to_lab(rgb), share }
    }
}

/// Ordered set of distinct colors an image is quantized to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Palette {
    swatches: Vec<Swatch>,
}

impl Palette {
    /// Build a palette from explicit colors. Later duplicates are dropped.
    pub fn new(colors: impl IntoIterator<Item = Srgb<u8>>) -> Self {
        let mut swatches: Vec<Swatch> = Vec::new();
        for rgb in colors {
            if swatches.iter().all(|s| s.rgb != rgb) {
                swatches.push(Swatch::new(rgb, 0.0));
            }
        }
        Self { swatches }
    }

    /// Wrap swatches as-is, duplicates included.
    #[cfg(test)]
    pub(crate) fn from_swatches(swatches: Vec<Swatch>) -> Self {
        Self { swatches }
    }

    /// Parse `RRGGBB` / `#RRGGBB` strings into a palette.
    pub fn from_hex<S: AsRef<str>>(colors: &[S]) -> Result<Self> {
        let parsed = colors
            .iter()
            .map(|s| parse_hex(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(parsed))
    }

    /// Colors as upper-case `RRGGBB` strings, in palette order.
    pub fn to_hex(&self) -> Vec<String> {
        self.swatches
            .iter()
            .map(|s| format!("{:02X}{:02X}{:02X}", s.rgb.red, s.rgb.green, s.rgb.blue))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.swatches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.swatches.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Swatch> {
        self.swatches.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Swatch> {
        self.swatches.iter()
    }

    pub fn colors(&self) -> Vec<Srgb<u8>> {
        self.swatches.iter().map(|s| s.rgb).collect()
    }
}

impl<'a> IntoIterator for &'a Palette {
    type Item = &'a Swatch;
    type IntoIter = std::slice::Iter<'a, Swatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Parse a single `RRGGBB` color, with or without a leading `#`.
pub fn parse_hex(s: &str) -> Result<Srgb<u8>> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.bytes().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidHexColor(s.to_string()));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| Error::InvalidHexColor(s.to_string()))
    };
    Ok(Srgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Extract at most `k` dominant colors from `image`.
///
/// Fails with [`Error::InvalidK`] when `k == 0` and with
/// [`Error::EmptyInput`] when the image has no pixels. Fewer than `k` colors
/// come back when the image does not have `k` separable clusters.
pub fn extract_palette<I>(image: &I, k: usize, options: &KmeansOptions) -> Result<Palette>
where
    I: GenericImageView,
    I::Pixel: Pixel<Subpixel = u8>,
{
    if k == 0 {
        return Err(Error::InvalidK(k));
    }
    let samples = sample_lab(image, options.sampling);
    if samples.is_empty() {
        return Err(Error::EmptyInput);
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut centers = kmeans_plus_plus(&samples, k, &mut rng);
    let mut assignments = vec![usize::MAX; samples.len()];

    for _ in 0..options.max_iterations {
        if !assign(&samples, &centers, &mut assignments) {
            break;
        }
        if update_centers(&samples, &assignments, &mut centers) <= options.convergence {
            break;
        }
    }
    assign(&samples, &centers, &mut assignments);

    let mut counts = vec![0usize; centers.len()];
    for &cluster in &assignments {
        counts[cluster] += 1;
    }

    let mut clusters: Vec<(Lab, usize)> = centers
        .into_iter()
        .zip(counts)
        .filter(|&(_, count)| count > 0)
        .collect();
    // stable: equal populations keep center order
    clusters.sort_by(|a, b| b.1.cmp(&a.1));

    let mut merged: Vec<(Srgb<u8>, usize)> = Vec::with_capacity(clusters.len());
    for (center, count) in clusters {
        let rgb = from_lab(center);
        match merged.iter_mut().find(|(seen, _)| *seen == rgb) {
            Some((_, total)) => *total += count,
            None => merged.push((rgb, count)),
        }
    }

    let total = samples.len() as f32;
    Ok(Palette {
        swatches: merged
            .into_iter()
            .map(|(rgb, count)| Swatch::new(rgb, count as f32 / total))
            .collect(),
    })
}

fn sample_lab<I>(image: &I, sampling: Sampling) -> Vec<Lab>
where
    I: GenericImageView,
    I::Pixel: Pixel<Subpixel = u8>,
{
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let sample_w = match sampling {
        Sampling::All => width,
        Sampling::Width(w) => w.clamp(1, width),
        Sampling::HalfWidth => (width / 2).max(1),
    };
    let sample_h = ((height as u64 * sample_w as u64 + width as u64 / 2) / width as u64)
        .clamp(1, height as u64) as u32;

    // sample at cell centres
    let pick = |i: u32, out: u32, full: u32| ((2 * i as u64 + 1) * full as u64 / (2 * out as u64)) as u32;

    let mut samples = Vec::with_capacity(sample_w as usize * sample_h as usize);
    for sy in 0..sample_h {
        let y = pick(sy, sample_h, height);
        for sx in 0..sample_w {
            let x = pick(sx, sample_w, width);
            let [r, g, b] = image.get_pixel(x, y).to_rgb().0;
            samples.push(to_lab(Srgb::new(r, g, b)));
        }
    }
    samples
}

/// k-means++ seeding. Stops early once every sample coincides with a chosen
/// center, so the result may hold fewer than `k` centers.
fn kmeans_plus_plus(samples: &[Lab], k: usize, rng: &mut StdRng) -> Vec<Lab> {
    let mut centers = Vec::with_capacity(k);
    centers.push(samples[rng.random_range(0..samples.len())]);

    let mut nearest: Vec<f64> = samples
        .iter()
        .map(|s| lab_distance_sq(s, &centers[0]) as f64)
        .collect();

    while centers.len() < k {
        let total: f64 = nearest.iter().sum();
        if total <= 0.0 {
            break;
        }
        let mut target = rng.random::<f64>() * total;
        let mut chosen = nearest.iter().rposition(|&w| w > 0.0).unwrap_or(0);
        for (i, &w) in nearest.iter().enumerate() {
            if w <= 0.0 {
                continue;
            }
            if target < w {
                chosen = i;
                break;
            }
            target -= w;
        }

        let center = samples[chosen];
        centers.push(center);
        for (d, s) in nearest.iter_mut().zip(samples) {
            *d = d.min(lab_distance_sq(s, &center) as f64);
        }
    }
    centers
}

/// Point every sample at its nearest center (first one wins ties). Returns
/// whether any assignment changed.
fn assign(samples: &[Lab], centers: &[Lab], assignments: &mut [usize]) -> bool {
    let mut changed = false;
    for (sample, slot) in samples.iter().zip(assignments.iter_mut()) {
        let mut best = 0;
        let mut best_dist = f32::INFINITY;
        for (i, center) in centers.iter().enumerate() {
            let d = lab_distance_sq(sample, center);
            if d < best_dist {
                best_dist = d;
                best = i;
            }
        }
        if *slot != best {
            *slot = best;
            changed = true;
        }
    }
    changed
}

/// Move every center to the mean of its members and return the largest
/// squared movement. A center with no members is moved onto the sample
/// farthest from its own center; that counts as unbounded movement.
fn update_centers(samples: &[Lab], assignments: &[usize], centers: &mut [Lab]) -> f32 {
    let mut sums = vec![([0f64; 3], 0usize); centers.len()];
    for (s, &cluster) in samples.iter().zip(assignments) {
        let (sum, count) = &mut sums[cluster];
        sum[0] += s.l as f64;
        sum[1] += s.a as f64;
        sum[2] += s.b as f64;
        *count += 1;
    }

    let mut moved = 0f32;
    let mut empty: Vec<usize> = Vec::new();
    for (i, ([l, a, b], count)) in sums.into_iter().enumerate() {
        if count == 0 {
            empty.push(i);
            continue;
        }
        let n = count as f64;
        let mean = Lab::new((l / n) as f32, (a / n) as f32, (b / n) as f32);
        moved = moved.max(lab_distance_sq(&centers[i], &mean));
        centers[i] = mean;
    }

    // re-seed against the finished means
    let mut reseeded: Vec<usize> = Vec::new();
    for i in empty {
        if let Some(idx) = farthest_sample(samples, assignments, centers, &reseeded) {
            centers[i] = samples[idx];
            reseeded.push(idx);
            moved = f32::INFINITY;
        }
    }
    moved
}

fn farthest_sample(
    samples: &[Lab],
    assignments: &[usize],
    centers: &[Lab],
    taken: &[usize],
) -> Option<usize> {
    samples
        .iter()
        .zip(assignments)
        .enumerate()
        .filter(|(i, _)| !taken.contains(i))
        .map(|(i, (s, &c))| (i, lab_distance_sq(s, &centers[c])))
        .filter(|&(_, d)| d > 0.0)
        .fold(None, |best: Option<(usize, f32)>, (i, d)| match best {
            Some((_, bd)) if bd >= d => best,
            _ => Some((i, d)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ciede2000;
    use image::{Rgb, RgbImage};
    use pretty_assertions::assert_eq;

    fn halves(left: Rgb<u8>, right: Rgb<u8>) -> RgbImage {
        RgbImage::from_fn(100, 100, |x, _| if x < 50 { left } else { right })
    }

    fn noisy(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let v = x.wrapping_mul(2_654_435_761).wrapping_add(y.wrapping_mul(40_503));
            Rgb([(v >> 3) as u8, (v >> 11) as u8, (v >> 19) as u8])
        })
    }

    #[test]
    fn rejects_zero_k() {
        let img = RgbImage::new(4, 4);
        assert!(matches!(
            extract_palette(&img, 0, &KmeansOptions::default()),
            Err(Error::InvalidK(0))
        ));
    }

    #[test]
    fn rejects_empty_image() {
        let img = RgbImage::new(0, 0);
        assert!(matches!(
            extract_palette(&img, 3, &KmeansOptions::default()),
            Err(Error::EmptyInput)
        ));
        let img = RgbImage::new(5, 0);
        assert!(matches!(
            extract_palette(&img, 3, &KmeansOptions::default()),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn red_blue_halves_give_red_and_blue() {
        let red = Srgb::new(255u8, 0, 0);
        let blue = Srgb::new(0u8, 0, 255);
        let img = halves(Rgb([255, 0, 0]), Rgb([0, 0, 255]));
        let palette = extract_palette(&img, 2, &KmeansOptions::default()).unwrap();
        assert_eq!(palette.len(), 2);
        for target in [red, blue] {
            let target = to_lab(target);
            let best = palette
                .iter()
                .map(|s| ciede2000(&s.lab, &target))
                .fold(f64::INFINITY, f64::min);
            assert!(best < 5.0, "no palette entry near {target:?}: {palette:?}");
        }
    }

    #[test]
    fn uniform_image_collapses_to_one_color() {
        let img = RgbImage::from_pixel(20, 10, Rgb([40, 80, 120]));
        let palette = extract_palette(&img, 5, &KmeansOptions::default()).unwrap();
        assert_eq!(palette.colors(), vec![Srgb::new(40, 80, 120)]);
        assert_eq!(palette.get(0).unwrap().share, 1.0);
    }

    #[test]
    fn single_pixel_image() {
        let img = RgbImage::from_pixel(1, 1, Rgb([1, 2, 3]));
        let palette = extract_palette(&img, 8, &KmeansOptions::default()).unwrap();
        assert_eq!(palette.colors(), vec![Srgb::new(1, 2, 3)]);
    }

    #[test]
    fn palette_size_is_bounded_and_distinct() {
        let img = noisy(64, 48);
        for k in 1..=8 {
            let palette = extract_palette(&img, k, &KmeansOptions::default()).unwrap();
            assert!((1..=k).contains(&palette.len()), "k={k}, len={}", palette.len());
            let colors = palette.colors();
            for (i, a) in colors.iter().enumerate() {
                assert!(!colors[i + 1..].contains(a), "duplicate {a:?} for k={k}");
            }
        }
    }

    #[test]
    fn same_seed_same_palette() {
        let img = noisy(80, 60);
        let options = KmeansOptions { seed: 42, ..KmeansOptions::default() };
        let first = extract_palette(&img, 6, &options).unwrap();
        let second = extract_palette(&img, 6, &options).unwrap();
        assert_eq!(first.colors(), second.colors());
    }

    #[test]
    fn ordered_by_population() {
        // 3/4 green, 1/4 magenta
        let img = RgbImage::from_fn(40, 40, |x, _| {
            if x < 30 { Rgb([0, 200, 0]) } else { Rgb([200, 0, 200]) }
        });
        let palette = extract_palette(&img, 2, &KmeansOptions::default()).unwrap();
        assert_eq!(palette.colors(), vec![Srgb::new(0, 200, 0), Srgb::new(200, 0, 200)]);
        let shares: Vec<f32> = palette.iter().map(|s| s.share).collect();
        assert!(shares[0] > shares[1]);
        assert!((shares.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sampling_all_reads_every_pixel() {
        // A single odd pixel is invisible to the half-width grid but not to
        // the full scan.
        let mut img = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        img.put_pixel(0, 0, Rgb([255, 255, 255]));
        let all = KmeansOptions { sampling: Sampling::All, ..KmeansOptions::default() };
        assert_eq!(extract_palette(&img, 2, &all).unwrap().len(), 2);
        let half = KmeansOptions::default();
        assert_eq!(extract_palette(&img, 2, &half).unwrap().len(), 1);
    }

    #[test]
    fn sample_grid_keeps_aspect_ratio() {
        let img = RgbImage::new(100, 40);
        assert_eq!(sample_lab(&img, Sampling::HalfWidth).len(), 50 * 20);
        assert_eq!(sample_lab(&img, Sampling::Width(10)).len(), 10 * 4);
        assert_eq!(sample_lab(&img, Sampling::Width(500)).len(), 100 * 40);
        assert_eq!(sample_lab(&RgbImage::new(1, 7), Sampling::HalfWidth).len(), 7);
    }

    #[test]
    fn empty_cluster_is_reseeded_to_farthest_sample() {
        let samples = vec![
            Lab::new(10.0, 0.0, 0.0),
            Lab::new(12.0, 0.0, 0.0),
            Lab::new(90.0, 0.0, 0.0),
        ];
        let mut centers = vec![Lab::new(11.0, 0.0, 0.0), Lab::new(-500.0, 0.0, 0.0)];
        let assignments = vec![0, 0, 0];
        let moved = update_centers(&samples, &assignments, &mut centers);
        assert!(moved.is_infinite());
        assert_eq!(centers[1], samples[2]);
        assert!(centers.iter().all(|c| c.l.is_finite()));
    }

    #[test]
    fn reseed_measures_against_updated_means() {
        // The empty cluster comes first. Against the stale center (l = 100)
        // the farthest sample would be l = 0; against the new mean (l ≈ 36.7)
        // it is l = 100.
        let samples = vec![
            Lab::new(0.0, 0.0, 0.0),
            Lab::new(10.0, 0.0, 0.0),
            Lab::new(100.0, 0.0, 0.0),
        ];
        let mut centers = vec![Lab::new(-500.0, 0.0, 0.0), Lab::new(100.0, 0.0, 0.0)];
        let assignments = vec![1, 1, 1];
        update_centers(&samples, &assignments, &mut centers);
        assert_eq!(centers[0], samples[2]);
        assert!((centers[1].l - 110.0 / 3.0).abs() < 1e-4);
    }

    #[test]
    fn two_empty_clusters_take_distinct_samples() {
        let samples = vec![
            Lab::new(0.0, 0.0, 0.0),
            Lab::new(50.0, 0.0, 0.0),
            Lab::new(52.0, 0.0, 0.0),
            Lab::new(100.0, 0.0, 0.0),
        ];
        let mut centers = vec![
            Lab::new(51.0, 0.0, 0.0),
            Lab::new(-500.0, 0.0, 0.0),
            Lab::new(-600.0, 0.0, 0.0),
        ];
        let assignments = vec![0, 0, 0, 0];
        update_centers(&samples, &assignments, &mut centers);
        assert_ne!(centers[1], centers[2]);
        assert!(samples.contains(&centers[1]) && samples.contains(&centers[2]));
    }

    #[test]
    fn kmeans_plus_plus_stops_when_samples_exhausted() {
        let samples = vec![Lab::new(50.0, 10.0, 10.0); 16];
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(kmeans_plus_plus(&samples, 4, &mut rng).len(), 1);
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(parse_hex("#ff8000").unwrap(), Srgb::new(255, 128, 0));
        assert_eq!(parse_hex("00A0fF").unwrap(), Srgb::new(0, 160, 255));
        for bad in ["", "#fff", "12345", "1234567", "+1+2+3", "gg0000", "é0000"] {
            assert!(matches!(parse_hex(bad), Err(Error::InvalidHexColor(_))), "{bad}");
        }
    }

    #[test]
    fn hex_palette_round_trip_drops_duplicates() {
        let palette = Palette::from_hex(&["#102030", "FFFFFF", "102030"]).unwrap();
        assert_eq!(palette.to_hex(), vec!["102030".to_string(), "FFFFFF".to_string()]);
    }
}
