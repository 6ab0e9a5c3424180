//! Color-space conversion and perceptual distance.
//!
//! Pixels enter as 8-bit sRGB and are compared in CIE L*a*b* (D65). The
//! conversion goes through linear RGB using the `palette` crate; the CIEDE2000
//! difference is computed here in `f64`.

use palette::{Clamp, IntoColor, Lab, LinSrgb, Srgb};

/// Convert an 8-bit sRGB color to CIE L*a*b* (D65).
#[inline]
pub fn to_lab(rgb: Srgb<u8>) -> Lab {
    let linear: LinSrgb = rgb.into_linear();
    linear.into_color()
}

/// Convert a Lab color back to 8-bit sRGB, clamping out-of-gamut values.
#[inline]
pub fn from_lab(lab: Lab) -> Srgb<u8> {
    let linear: LinSrgb = lab.into_color();
    let encoded: Srgb<f32> = Srgb::from_linear(linear);
    encoded.clamp().into_format::<u8>()
}

/// Squared Euclidean distance in Lab. Used for clustering, where centers are
/// arithmetic means.
#[inline]
pub(crate) fn lab_distance_sq(a: &Lab, b: &Lab) -> f32 {
    let dl = a.l - b.l;
    let da = a.a - b.a;
    let db = a.b - b.b;
    dl * dl + da * da + db * db
}

const POW25_7: f64 = 6_103_515_625.0; // 25^7

/// CIEDE2000 color difference (Sharma, Wu & Dalal, 2005) with unit weighting
/// factors.
///
/// The result is non-negative, symmetric in its arguments and zero when both
/// colors are equal.
pub fn ciede2000(lab1: &Lab, lab2: &Lab) -> f64 {
    let (l1, a1, b1) = (lab1.l as f64, lab1.a as f64, lab1.b as f64);
    let (l2, a2, b2) = (lab2.l as f64, lab2.a as f64, lab2.b as f64);

    // a' rescaling, driven by the mean chroma
    let c1 = a1.hypot(b1);
    let c2 = a2.hypot(b2);
    let c_bar7 = ((c1 + c2) * 0.5).powi(7);
    let g = 0.5 * (1.0 - (c_bar7 / (c_bar7 + POW25_7)).sqrt());
    let a1p = (1.0 + g) * a1;
    let a2p = (1.0 + g) * a2;

    let c1p = a1p.hypot(b1);
    let c2p = a2p.hypot(b2);
    let h1p = hue_degrees(b1, a1p);
    let h2p = hue_degrees(b2, a2p);
    let chroma_product = c1p * c2p;

    let delta_lp = l2 - l1;
    let delta_cp = c2p - c1p;
    let delta_hp = if chroma_product == 0.0 {
        0.0
    } else {
        let mut dh = h2p - h1p;
        if dh > 180.0 {
            dh -= 360.0;
        } else if dh < -180.0 {
            dh += 360.0;
        }
        dh
    };
    let delta_big_hp = 2.0 * chroma_product.sqrt() * (delta_hp.to_radians() * 0.5).sin();

    let l_bar_p = (l1 + l2) * 0.5;
    let c_bar_p = (c1p + c2p) * 0.5;
    let h_bar_p = if chroma_product == 0.0 {
        h1p + h2p
    } else if (h1p - h2p).abs() <= 180.0 {
        (h1p + h2p) * 0.5
    } else if h1p + h2p < 360.0 {
        (h1p + h2p + 360.0) * 0.5
    } else {
        (h1p + h2p - 360.0) * 0.5
    };

    let t = 1.0 - 0.17 * (h_bar_p - 30.0).to_radians().cos()
        + 0.24 * (2.0 * h_bar_p).to_radians().cos()
        + 0.32 * (3.0 * h_bar_p + 6.0).to_radians().cos()
        - 0.20 * (4.0 * h_bar_p - 63.0).to_radians().cos();

    let l50 = (l_bar_p - 50.0).powi(2);
    let s_l = 1.0 + 0.015 * l50 / (20.0 + l50).sqrt();
    let s_c = 1.0 + 0.045 * c_bar_p;
    let s_h = 1.0 + 0.015 * c_bar_p * t;

    let delta_theta = 30.0 * (-((h_bar_p - 275.0) / 25.0).powi(2)).exp();
    let c_bar_p7 = c_bar_p.powi(7);
    let r_c = 2.0 * (c_bar_p7 / (c_bar_p7 + POW25_7)).sqrt();
    let r_t = -r_c * (2.0 * delta_theta).to_radians().sin();

    let dl = delta_lp / s_l;
    let dc = delta_cp / s_c;
    let dh = delta_big_hp / s_h;

    (dl * dl + dc * dc + dh * dh + r_t * dc * dh).max(0.0).sqrt()
}

/// Hue angle in degrees within `[0, 360)`; zero for achromatic input.
#[inline]
fn hue_degrees(b: f64, a_prime: f64) -> f64 {
    if a_prime == 0.0 && b == 0.0 {
        0.0
    } else {
        b.atan2(a_prime).to_degrees().rem_euclid(360.0)
    }
}
