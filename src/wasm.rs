//! JavaScript bindings.

use js_sys::{Array, Object, Reflect, Uint8Array};
use wasm_bindgen::prelude::*;

use crate::{DistillOptions, distill_bytes};

/// Distill an encoded image (any format the `image` crate can decode).
///
/// `palette`, when given, is an array of `RRGGBB` / `#RRGGBB` strings used
/// instead of extracting dominant colors.
///
/// Returns `{ image: Uint8Array, palette: string[] }` where `image` holds PNG
/// bytes that can be turned into a `Blob`, `ImageBitmap`, etc.
#[wasm_bindgen(js_name = distill)]
pub fn distill_image(
    input: Vec<u8>,
    block_size: u32,
    n_colors: usize,
    palette: Option<Array>,
) -> Result<Object, JsValue> {
    let palette_hex = palette
        .map(|js_palette| {
            js_palette
                .iter()
                .map(|val| {
                    val.as_string()
                        .ok_or_else(|| JsValue::from_str("Palette values must be strings"))
                })
                .collect::<Result<Vec<String>, JsValue>>()
        })
        .transpose()?;

    let options = DistillOptions {
        block_size,
        colors: n_colors,
        ..DistillOptions::default()
    };
    let (png, palette_out) = distill_bytes(&input, &options, palette_hex.as_deref())
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    let palette_js = Array::new();
    for hex in palette_out {
        palette_js.push(&JsValue::from_str(&hex));
    }

    let result = Object::new();
    Reflect::set(&result, &JsValue::from_str("image"), &Uint8Array::from(png.as_slice()))?;
    Reflect::set(&result, &JsValue::from_str("palette"), &palette_js)?;

    Ok(result)
}
