//! Decoding of a module's photo reference.
//!
//! A photo is either an inline `data:image/...;base64,` URL, which keeps
//! exported modules self-contained, or a path on disk.

use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;

const DATA_URL_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

pub fn is_data_url(reference: &str) -> bool {
    reference.trim_start().starts_with(DATA_URL_PREFIX)
}

pub fn decode_photo(reference: &str) -> Result<DynamicImage> {
    let reference = reference.trim();
    match reference.strip_prefix(DATA_URL_PREFIX) {
        Some(rest) => decode_data_url(rest),
        None => image::open(reference).with_context(|| format!("cannot open photo `{reference}`")),
    }
}

fn decode_data_url(rest: &str) -> Result<DynamicImage> {
    let Some((media_type, payload)) = rest.split_once(BASE64_MARKER) else {
        bail!("photo data URL is not base64-encoded");
    };
    if !media_type.starts_with("image/") {
        bail!("photo data URL has media type `{media_type}`, expected image/*");
    }
    let bytes = STANDARD
        .decode(payload.trim())
        .context("photo data URL is not valid base64")?;
    image::load_from_memory(&bytes).context("cannot decode embedded photo")
}

/// Reads an image file into a data URL so the module carries its photo.
pub fn embed_photo(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("cannot read photo `{}`", path.display()))?;
    let format = image::guess_format(&bytes)
        .with_context(|| format!("`{}` is not a supported image", path.display()))?;
    log::debug!(
        "event=photo_embed module=photo status=ok bytes={} format={:?}",
        bytes.len(),
        format
    );
    Ok(format!(
        "{DATA_URL_PREFIX}{}{BASE64_MARKER}{}",
        format.to_mime_type(),
        STANDARD.encode(&bytes)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    #[test]
    fn inline_data_url_decodes() {
        let url = format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(3, 2)));
        assert!(is_data_url(&url));
        let image = decode_photo(&url).expect("embedded photo decodes");
        assert_eq!(image.dimensions(), (3, 2));
    }

    #[test]
    fn embedded_file_round_trips_through_data_url() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("board.png");
        std::fs::write(&path, png_bytes(4, 5)).expect("write png");

        let url = embed_photo(&path).expect("embed");
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(decode_photo(&url).expect("decode").dimensions(), (4, 5));

        let reference = path.to_string_lossy();
        assert!(!is_data_url(&reference));
        assert_eq!(decode_photo(&reference).expect("path").dimensions(), (4, 5));
    }

    #[test]
    fn malformed_data_urls_are_rejected() {
        assert!(decode_photo("data:image/png,rawbytes").is_err());
        assert!(decode_photo("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(decode_photo("data:image/png;base64,@@@").is_err());
        assert!(decode_photo("data:image/png;base64,iVBORw0KGgo=").is_err());
    }
}
