use std::io::{Cursor, Read};

use image::ImageReader;

use crate::error::MediaShiftError;

/// Upper bound on how much of a payload is buffered to find its dimensions.
/// Enough for the header of every supported format, including JPEGs that
/// front-load large metadata segments.
pub const HEADER_PROBE_LIMIT: u64 = 256 * 1024;

/// Decodes image dimensions from the head of a stream without a full decode.
/// The stream does not need to be seekable; at most [`HEADER_PROBE_LIMIT`]
/// bytes are buffered. Truncated or non-image data yields an error, which
/// callers treat as "dimensions unknown".
pub fn probe_dimensions<R: Read>(mut reader: R) -> Result<(u32, u32), MediaShiftError> {
    let mut head = Vec::new();
    reader.by_ref().take(HEADER_PROBE_LIMIT).read_to_end(&mut head)?;

    let reader = ImageReader::new(Cursor::new(head)).with_guessed_format()?;
    let (width, height) = reader.into_dimensions()?;
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn probes_png_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.png");
        image::RgbaImage::new(5, 3).save(&path).unwrap();

        let file = File::open(&path).unwrap();
        assert_eq!(probe_dimensions(file).unwrap(), (5, 3));
    }

    #[test]
    fn rejects_non_image_data() {
        let result = probe_dimensions(&b"definitely not an image"[..]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_empty_stream() {
        let result = probe_dimensions(std::io::empty());
        assert!(result.is_err());
    }
}
