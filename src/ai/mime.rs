use image::ImageFormat;

/// MIME type for an uploaded image, sniffed from its magic bytes.
///
/// Unknown formats are sent as JPEG, which is what most phone uploads are.
pub fn detect_image_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) => {
            tracing::warn!(
                "Unrecognized image format (first 4 bytes: {:02X?}), falling back to image/jpeg",
                &bytes[..bytes.len().min(4)]
            );
            ImageFormat::Jpeg.to_mime_type()
        }
    }
}
