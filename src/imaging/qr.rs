use image::{DynamicImage, Luma};
use qrcode::QrCode;

use crate::error::{MediaError, Result};
use crate::video::types::Frame;

/// Render `content` as a QR code, `module_size` pixels per module, with the
/// standard quiet zone
pub fn qr_code(content: &str, module_size: u32) -> Result<Frame> {
    let code = QrCode::new(content.as_bytes()).map_err(|e| MediaError::InvalidParameters {
        details: format!("cannot encode {:?} as a QR code: {}", content, e),
    })?;

    let size = module_size.max(1);
    let image = code
        .render::<Luma<u8>>()
        .module_dimensions(size, size)
        .build();

    Ok(Frame::new(DynamicImage::ImageLuma8(image).to_rgb8()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qr_is_square_with_quiet_zone() {
        let frame = qr_code("SN-000123", 4).unwrap();
        assert_eq!(frame.width(), frame.height());
        assert_eq!(frame.width() % 4, 0);
        // quiet zone is white, the finder pattern corner is dark
        assert_eq!(frame.get_pixel(0, 0), [255, 255, 255]);
        assert_eq!(frame.get_pixel(16, 16), [0, 0, 0]);
    }
}
