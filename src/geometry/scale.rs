use image::{imageops, RgbImage};

/// Uniform factor bringing the longer side down to `limit`; never above 1.
#[must_use]
pub fn scale_factor(width: u32, height: u32, limit: u32) -> f32 {
    let longest = width.max(height);
    if longest == 0 || limit == 0 || longest <= limit {
        return 1.0;
    }
    limit as f32 / longest as f32
}

/// Target dimensions for `factor`, each at least one pixel.
#[must_use]
pub fn scaled_dimensions(width: u32, height: u32, factor: f32) -> (u32, u32) {
    (
        ((width as f32 * factor).round() as u32).max(1),
        ((height as f32 * factor).round() as u32).max(1),
    )
}

/// Downscales so the longer side is at most `limit`, keeping the aspect
/// ratio. Images already within the limit are returned untouched.
pub fn normalize_scale(image: RgbImage, limit: u32) -> (RgbImage, f32) {
    let factor = scale_factor(image.width(), image.height(), limit);
    if factor >= 1.0 {
        return (image, 1.0);
    }

    let (width, height) = scaled_dimensions(image.width(), image.height(), factor);
    let resized = imageops::resize(&image, width, height, imageops::FilterType::Lanczos3);
    (resized, factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_factor_never_upscales() {
        assert_eq!(scale_factor(800, 600, 2000), 1.0);
        assert_eq!(scale_factor(4000, 3000, 2000), 0.5);
        assert_eq!(scale_factor(0, 0, 2000), 1.0);
    }

    #[test]
    fn test_scaled_dimensions_hit_limit() {
        let factor = scale_factor(3001, 1999, 1000);
        let (w, h) = scaled_dimensions(3001, 1999, factor);
        assert_eq!(w, 1000);
        assert!((h as f32 - 1999.0 * factor).abs() <= 1.0);
    }
}
