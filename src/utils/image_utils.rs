use image::{imageops, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::filter::box_filter;
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use ndarray::{Array, Array4};

use crate::orientation::Orientation;
use crate::utils::error::ImageError;

pub const WHITE: Rgb<u8> = Rgb([255u8, 255u8, 255u8]);

/// Creates a page of the given size filled with white.
#[must_use]
pub fn blank_page(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_pixel(width, height, WHITE)
}

/// Converts an RGB page to luminance.
#[must_use]
pub fn to_gray(img: &RgbImage) -> GrayImage {
    imageops::grayscale(img)
}

/// Marks dark pixels as foreground.
///
/// Pixels at or below the Otsu level of `gray` become 255, the rest 0, so
/// the result can be fed straight into contour extraction. Returns the mask
/// together with the level used.
#[must_use]
pub fn ink_mask(gray: &GrayImage) -> (GrayImage, u8) {
    let level = otsu_level(gray);
    let mask = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] <= level {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    (mask, level)
}

/// Marks ink that stands out from the paper around it.
///
/// A pixel counts when it lies on the dark side of the Otsu level and is at
/// least `depth` levels darker than the mean of the `(2 * radius + 1)`
/// square window centred on it. Shading gradients and paper grain never
/// qualify, so a blank sheet yields an empty mask.
#[must_use]
pub fn local_ink_mask(gray: &GrayImage, radius: u32, depth: u8) -> GrayImage {
    let level = otsu_level(gray);
    let background = box_filter(gray, radius, radius);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y).0[0];
        let around = background.get_pixel(x, y).0[0];
        if value <= level && value.saturating_add(depth) <= around {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Marks bright pixels as foreground, the complement of [`ink_mask`].
#[must_use]
pub fn paper_mask(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] > level {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Warps the region bounded by `corners` onto an upright `width` x `height`
/// rectangle.
///
/// `corners` must be ordered top-left, top-right, bottom-right, bottom-left.
/// Pixels that fall outside the source are filled with white.
pub fn warp_quad(
    src: &RgbImage,
    corners: &[(f32, f32); 4],
    width: u32,
    height: u32,
) -> Result<RgbImage, ImageError> {
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidInput {
            message: format!("Invalid output dimensions {width}x{height}"),
        });
    }

    let right = (width - 1) as f32;
    let bottom = (height - 1) as f32;
    let to_points = [(0.0, 0.0), (right, 0.0), (right, bottom), (0.0, bottom)];

    let projection =
        Projection::from_control_points(*corners, to_points).ok_or(ImageError::ProjectionFailed)?;

    let mut output: RgbImage = ImageBuffer::new(width, height);
    warp_into(src, &projection, Interpolation::Bilinear, WHITE, &mut output);
    Ok(output)
}

/// Undoes a detected orientation, returning the upright page.
pub fn rotate_image(img: &RgbImage, orientation: Orientation) -> RgbImage {
    match orientation {
        Orientation::Oriented0 => img.clone(),
        Orientation::Oriented90 => imageops::rotate270(img),
        Orientation::Oriented180 => imageops::rotate180(img),
        Orientation::Oriented270 => imageops::rotate90(img),
    }
}

/// Converts an image into a normalized NCHW tensor.
pub fn subtract_mean_normalize(
    img: &RgbImage,
    mean_values: &[f32; 3],
    norm_values: &[f32; 3],
) -> Array4<f32> {
    let width = img.width() as usize;
    let height = img.height() as usize;

    let mut input = Array::zeros((1, 3, height, width));

    for (x, y, pixel) in img.enumerate_pixels() {
        for ch in 0..3 {
            let value = pixel.0[ch] as f32;
            input[[0, ch, y as usize, x as usize]] =
                (value * norm_values[ch]) - (mean_values[ch] * norm_values[ch]);
        }
    }

    input
}

/// Median of a slice of finite values; `None` when empty.
#[must_use]
pub fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
