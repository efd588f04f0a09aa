#![allow(dead_code)]

use image::{Rgb, RgbImage};

pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// White page with horizontal text-like bars. Each bar has short ticks above
/// it, standing in for ascenders. Nothing touches the page edges.
pub fn synthetic_form(width: u32, height: u32) -> RgbImage {
    let mut page = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let (left, right) = (60, width - 60);

    let mut y = 80;
    while y + 8 < height - 60 {
        for row in y..y + 8 {
            for x in left..right {
                page.put_pixel(x, row, BLACK);
            }
        }
        let mut x = left + 10;
        while x + 3 <= right - 10 {
            for row in y - 8..y {
                for dx in 0..3 {
                    page.put_pixel(x + dx, row, BLACK);
                }
            }
            x += 20;
        }
        y += 40;
    }

    page
}

/// Share of pixels inside the rectangle darker than `threshold`.
pub fn dark_fraction(image: &RgbImage, x: u32, y: u32, w: u32, h: u32, threshold: u8) -> f32 {
    let mut dark = 0;
    for yy in y..y + h {
        for xx in x..x + w {
            let p = image.get_pixel(xx, yy).0;
            if p.iter().map(|&c| c as u32).sum::<u32>() / 3 < threshold as u32 {
                dark += 1;
            }
        }
    }
    dark as f32 / (w * h) as f32
}

pub fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}
