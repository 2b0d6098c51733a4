use image::{Rgb, RgbImage};

/// Raw BGR buffer filled with one color.
pub fn solid_bgr(width: u32, height: u32, bgr: [u8; 3]) -> Vec<u8> {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    bgr.iter()
        .copied()
        .cycle()
        .take((width * height * 3) as usize)
        .collect()
}

/// Black canvas with one filled square of `color` at `(x0, y0)`.
pub fn square_on_black(size: u32, x0: u32, y0: u32, side: u32, color: [u8; 3]) -> RgbImage {
    assert!(x0 + side <= size && y0 + side <= size, "square must fit the canvas");
    RgbImage::from_fn(size, size, |x, y| {
        let inside = (x0..x0 + side).contains(&x) && (y0..y0 + side).contains(&y);
        if inside { Rgb(color) } else { Rgb([0, 0, 0]) }
    })
}

/// Black canvas with two separated squares of the same color.
pub fn two_squares_on_black(color: [u8; 3]) -> RgbImage {
    let mut img = square_on_black(120, 15, 15, 10, color);
    for y in 85..95 {
        for x in 85..95 {
            img.put_pixel(x, y, Rgb(color));
        }
    }
    img
}
