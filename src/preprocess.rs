//! Image preprocessing: crop, scale and rotate a camera frame into the
//! square buffer the detector expects, then convert it to the normalized
//! input tensor.
//!
//! Scaling is a bilinear resample. Rotation compensates for the
//! sensor-to-display orientation mismatch: every destination pixel is
//! mapped back through the inverse rotation about the image center and
//! sampled nearest-neighbor, with uncovered pixels left fully transparent.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use ndarray::{Array, IxDyn};
use serde::{Deserialize, Serialize};

use crate::error::DetectError;

/// Pixel normalization applied when building the input tensor.
pub const IMAGE_MEAN: f32 = 0.0;
pub const IMAGE_STD: f32 = 255.0;

/// Which part of the source the square crop is taken from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CropAnchor {
    #[default]
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Extract the largest axis-aligned square from `src`.
pub fn crop_square(src: &RgbaImage, anchor: CropAnchor) -> Result<RgbaImage, DetectError> {
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 {
        return Err(DetectError::InvalidInput(format!(
            "zero-area source image ({width}x{height})"
        )));
    }
    let side = width.min(height);
    let (x, y) = match anchor {
        CropAnchor::Center => ((width - side) / 2, (height - side) / 2),
        CropAnchor::TopLeft => (0, 0),
        CropAnchor::TopRight => (width - side, 0),
        CropAnchor::BottomLeft => (0, height - side),
        CropAnchor::BottomRight => (width - side, height - side),
    };
    crop_rect(src, x, y, side, side)
}

/// Extract an arbitrary rectangle. A rectangle reaching outside the
/// source is a caller bug and is rejected, never clamped.
pub fn crop_rect(
    src: &RgbaImage,
    x: u32,
    y: u32,
    crop_width: u32,
    crop_height: u32,
) -> Result<RgbaImage, DetectError> {
    let (width, height) = src.dimensions();
    if crop_width == 0 || crop_height == 0 {
        return Err(DetectError::InvalidInput(
            "zero-area crop rectangle".into(),
        ));
    }
    let fits_x = x.checked_add(crop_width).is_some_and(|r| r <= width);
    let fits_y = y.checked_add(crop_height).is_some_and(|b| b <= height);
    if !fits_x || !fits_y {
        return Err(DetectError::InvalidInput(format!(
            "crop rectangle {crop_width}x{crop_height}+{x}+{y} exceeds source {width}x{height}"
        )));
    }
    Ok(imageops::crop_imm(src, x, y, crop_width, crop_height).to_image())
}

/// Bilinear resample to a `size`x`size` square.
pub fn scale(src: &RgbaImage, size: u32) -> RgbaImage {
    imageops::resize(src, size, size, FilterType::Triangle)
}

/// Rotate 90 degrees about the image center.
pub fn rotate90(src: &RgbaImage) -> RgbaImage {
    rotate_about_center(src, 90.0)
}

/// Rotate by `angle_degrees` about the image center.
///
/// Inverse mapping with nearest-neighbor sampling; computed source
/// coordinates are truncated (not rounded) to integers, and destinations
/// that land outside the source stay transparent black.
pub fn rotate_about_center(src: &RgbaImage, angle_degrees: f32) -> RgbaImage {
    let (width, height) = src.dimensions();
    let mut dst = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));

    let phi = angle_degrees.to_radians();
    let (sn, cs) = phi.sin_cos();
    let xc = (width / 2) as f32;
    let yc = (height / 2) as f32;

    for j in 0..height {
        for i in 0..width {
            let fx = cs * (i as f32 - xc) + sn * (j as f32 - yc) + xc;
            let fy = -sn * (i as f32 - xc) + cs * (j as f32 - yc) + yc;
            // `as` truncates toward zero, so (-1, 0) collapses onto column 0
            let x = fx as i32;
            let y = fy as i32;
            if x >= 0 && (x as u32) < width && y >= 0 && (y as u32) < height {
                dst.put_pixel(i, j, *src.get_pixel(x as u32, y as u32));
            }
        }
    }
    dst
}

/// Full preprocessing cycle: crop, scale, rotate.
pub fn preprocess(
    src: &RgbaImage,
    input_size: u32,
    anchor: CropAnchor,
) -> Result<RgbaImage, DetectError> {
    let cropped = crop_square(src, anchor)?;
    let scaled = scale(&cropped, input_size);
    Ok(rotate90(&scaled))
}

/// Convert to the normalized NHWC float tensor the engine consumes.
/// Alpha is dropped.
pub fn to_input_tensor(img: &RgbaImage) -> Array<f32, IxDyn> {
    let (width, height) = img.dimensions();
    let mut tensor = Array::zeros(IxDyn(&[1, height as usize, width as usize, 3]));
    for (x, y, pixel) in img.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, y as usize, x as usize, c]] = (pixel.0[c] as f32 - IMAGE_MEAN) / IMAGE_STD;
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255])
        })
    }

    #[test]
    fn test_center_crop_1000x800() {
        let src = gradient(1000, 800);
        let cropped = crop_square(&src, CropAnchor::Center).unwrap();
        assert_eq!(cropped.dimensions(), (800, 800));
        // crop starts at x=100, y=0
        assert_eq!(cropped.get_pixel(0, 0), src.get_pixel(100, 0));
        assert_eq!(cropped.get_pixel(799, 799), src.get_pixel(899, 799));
    }

    #[test]
    fn test_corner_crop_anchors() {
        let src = gradient(10, 4);
        let top_right = crop_square(&src, CropAnchor::TopRight).unwrap();
        assert_eq!(top_right.get_pixel(0, 0), src.get_pixel(6, 0));
        let bottom_left = crop_square(&src, CropAnchor::BottomLeft).unwrap();
        assert_eq!(bottom_left.get_pixel(0, 0), src.get_pixel(0, 0));
    }

    #[test]
    fn test_crop_rejects_zero_area_source() {
        let empty = RgbaImage::new(0, 8);
        assert!(matches!(
            crop_square(&empty, CropAnchor::Center),
            Err(DetectError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_crop_rect_rejects_out_of_bounds() {
        let src = gradient(16, 16);
        assert!(matches!(
            crop_rect(&src, 8, 8, 16, 4),
            Err(DetectError::InvalidInput(_))
        ));
        assert!(crop_rect(&src, 8, 8, 8, 8).is_ok());
    }

    #[test]
    fn test_scale_dimensions() {
        let src = gradient(64, 64);
        assert_eq!(scale(&src, 13).dimensions(), (13, 13));
    }

    #[test]
    fn test_rotate_solid_color() {
        let red = Rgba([200u8, 10, 10, 255]);
        let src = RgbaImage::from_pixel(64, 64, red);
        let rotated = rotate90(&src);

        let mut transparent = 0usize;
        for pixel in rotated.pixels() {
            if pixel.0[3] == 0 {
                transparent += 1;
            } else {
                assert_eq!(*pixel, red);
            }
        }
        // only border pixels may fall outside the source after rotation
        assert!(transparent < 4 * 64);
        assert_eq!(*rotated.get_pixel(32, 32), red);
    }

    #[test]
    fn test_rotate_quarter_turn_moves_halves() {
        let blue = Rgba([0u8, 0, 200, 255]);
        let green = Rgba([0u8, 200, 0, 255]);
        // left half blue, right half green
        let src = RgbaImage::from_fn(64, 64, |x, _| if x < 32 { blue } else { green });
        let rotated = rotate90(&src);

        // a quarter turn maps the left half onto the top half
        assert_eq!(*rotated.get_pixel(16, 8), blue);
        assert_eq!(*rotated.get_pixel(48, 8), blue);
        assert_eq!(*rotated.get_pixel(16, 40), green);
        assert_eq!(*rotated.get_pixel(48, 40), green);
    }

    #[test]
    fn test_preprocess_output_size() {
        let src = gradient(100, 80);
        let out = preprocess(&src, 32, CropAnchor::Center).unwrap();
        assert_eq!(out.dimensions(), (32, 32));
    }

    #[test]
    fn test_to_input_tensor() {
        let mut src = RgbaImage::new(2, 1);
        src.put_pixel(0, 0, Rgba([255, 0, 51, 255]));
        src.put_pixel(1, 0, Rgba([0, 102, 0, 128]));
        let tensor = to_input_tensor(&src);
        assert_eq!(tensor.shape(), [1, 1, 2, 3]);
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 0, 0, 2]] - 0.2).abs() < 1e-6);
        assert!((tensor[[0, 0, 1, 1]] - 0.4).abs() < 1e-6);
    }
}
