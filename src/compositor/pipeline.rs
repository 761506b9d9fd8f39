//! # 解码与变换流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → 缩放 → 贴图 → PNG”集中管理，全部为纯函数，不修改入参。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 猜测格式并读取 header 尺寸，按像素上限快速拒绝
//! 2. 完整解码并转换为 RGBA（前景）/ RGB（背景）
//! 3. fast_image_resize 卷积缩放（失败时回退 `image::imageops::resize`）
//! 4. 复制背景后按前景 alpha 逐像素混合
//! 5. 编码 PNG

use fast_image_resize as fr;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

use super::ComposeError;

/// 解码为 RGBA；源格式无 alpha 时视为完全不透明。
pub fn decode_rgba(bytes: &[u8], max_pixels: u64) -> Result<RgbaImage, ComposeError> {
    Ok(decode_checked(bytes, max_pixels)?.to_rgba8())
}

/// 解码为 RGB，丢弃 alpha。
pub fn decode_rgb(bytes: &[u8], max_pixels: u64) -> Result<RgbImage, ComposeError> {
    Ok(decode_checked(bytes, max_pixels)?.to_rgb8())
}

fn decode_checked(bytes: &[u8], max_pixels: u64) -> Result<DynamicImage, ComposeError> {
    let (width, height) = inspect_dimensions_from_memory(bytes)?;
    validate_pixel_limits(width, height, max_pixels)?;

    image::load_from_memory(bytes).map_err(|e| ComposeError::EncodingError(format!("图片解码失败：{}", e)))
}

/// 仅通过内存中的图片头信息读取宽高。
fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), ComposeError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ComposeError::EncodingError(format!("无法识别图片格式：{}", e)))?
        .into_dimensions()
        .map_err(|e| ComposeError::EncodingError(format!("无法读取图片尺寸：{}", e)))
}

fn validate_pixel_limits(width: u32, height: u32, max_pixels: u64) -> Result<(), ComposeError> {
    let pixels = width as u64 * height as u64;
    if pixels > max_pixels {
        return Err(ComposeError::EncodingError(format!(
            "图片像素过大：{}x{}（限制：{} 像素）",
            width, height, max_pixels
        )));
    }
    Ok(())
}

/// 精确缩放到 `width × height`。
pub fn resize_exact(image: &RgbaImage, width: u32, height: u32, filter: FilterType) -> RgbaImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }

    match resize_with_fast_image_resize(image, width, height, filter) {
        Ok(resized) => resized,
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 缩放失败，回退 image::imageops::resize：{}", err);
            image::imageops::resize(image, width, height, filter)
        }
    }
}

fn resize_with_fast_image_resize(
    image: &RgbaImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<RgbaImage, ComposeError> {
    let (src_width, src_height) = image.dimensions();
    let src_image = fr::images::Image::from_vec_u8(src_width, src_height, image.as_raw().clone(), fr::PixelType::U8x4)
        .map_err(|e| ComposeError::EncodingError(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(filter)));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ComposeError::EncodingError(format!("fast_image_resize 执行失败：{}", e)))?;

    ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| ComposeError::EncodingError("fast_image_resize 输出缓冲长度异常".to_string()))
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}

/// 在背景副本的 `origin` 处按前景 alpha 混合，返回新图。
///
/// 越出背景边界的前景像素被裁掉；框外像素保持原样。
pub fn alpha_paste(background: &RgbImage, foreground: &RgbaImage, origin: (u32, u32)) -> RgbImage {
    let mut out = background.clone();
    let (bg_width, bg_height) = background.dimensions();
    let (x0, y0) = origin;

    for (fx, fy, fg) in foreground.enumerate_pixels() {
        let (Some(x), Some(y)) = (x0.checked_add(fx), y0.checked_add(fy)) else {
            continue;
        };
        if x >= bg_width || y >= bg_height {
            continue;
        }

        let alpha = fg[3] as u32;
        if alpha == 0 {
            continue;
        }

        let bg = out.get_pixel_mut(x, y);
        *bg = Rgb(std::array::from_fn(|c| blend_channel(fg[c], bg[c], alpha)));
    }

    out
}

#[inline]
fn blend_channel(fg: u8, bg: u8, alpha: u32) -> u8 {
    ((fg as u32 * alpha + bg as u32 * (255 - alpha) + 127) / 255) as u8
}

/// 重绘遮罩：黑底，放置框内（含边界）填白。
pub fn make_mask(size: (u32, u32), placement: super::PlacementBox) -> GrayImage {
    let (width, height) = size;
    let mut mask = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return mask;
    }

    let x_end = placement.x2.min(width - 1);
    let y_end = placement.y2.min(height - 1);
    for y in placement.y1..=y_end {
        for x in placement.x1..=x_end {
            mask.put_pixel(x, y, Luma([255]));
        }
    }

    mask
}

/// 编码为 PNG 字节。
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ComposeError> {
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| ComposeError::EncodingError(format!("PNG 编码失败：{}", e)))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::PlacementBox;
    use proptest::prelude::*;

    fn gradient_background(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| Rgb([(x % 251) as u8, (y % 241) as u8, ((x + y) % 239) as u8]))
    }

    #[test]
    fn opaque_foreground_replaces_pixels_inside_box_only() {
        let bg = gradient_background(40, 30);
        let fg = RgbaImage::from_pixel(10, 5, Rgba([255, 0, 0, 255]));

        let out = alpha_paste(&bg, &fg, (12, 7));

        assert_eq!(out.dimensions(), bg.dimensions());
        for (x, y, px) in out.enumerate_pixels() {
            let inside = (12..22).contains(&x) && (7..12).contains(&y);
            if inside {
                assert_eq!(*px, Rgb([255, 0, 0]));
            } else {
                assert_eq!(px, bg.get_pixel(x, y), "pixel ({x},{y}) outside box changed");
            }
        }
    }

    #[test]
    fn transparent_foreground_leaves_background_untouched() {
        let bg = gradient_background(16, 16);
        let fg = RgbaImage::from_pixel(8, 8, Rgba([0, 255, 0, 0]));

        assert_eq!(alpha_paste(&bg, &fg, (4, 4)), bg);
    }

    #[test]
    fn half_alpha_blends_evenly() {
        let bg = RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]));
        let fg = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 255, 128]));

        let out = alpha_paste(&bg, &fg, (1, 1));

        assert_eq!(*out.get_pixel(1, 1), Rgb([100, 50, 128]));
        assert_eq!(*out.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn foreground_overflowing_background_is_clipped() {
        let bg = gradient_background(10, 10);
        let fg = RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255]));

        let out = alpha_paste(&bg, &fg, (6, 6));

        assert_eq!(out.dimensions(), (10, 10));
        assert_eq!(*out.get_pixel(9, 9), Rgb([1, 2, 3]));
        assert_eq!(out.get_pixel(5, 5), bg.get_pixel(5, 5));
    }

    #[test]
    fn resize_hits_exact_target_dimensions() {
        let src = RgbaImage::from_pixel(100, 100, Rgba([255, 0, 0, 255]));

        let resized = resize_exact(&src, 340, 400, FilterType::Lanczos3);

        assert_eq!(resized.dimensions(), (340, 400));
        for px in resized.pixels() {
            assert_eq!(*px, Rgba([255, 0, 0, 255]));
        }
    }

    #[test]
    fn resize_to_one_pixel_does_not_panic() {
        let src = RgbaImage::from_pixel(7, 3, Rgba([9, 9, 9, 255]));
        assert_eq!(resize_exact(&src, 1, 1, FilterType::Lanczos3).dimensions(), (1, 1));
    }

    #[test]
    fn decode_without_alpha_is_opaque() {
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 3, Rgb([5, 6, 7])));
        let png = encode_png(&rgb).expect("encode");

        let rgba = decode_rgba(&png, u64::MAX).expect("decode");

        assert!(rgba.pixels().all(|p| *p == Rgba([5, 6, 7, 255])));
    }

    #[test]
    fn decode_rejects_too_many_pixels_before_full_decode() {
        let png = encode_png(&DynamicImage::ImageRgb8(RgbImage::new(100, 100))).expect("encode");
        assert!(matches!(decode_rgb(&png, 9_999), Err(ComposeError::EncodingError(_))));
    }

    #[test]
    fn png_round_trip_is_lossless() {
        let bg = DynamicImage::ImageRgb8(gradient_background(33, 17));
        let png = encode_png(&bg).expect("encode");
        let decoded = decode_rgb(&png, u64::MAX).expect("decode");

        assert_eq!(decoded, bg.to_rgb8());
        assert_eq!(encode_png(&DynamicImage::ImageRgb8(decoded)).expect("re-encode"), png);
    }

    #[test]
    fn mask_is_white_inside_box_inclusive() {
        let mask = make_mask((20, 20), PlacementBox::new(5, 6, 10, 12));

        assert_eq!(mask.get_pixel(5, 6)[0], 255);
        assert_eq!(mask.get_pixel(10, 12)[0], 255);
        assert_eq!(mask.get_pixel(4, 6)[0], 0);
        assert_eq!(mask.get_pixel(11, 12)[0], 0);
        assert_eq!(mask.get_pixel(5, 13)[0], 0);
        assert_eq!(mask.pixels().filter(|p| p[0] == 255).count(), 6 * 7);
    }

    #[test]
    fn mask_box_outside_canvas_stays_black() {
        let mask = make_mask((10, 10), PlacementBox::new(20, 20, 30, 30));
        assert!(mask.pixels().all(|p| p[0] == 0));
    }

    proptest! {
        #[test]
        fn paste_never_touches_pixels_outside_box(
            bg_w in 1u32..48,
            bg_h in 1u32..48,
            fg_w in 1u32..24,
            fg_h in 1u32..24,
            x0 in 0u32..60,
            y0 in 0u32..60,
            alpha in 0u8..=255,
        ) {
            let bg = gradient_background(bg_w, bg_h);
            let fg = RgbaImage::from_pixel(fg_w, fg_h, Rgba([250, 10, 90, alpha]));

            let out = alpha_paste(&bg, &fg, (x0, y0));

            prop_assert_eq!(out.dimensions(), (bg_w, bg_h));
            for (x, y, px) in out.enumerate_pixels() {
                let inside = x >= x0 && x < x0 + fg_w && y >= y0 && y < y0 + fg_h;
                if !inside {
                    prop_assert_eq!(px, bg.get_pixel(x, y));
                }
            }
        }
    }
}
