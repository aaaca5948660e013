//! Optional pure string transforms applied to a backend's Markdown output
//! (spec.md §4.2). Enabled per-deployment by `OCR_POST_PROCESS`.

use base64::Engine;
use std::sync::LazyLock;

static CURRENCY_ESCAPE_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\\\(\s*(\d[\d,.]*)\s*\\?\)?").unwrap());

static PLACEHOLDER_IMAGE_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"!\[[^\]]*\]\(crop:(\d+),(\d+),(\d+),(\d+)\.png\)").unwrap());

/// Rewrites escaped currency sequences like `\(1,234.56\)` into `$1,234.56`.
/// Some hosted models escape leading parentheses/digits when a dollar sign
/// would otherwise be interpreted as a LaTeX math delimiter.
pub fn rewrite_escaped_currency(markdown: &str) -> String {
    CURRENCY_ESCAPE_RE
        .replace_all(markdown, |caps: &regex::Captures| format!("${}", &caps[1]))
        .into_owned()
}

/// Replaces `![alt](crop:x,y,w,h.png)` placeholder tags with a base64 data
/// URI cropped out of the original page PNG. `source_png` is the page's
/// original `image_data`; coordinates are pixels in that image's space.
pub fn inline_cropped_images(markdown: &str, source_png: &[u8]) -> String {
    let source = match image::load_from_memory(source_png) {
        Ok(img) => img,
        Err(_) => return markdown.to_string(),
    };

    let mut result = String::with_capacity(markdown.len());
    let mut last_end = 0;

    for caps in PLACEHOLDER_IMAGE_RE.captures_iter(markdown) {
        let whole = caps.get(0).unwrap();
        result.push_str(&markdown[last_end..whole.start()]);

        let (x, y, w, h) = match (
            caps[1].parse::<u32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<u32>(),
            caps[4].parse::<u32>(),
        ) {
            (Ok(x), Ok(y), Ok(w), Ok(h)) => (x, y, w, h),
            _ => {
                result.push_str(whole.as_str());
                last_end = whole.end();
                continue;
            }
        };

        match crop_to_data_uri(&source, x, y, w, h) {
            Some(data_uri) => result.push_str(&format!("![]({data_uri})")),
            None => result.push_str(whole.as_str()),
        }

        last_end = whole.end();
    }
    result.push_str(&markdown[last_end..]);
    result
}

fn crop_to_data_uri(source: &image::DynamicImage, x: u32, y: u32, w: u32, h: u32) -> Option<String> {
    if x.checked_add(w)? > source.width() || y.checked_add(h)? > source.height() || w == 0 || h == 0 {
        return None;
    }
    let cropped = source.crop_imm(x, y, w, h);
    let mut buf = std::io::Cursor::new(Vec::new());
    cropped.write_to(&mut buf, image::ImageFormat::Png).ok()?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(buf.into_inner());
    Some(format!("data:image/png;base64,{encoded}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_escaped_currency() {
        let input = r"Total due: \(1,234.56\) by Friday.";
        assert_eq!(
            rewrite_escaped_currency(input),
            "Total due: $1,234.56 by Friday."
        );
    }

    #[test]
    fn leaves_markdown_without_escapes_untouched() {
        let input = "Total due: $1,234.56 by Friday.";
        assert_eq!(rewrite_escaped_currency(input), input);
    }

    #[test]
    fn inlines_a_cropped_placeholder_image() {
        let mut img = image::RgbImage::new(10, 10);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([255, 0, 0]);
        }
        let mut png_bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut png_bytes, image::ImageFormat::Png)
            .unwrap();

        let markdown = "See figure: ![fig](crop:0,0,5,5.png) above.";
        let result = inline_cropped_images(markdown, &png_bytes.into_inner());
        assert!(result.contains("data:image/png;base64,"));
        assert!(!result.contains("crop:0,0,5,5.png"));
    }

    #[test]
    fn leaves_out_of_bounds_crops_as_is() {
        let mut img = image::RgbImage::new(4, 4);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([0, 0, 0]);
        }
        let mut png_bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut png_bytes, image::ImageFormat::Png)
            .unwrap();

        let markdown = "![fig](crop:0,0,100,100.png)";
        let result = inline_cropped_images(markdown, &png_bytes.into_inner());
        assert_eq!(result, markdown);
    }
}
