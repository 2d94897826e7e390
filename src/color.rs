use std::str::FromStr;

use image::Rgba;
use palette::{Srgb, Srgba};

/// Fill used by a canvas before any valid colour was set.
pub const DEFAULT_FILL: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Parses a CSS colour: a keyword (`white`, `transparent`), hex notation
/// (`#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`) or `rgb()` / `rgba()`.
pub fn parse_css_color(input: &str) -> Option<Rgba<u8>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();

    if lower == "transparent" {
        return Some(Rgba([0, 0, 0, 0]));
    }
    if let Some(args) = function_args(&lower, "rgba").or_else(|| function_args(&lower, "rgb")) {
        return parse_rgb_function(args);
    }
    if lower.starts_with('#') {
        return parse_hex(&lower);
    }
    let named: Srgb<u8> = palette::named::from_str(&lower)?;
    Some(Rgba([named.red, named.green, named.blue, 255]))
}

fn function_args<'a>(input: &'a str, name: &str) -> Option<&'a str> {
    input
        .strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn parse_hex(input: &str) -> Option<Rgba<u8>> {
    let digits = input.len() - 1;
    if digits == 4 || digits == 8 {
        let rgba = Srgba::<u8>::from_str(input).ok()?;
        return Some(Rgba([rgba.red, rgba.green, rgba.blue, rgba.alpha]));
    }
    let rgb = Srgb::<u8>::from_str(input).ok()?;
    Some(Rgba([rgb.red, rgb.green, rgb.blue, 255]))
}

fn parse_rgb_function(args: &str) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = args
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |raw: &str| -> Option<u8> {
        let value = match raw.strip_suffix('%') {
            Some(pct) => pct.parse::<f32>().ok()? / 100.0 * 255.0,
            None => raw.parse::<f32>().ok()?,
        };
        Some(value.round().clamp(0.0, 255.0) as u8)
    };
    let alpha = match parts.get(3) {
        Some(raw) => {
            let value = match raw.strip_suffix('%') {
                Some(pct) => pct.parse::<f32>().ok()? / 100.0,
                None => raw.parse::<f32>().ok()?,
            };
            (value.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        None => 255,
    };
    Some(Rgba([
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keywords() {
        assert_eq!(parse_css_color("white"), Some(Rgba([255, 255, 255, 255])));
        assert_eq!(parse_css_color("Black"), Some(Rgba([0, 0, 0, 255])));
        assert_eq!(parse_css_color("transparent"), Some(Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn parses_hex_forms() {
        assert_eq!(parse_css_color("#f00"), Some(Rgba([255, 0, 0, 255])));
        assert_eq!(parse_css_color("#00ff00"), Some(Rgba([0, 255, 0, 255])));
        assert_eq!(parse_css_color("#0000ff80"), Some(Rgba([0, 0, 255, 128])));
    }

    #[test]
    fn parses_rgb_functions() {
        assert_eq!(
            parse_css_color("rgba(0, 0, 0, 0.8)"),
            Some(Rgba([0, 0, 0, 204]))
        );
        assert_eq!(
            parse_css_color("rgb(10 20 30)"),
            Some(Rgba([10, 20, 30, 255]))
        );
        assert_eq!(
            parse_css_color("rgb(100%, 0%, 50%)"),
            Some(Rgba([255, 0, 128, 255]))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_css_color(""), None);
        assert_eq!(parse_css_color("not-a-colour"), None);
        assert_eq!(parse_css_color("rgb(1, 2)"), None);
        assert_eq!(parse_css_color("#12"), None);
    }
}
