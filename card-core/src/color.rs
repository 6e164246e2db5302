//! CSS color parsing.
//!
//! Templates store colors exactly as the editor's color inputs produce them:
//! named colors, `#rgb`/`#rrggbb` hex and `rgb()`/`rgba()` functions. Both
//! paint backends consume the parsed form so an unparseable string can never
//! reach the SVG or PDF writer.

/// An sRGB color with straight (non-premultiplied) alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha in `[0, 1]`.
    pub a: f64,
}

impl Rgba {
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    /// Fully transparent.
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0.0,
    };

    /// Create an opaque color.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parse a CSS color string.
    ///
    /// Returns `None` for anything that is not a recognised color.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim().to_ascii_lowercase();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        if let Some(args) = s
            .strip_prefix("rgba(")
            .or_else(|| s.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return parse_rgb_function(args);
        }
        named(&s)
    }

    /// Parse a color, falling back when the string is empty or invalid.
    #[must_use]
    pub fn parse_or(input: &str, fallback: Self) -> Self {
        match Self::parse(input) {
            Some(color) => color,
            None => {
                if !input.trim().is_empty() {
                    tracing::warn!("Unrecognised color {input:?}, using fallback");
                }
                fallback
            }
        }
    }

    /// Whether the color paints nothing.
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }

    /// Channels as floats in `[0, 1]`.
    #[must_use]
    pub fn to_unit(self) -> (f64, f64, f64) {
        (
            f64::from(self.r) / 255.0,
            f64::from(self.g) / 255.0,
            f64::from(self.b) / 255.0,
        )
    }

    /// Format as an SVG `rgb()` paint value (alpha is emitted separately).
    #[must_use]
    pub fn to_svg_rgb(self) -> String {
        format!("rgb({},{},{})", self.r, self.g, self.b)
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 | 4 => {
            let a = if hex.len() == 4 {
                f64::from(nibble(3)?) / 255.0
            } else {
                1.0
            };
            Some(Rgba {
                r: nibble(0)?,
                g: nibble(1)?,
                b: nibble(2)?,
                a,
            })
        }
        6 | 8 => {
            let a = if hex.len() == 8 {
                f64::from(byte(6)?) / 255.0
            } else {
                1.0
            };
            Some(Rgba {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a,
            })
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_rgb_function(args: &str) -> Option<Rgba> {
    let parts: Vec<&str> = args
        .split(|c: char| c == ',' || c == '/' || c == ' ')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |p: &str| -> Option<u8> {
        let value = if let Some(pct) = p.strip_suffix('%') {
            pct.parse::<f64>().ok()? * 2.55
        } else {
            p.parse::<f64>().ok()?
        };
        Some(value.round().clamp(0.0, 255.0) as u8)
    };
    let a = match parts.get(3) {
        Some(p) => {
            let value = if let Some(pct) = p.strip_suffix('%') {
                pct.parse::<f64>().ok()? / 100.0
            } else {
                p.parse::<f64>().ok()?
            };
            value.clamp(0.0, 1.0)
        }
        None => 1.0,
    };
    Some(Rgba {
        r: channel(parts[0])?,
        g: channel(parts[1])?,
        b: channel(parts[2])?,
        a,
    })
}

fn named(name: &str) -> Option<Rgba> {
    let (r, g, b) = match name {
        "transparent" | "none" => return Some(Rgba::TRANSPARENT),
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "lime" => (0, 255, 0),
        "blue" => (0, 0, 255),
        "yellow" => (255, 255, 0),
        "cyan" | "aqua" => (0, 255, 255),
        "magenta" | "fuchsia" => (255, 0, 255),
        "gray" | "grey" => (128, 128, 128),
        "silver" => (192, 192, 192),
        "lightgray" | "lightgrey" => (211, 211, 211),
        "darkgray" | "darkgrey" => (169, 169, 169),
        "maroon" => (128, 0, 0),
        "olive" => (128, 128, 0),
        "navy" => (0, 0, 128),
        "purple" => (128, 0, 128),
        "teal" => (0, 128, 128),
        "orange" => (255, 165, 0),
        "pink" => (255, 192, 203),
        "brown" => (165, 42, 42),
        "gold" => (255, 215, 0),
        "indigo" => (75, 0, 130),
        "violet" => (238, 130, 238),
        "crimson" => (220, 20, 60),
        "coral" => (255, 127, 80),
        "salmon" => (250, 128, 114),
        "beige" => (245, 245, 220),
        "ivory" => (255, 255, 240),
        "khaki" => (240, 230, 140),
        "skyblue" => (135, 206, 235),
        "lightblue" => (173, 216, 230),
        "darkblue" => (0, 0, 139),
        "darkgreen" => (0, 100, 0),
        "darkred" => (139, 0, 0),
        "royalblue" => (65, 105, 225),
        "steelblue" => (70, 130, 180),
        "whitesmoke" => (245, 245, 245),
        _ => return None,
    };
    Some(Rgba::rgb(r, g, b))
}
