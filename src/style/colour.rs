//! RGB colours parsed from style descriptors.

use std::fmt;
use std::str::FromStr;

/// An RGB colour with components in `0.0..=1.0`, ready to hand to a PDF content stream.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Colour {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

pub const BLACK: Colour = Colour::new_grey(0.0);
pub const WHITE: Colour = Colour::new_grey(1.0);
pub const ERROR_RED: Colour = Colour::new_rgb_bytes(0xCC, 0x00, 0x00);

impl Colour {
    pub const fn new_grey(v: f32) -> Colour {
        Colour { r: v, g: v, b: v }
    }

    pub const fn new_rgb_bytes(r: u8, g: u8, b: u8) -> Colour {
        Colour {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    /// Parses a colour, logging and returning `fallback` when the text isn't a colour.
    pub fn parse_or(text: Option<&str>, fallback: Colour) -> Colour {
        match text {
            None => fallback,
            Some(text) => text.parse().unwrap_or_else(|_| {
                log::warn!("Unrecognised colour `{text}`, using {fallback}");
                fallback
            }),
        }
    }

    fn byte(v: f32) -> u8 {
        (v.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02X}{:02X}{:02X}",
            Colour::byte(self.r),
            Colour::byte(self.g),
            Colour::byte(self.b)
        )
    }
}

impl FromStr for Colour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            let digits: Vec<u8> = hex
                .chars()
                .map(|c| c.to_digit(16).map(|d| d as u8))
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(|| format!("`{s}` contains non-hex digits"))?;
            return match digits.as_slice() {
                [r, g, b] => Ok(Colour::new_rgb_bytes(r * 17, g * 17, b * 17)),
                [r1, r2, g1, g2, b1, b2] => Ok(Colour::new_rgb_bytes(
                    r1 * 16 + r2,
                    g1 * 16 + g2,
                    b1 * 16 + b2,
                )),
                _ => Err(format!("`{s}` is not a #RGB or #RRGGBB colour")),
            };
        }

        let named = match s.to_ascii_lowercase().as_str() {
            "black" => BLACK,
            "white" => WHITE,
            "red" => Colour::new_rgb_bytes(0xFF, 0x00, 0x00),
            "darkred" => Colour::new_rgb_bytes(0x8B, 0x00, 0x00),
            "green" => Colour::new_rgb_bytes(0x00, 0x80, 0x00),
            "blue" => Colour::new_rgb_bytes(0x00, 0x00, 0xFF),
            "navy" => Colour::new_rgb_bytes(0x00, 0x00, 0x80),
            "grey" | "gray" => Colour::new_rgb_bytes(0x80, 0x80, 0x80),
            "darkgrey" | "darkgray" => Colour::new_rgb_bytes(0xA9, 0xA9, 0xA9),
            "lightgrey" | "lightgray" => Colour::new_rgb_bytes(0xD3, 0xD3, 0xD3),
            "dimgrey" | "dimgray" => Colour::new_rgb_bytes(0x69, 0x69, 0x69),
            _ => return Err(format!("`{s}` is not a known colour name")),
        };
        Ok(named)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_parse_hex_colours() {
        assert_eq!(
            "#333333".parse::<Colour>(),
            Ok(Colour::new_rgb_bytes(0x33, 0x33, 0x33))
        );
        assert_eq!(
            "#f00".parse::<Colour>(),
            Ok(Colour::new_rgb_bytes(0xFF, 0x00, 0x00))
        );
        assert!("#12345".parse::<Colour>().is_err());
        assert!("#zzzzzz".parse::<Colour>().is_err());
    }

    #[test]
    fn can_parse_named_colours() {
        assert_eq!("Black".parse::<Colour>(), Ok(BLACK));
        assert_eq!("grey".parse::<Colour>(), "gray".parse::<Colour>());
        assert!("chartreuse-ish".parse::<Colour>().is_err());
    }

    #[test]
    fn falls_back_on_bad_colours() {
        assert_eq!(Colour::parse_or(Some("nope"), WHITE), WHITE);
        assert_eq!(Colour::parse_or(None, BLACK), BLACK);
    }

    #[test]
    fn displays_as_hex() {
        assert_eq!(Colour::new_rgb_bytes(0xCC, 0, 0x10).to_string(), "#CC0010");
    }
}
