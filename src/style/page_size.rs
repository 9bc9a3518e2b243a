//! Named page sizes and page geometry, in PDF points.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width and height of a page, in points.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
}

impl PageGeometry {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// Page margins, in points.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PageSize {
    A4,
    A5,
    Letter,
    Legal,
    /// 6 × 9 inch trade paperback
    UsTrade,
    Custom { width: f32, height: f32 },
}

impl PageSize {
    pub fn geometry(&self) -> PageGeometry {
        let (width, height) = match *self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::A5 => (419.53, 595.28),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::UsTrade => (432.0, 648.0),
            PageSize::Custom { width, height } => (width, height),
        };
        PageGeometry { width, height }
    }

    /// The label used in output file names and reports.
    pub fn label(&self) -> String {
        match self {
            PageSize::A4 => "A4".to_string(),
            PageSize::A5 => "A5".to_string(),
            PageSize::Letter => "LETTER".to_string(),
            PageSize::Legal => "LEGAL".to_string(),
            PageSize::UsTrade => "US_TRADE".to_string(),
            PageSize::Custom { width, height } => format!("{}x{}", width.round(), height.round()),
        }
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for PageSize {
    type Err = String;

    /// Accepts the named sizes (case-insensitive) or `WIDTHxHEIGHT` in points.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match name.as_str() {
            "A4" => return Ok(PageSize::A4),
            "A5" => return Ok(PageSize::A5),
            "LETTER" => return Ok(PageSize::Letter),
            "LEGAL" => return Ok(PageSize::Legal),
            "US_TRADE" | "TRADE" | "6X9" => return Ok(PageSize::UsTrade),
            _ => {}
        }

        let (w, h) = name
            .split_once('X')
            .ok_or_else(|| format!("Unknown page size `{s}`"))?;
        let width: f32 = w
            .trim()
            .parse()
            .map_err(|_| format!("Invalid page width in `{s}`"))?;
        let height: f32 = h
            .trim()
            .parse()
            .map_err(|_| format!("Invalid page height in `{s}`"))?;
        if width <= 0.0 || height <= 0.0 {
            return Err(format!("Page size `{s}` must be positive"));
        }
        Ok(PageSize::Custom { width, height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_parse_named_sizes() {
        assert_eq!("a4".parse::<PageSize>(), Ok(PageSize::A4));
        assert_eq!("Letter".parse::<PageSize>(), Ok(PageSize::Letter));
        assert_eq!("us-trade".parse::<PageSize>(), Ok(PageSize::UsTrade));
        assert_eq!(PageSize::UsTrade.geometry().width, 432.0);
    }

    #[test]
    fn can_parse_custom_sizes() {
        assert_eq!(
            "500x700".parse::<PageSize>(),
            Ok(PageSize::Custom {
                width: 500.0,
                height: 700.0
            })
        );
        assert!("0x700".parse::<PageSize>().is_err());
        assert!("tabloid".parse::<PageSize>().is_err());
    }

    #[test]
    fn labels_round_trip() {
        for size in [PageSize::A4, PageSize::Legal, PageSize::UsTrade] {
            assert_eq!(size.label().parse::<PageSize>(), Ok(size));
        }
    }
}
