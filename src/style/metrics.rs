//! Glyph metrics for the built-in PDF fonts, and the WinAnsi encoding used for all text.
//!
//! Widths are in thousandths of an em, as in the Adobe AFM files. Helvetica and Times
//! regular/bold are taken from the AFMs for printable ASCII; the oblique and italic
//! variants reuse the upright widths, and everything above ASCII uses a typical width.
//! That is close enough for line breaking, which is all these numbers are used for.

/// Characters 0x80..=0x9F in WinAnsiEncoding, which differ from Latin-1.
const WIN_ANSI_HIGH: [(u8, char); 27] = [
    (0x80, '€'),
    (0x82, '‚'),
    (0x83, 'ƒ'),
    (0x84, '„'),
    (0x85, '…'),
    (0x86, '†'),
    (0x87, '‡'),
    (0x88, 'ˆ'),
    (0x89, '‰'),
    (0x8A, 'Š'),
    (0x8B, '‹'),
    (0x8C, 'Œ'),
    (0x8E, 'Ž'),
    (0x91, '‘'),
    (0x92, '’'),
    (0x93, '“'),
    (0x94, '”'),
    (0x95, '•'),
    (0x96, '–'),
    (0x97, '—'),
    (0x98, '˜'),
    (0x99, '™'),
    (0x9A, 'š'),
    (0x9B, '›'),
    (0x9C, 'œ'),
    (0x9E, 'ž'),
    (0x9F, 'Ÿ'),
];

/// Maps a character to its WinAnsiEncoding code, if it has one.
pub fn win_ansi_encode(ch: char) -> Option<u8> {
    match ch as u32 {
        0x20..=0x7E | 0xA0..=0xFF => Some(ch as u32 as u8),
        _ => WIN_ANSI_HIGH
            .iter()
            .find(|(_, c)| *c == ch)
            .map(|(code, _)| *code),
    }
}

/// Maps a WinAnsiEncoding code back to the character it draws.
pub fn win_ansi_decode(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(code as char),
        _ => WIN_ANSI_HIGH
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, ch)| *ch),
    }
}

/// Encodes text for a simple font, replacing anything unencodable with `?`.
pub fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\t' | '\n' | '\r' => b' ',
            _ => win_ansi_encode(ch).unwrap_or(b'?'),
        })
        .collect()
}

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
const TIMES_BOLD: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinFamily {
    Helvetica,
    Times,
    Courier,
}

impl BuiltinFamily {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinFamily::Helvetica => "Helvetica",
            BuiltinFamily::Times => "Times",
            BuiltinFamily::Courier => "Courier",
        }
    }

    pub fn all() -> &'static [BuiltinFamily] {
        &[
            BuiltinFamily::Helvetica,
            BuiltinFamily::Times,
            BuiltinFamily::Courier,
        ]
    }
}

/// One of the twelve standard-14 text faces every PDF reader provides.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BuiltinFace {
    pub family: BuiltinFamily,
    pub bold: bool,
    pub italic: bool,
}

impl BuiltinFace {
    /// Recognises standard PDF font names such as `Times-BoldItalic` or `Helvetica-Oblique`,
    /// plus a couple of common aliases.
    pub fn parse(name: &str) -> Option<BuiltinFace> {
        let (family, variant) = match name.split_once('-') {
            Some((family, variant)) => (family, variant),
            None => (name, ""),
        };
        let family = match family.trim().to_ascii_lowercase().as_str() {
            "helvetica" | "arial" | "sans" => BuiltinFamily::Helvetica,
            "times" | "times new roman" | "serif" => BuiltinFamily::Times,
            "courier" | "courier new" | "monospace" => BuiltinFamily::Courier,
            _ => return None,
        };
        let (bold, italic) = match variant.to_ascii_lowercase().as_str() {
            "" | "roman" | "regular" => (false, false),
            "bold" => (true, false),
            "italic" | "oblique" => (false, true),
            "bolditalic" | "boldoblique" => (true, true),
            _ => return None,
        };
        Some(BuiltinFace {
            family,
            bold,
            italic,
        })
    }

    /// The `BaseFont` name written into the PDF.
    pub fn base_font(&self) -> &'static str {
        use BuiltinFamily::*;
        match (self.family, self.bold, self.italic) {
            (Helvetica, false, false) => "Helvetica",
            (Helvetica, true, false) => "Helvetica-Bold",
            (Helvetica, false, true) => "Helvetica-Oblique",
            (Helvetica, true, true) => "Helvetica-BoldOblique",
            (Times, false, false) => "Times-Roman",
            (Times, true, false) => "Times-Bold",
            (Times, false, true) => "Times-Italic",
            (Times, true, true) => "Times-BoldItalic",
            (Courier, false, false) => "Courier",
            (Courier, true, false) => "Courier-Bold",
            (Courier, false, true) => "Courier-Oblique",
            (Courier, true, true) => "Courier-BoldOblique",
        }
    }

    /// Advance width of a WinAnsi code, in thousandths of an em.
    pub fn width(&self, code: u8) -> u16 {
        let table = match (self.family, self.bold) {
            (BuiltinFamily::Courier, _) => return 600,
            (BuiltinFamily::Helvetica, false) => &HELVETICA,
            (BuiltinFamily::Helvetica, true) => &HELVETICA_BOLD,
            (BuiltinFamily::Times, false) => &TIMES,
            (BuiltinFamily::Times, true) => &TIMES_BOLD,
        };
        match code {
            0x20..=0x7E => table[(code - 0x20) as usize],
            0xA0 => table[0],
            0x85 | 0x97 | 0x89 | 0x99 => 1000,
            0x91 | 0x92 | 0x82 => table[(b'\'' - 0x20) as usize].max(222),
            0x95 => 350,
            0x96 => table[(b'0' - 0x20) as usize],
            _ => table[(b'o' - 0x20) as usize],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_encode_win_ansi() {
        assert_eq!(encode_text("Café — “ok”"), b"Caf\xe9 \x97 \x93ok\x94".to_vec());
        assert_eq!(encode_text("π"), b"?".to_vec());
        for code in 0x20..=0xFFu8 {
            if let Some(ch) = win_ansi_decode(code) {
                assert_eq!(win_ansi_encode(ch), Some(code));
            }
        }
    }

    #[test]
    fn can_parse_standard_font_names() {
        let face = BuiltinFace::parse("Times-BoldItalic").expect("is a standard font");
        assert_eq!(face.family, BuiltinFamily::Times);
        assert!(face.bold && face.italic);
        assert_eq!(face.base_font(), "Times-BoldItalic");

        let face = BuiltinFace::parse("Helvetica-Oblique").expect("is a standard font");
        assert_eq!(face.base_font(), "Helvetica-Oblique");

        assert_eq!(BuiltinFace::parse("Times-Roman").map(|f| f.bold), Some(false));
        assert!(BuiltinFace::parse("Garamond").is_none());
        assert!(BuiltinFace::parse("Helvetica-Condensed").is_none());
    }

    #[test]
    fn courier_is_monospaced() {
        let face = BuiltinFace::parse("Courier").expect("is a standard font");
        assert_eq!(face.width(b'i'), face.width(b'M'));
    }
}
