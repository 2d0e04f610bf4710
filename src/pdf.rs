// 📄 Single-page PDF writer
// Just enough of PDF 1.4 for text and filled/stroked rectangles with the
// two standard Helvetica faces. No embedded fonts, no compression.

use std::fmt::Write as _;

pub const LETTER_WIDTH: f32 = 612.0;
pub const LETTER_HEIGHT: f32 = 792.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Helvetica,
    HelveticaBold,
}

impl Font {
    fn resource(&self) -> &'static str {
        match self {
            Font::Helvetica => "F1",
            Font::HelveticaBold => "F2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);
pub const GREY: Rgb = Rgb(0.5, 0.5, 0.5);
pub const WHITESMOKE: Rgb = Rgb(0.96, 0.96, 0.96);
pub const BEIGE: Rgb = Rgb(0.96, 0.96, 0.86);

/// Rough Helvetica advance width; good enough to center short labels
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars()
        .map(|c| match c {
            'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '!' | '|' => 0.28,
            ' ' | 'f' | 't' | 'r' | 'I' | '-' | '(' | ')' => 0.33,
            'm' | 'w' | 'M' | 'W' => 0.85,
            'A'..='Z' | '0'..='9' => 0.64,
            _ => 0.54,
        })
        .sum::<f32>()
        * size
}

/// Shorten `text` with a trailing "..." until it fits in `max_width`
pub fn fit_text(text: &str, size: f32, max_width: f32) -> String {
    if text_width(text, size) <= max_width {
        return text.to_string();
    }
    let mut chars: Vec<char> = text.chars().collect();
    while !chars.is_empty() {
        chars.pop();
        let candidate = format!("{}...", chars.iter().collect::<String>().trim_end());
        if text_width(&candidate, size) <= max_width {
            return candidate;
        }
    }
    "...".to_string()
}

/// Escape a string for a PDF literal. Latin-1 goes out as octal (WinAnsi
/// agrees with Latin-1 there); anything else becomes '?'.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            '\u{a0}'..='\u{ff}' => {
                let _ = write!(out, "\\{:03o}", c as u32);
            }
            _ => out.push('?'),
        }
    }
    out
}

/// Drawing operations for one page, in PDF user space (origin bottom-left)
#[derive(Debug, Default)]
pub struct PdfPage {
    ops: String,
}

impl PdfPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, x: f32, y: f32, font: Font, size: f32, color: Rgb, text: &str) {
        let _ = writeln!(
            self.ops,
            "BT {:.3} {:.3} {:.3} rg /{} {:.1} Tf {:.2} {:.2} Td ({}) Tj ET",
            color.0,
            color.1,
            color.2,
            font.resource(),
            size,
            x,
            y,
            escape_text(text)
        );
    }

    pub fn text_centered(&mut self, center_x: f32, y: f32, font: Font, size: f32, color: Rgb, text: &str) {
        let x = center_x - text_width(text, size) / 2.0;
        self.text(x, y, font, size, color, text);
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb) {
        let _ = writeln!(
            self.ops,
            "{:.3} {:.3} {:.3} rg {:.2} {:.2} {:.2} {:.2} re f",
            color.0, color.1, color.2, x, y, w, h
        );
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, line_width: f32, color: Rgb) {
        let _ = writeln!(
            self.ops,
            "{:.3} {:.3} {:.3} RG {:.2} w {:.2} {:.2} {:.2} {:.2} re S",
            color.0, color.1, color.2, line_width, x, y, w, h
        );
    }

    /// Serialize as a complete one-page letter-size document
    pub fn finish(self) -> Vec<u8> {
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 4 0 R /F2 5 0 R >> >> /Contents 6 0 R >>",
                LETTER_WIDTH, LETTER_HEIGHT
            ),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string(),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>".to_string(),
            format!(
                "<< /Length {} >>\nstream\n{}endstream",
                self.ops.len(),
                self.ops
            ),
        ];

        let mut out: Vec<u8> = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");

        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }

        let xref_offset = out.len();
        let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in &offsets {
            let _ = write!(xref, "{:010} 00000 n \n", offset);
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        );
        out.extend_from_slice(xref.as_bytes());
        out
    }
}
