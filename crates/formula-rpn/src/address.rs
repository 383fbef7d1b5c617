//! Cell coordinates and A1/R1C1 reference helpers.
//!
//! Rows and columns are **0-indexed** (`row = 0` is Excel row `1`, `col = 0` is column `A`).

use std::fmt::Write;

use serde::{Deserialize, Serialize};

/// BIFF8 sheet limits: 65,536 rows by 256 columns.
pub const BIFF8_MAX_ROW: u32 = 0xFFFF;
pub const BIFF8_MAX_COL: u32 = 0xFF;

/// A concrete cell position, used for the relative-addressing anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    pub fn to_a1(self) -> String {
        let mut out = String::new();
        push_column_label(self.col, &mut out);
        let _ = write!(&mut out, "{}", self.row + 1);
        out
    }
}

/// A cell address as carried by reference ptgs.
///
/// For plain references `row`/`col` are sheet coordinates. For offset-form references (relative
/// addressing mode) each relative axis holds the signed distance from the anchor cell, while
/// absolute axes keep the raw coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellAddr {
    pub row: i32,
    pub col: i32,
    pub row_abs: bool,
    pub col_abs: bool,
}

impl CellAddr {
    pub const fn new(row: i32, col: i32, row_abs: bool, col_abs: bool) -> Self {
        Self {
            row,
            col,
            row_abs,
            col_abs,
        }
    }

    /// A fully relative address (`A1` style, no `$`).
    pub const fn relative(row: i32, col: i32) -> Self {
        Self::new(row, col, false, false)
    }

    /// A fully absolute address (`$A$1` style).
    pub const fn absolute(row: i32, col: i32) -> Self {
        Self::new(row, col, true, true)
    }

    /// Re-express this address as an offset from `anchor`.
    ///
    /// Absolute axes are kept as-is; relative axes become `coordinate - anchor`.
    pub fn offset_from(self, anchor: CellCoord) -> Self {
        let row = if self.row_abs {
            self.row
        } else {
            self.row - anchor.row as i32
        };
        let col = if self.col_abs {
            self.col
        } else {
            self.col - anchor.col as i32
        };
        Self { row, col, ..self }
    }

    /// Mark both axes absolute, keeping the coordinates.
    pub fn into_absolute(self) -> Self {
        Self {
            row_abs: true,
            col_abs: true,
            ..self
        }
    }

    /// Render as A1 text (`$B$2`). Negative offsets render as `R[-1]C[-1]`-style R1C1 text.
    pub fn to_a1(self) -> String {
        let mut out = String::new();
        if self.row < 0 || self.col < 0 {
            let _ = write!(&mut out, "R[{}]C[{}]", self.row, self.col);
            return out;
        }
        if self.col_abs {
            out.push('$');
        }
        push_column_label(self.col as u32, &mut out);
        if self.row_abs {
            out.push('$');
        }
        let _ = write!(&mut out, "{}", self.row + 1);
        out
    }
}

/// Convert a 0-based column index to an Excel column label and append it to `out`.
pub fn push_column_label(mut col: u32, out: &mut String) {
    // Excel column labels are 1-based.
    col += 1;
    let mut buf = [0u8; 10];
    let mut i = 0usize;
    while col > 0 {
        let rem = ((col - 1) % 26) as u8;
        buf[i] = b'A' + rem;
        i += 1;
        col = (col - 1) / 26;
    }
    for ch in buf[..i].iter().rev() {
        out.push(*ch as char);
    }
}

/// Convert an Excel column label (`A`, `iv`) into a 0-based index.
pub fn column_label_to_index(label: &str) -> Option<u32> {
    if label.is_empty() || label.len() > 3 {
        return None;
    }
    let mut col: u32 = 0;
    for b in label.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + u32::from(b.to_ascii_uppercase() - b'A' + 1);
    }
    Some(col - 1)
}

/// Parse an A1-style cell reference with optional `$` markers (`B2`, `$B2`, `B$2`, `$B$2`).
///
/// Returns `None` when the text is not a complete reference or lies outside the BIFF8 grid.
pub fn parse_a1(text: &str) -> Option<CellAddr> {
    let bytes = text.as_bytes();
    let mut idx = 0usize;

    let col_abs = bytes.get(idx) == Some(&b'$');
    if col_abs {
        idx += 1;
    }
    let col_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
        idx += 1;
    }
    let col = column_label_to_index(&text[col_start..idx])?;

    let row_abs = bytes.get(idx) == Some(&b'$');
    if row_abs {
        idx += 1;
    }
    let row_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == row_start || idx != bytes.len() {
        return None;
    }
    let row_1_based: u32 = text[row_start..idx].parse().ok()?;
    if row_1_based == 0 || row_1_based - 1 > BIFF8_MAX_ROW || col > BIFF8_MAX_COL {
        return None;
    }

    Some(CellAddr::new(
        (row_1_based - 1) as i32,
        col as i32,
        row_abs,
        col_abs,
    ))
}

/// Parse an R1C1-style reference (`R2C3`, `R[1]C[-1]`, `RC[2]`, `R[-1]C`), resolving relative
/// parts against `anchor`.
///
/// The result carries sheet coordinates; bracketed or omitted parts are relative axes.
pub fn parse_r1c1(text: &str, anchor: CellCoord) -> Option<CellAddr> {
    let rest = text.strip_prefix(['R', 'r'])?;
    let (row, row_abs, rest) = parse_r1c1_part(rest, anchor.row)?;
    let rest = rest.strip_prefix(['C', 'c'])?;
    let (col, col_abs, rest) = parse_r1c1_part(rest, anchor.col)?;
    if !rest.is_empty() {
        return None;
    }
    if row < 0 || col < 0 || row as u32 > BIFF8_MAX_ROW || col as u32 > BIFF8_MAX_COL {
        return None;
    }
    Some(CellAddr::new(row, col, row_abs, col_abs))
}

fn parse_r1c1_part(text: &str, anchor: u32) -> Option<(i32, bool, &str)> {
    if let Some(inner) = text.strip_prefix('[') {
        let end = inner.find(']')?;
        let delta: i32 = inner[..end].parse().ok()?;
        return Some((anchor as i32 + delta, false, &inner[end + 1..]));
    }

    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return Some((anchor as i32, false, text));
    }
    let one_based: i32 = text[..digits].parse().ok()?;
    if one_based == 0 {
        return None;
    }
    Some((one_based - 1, true, &text[digits..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a1_with_absolute_markers() {
        assert_eq!(parse_a1("A1"), Some(CellAddr::relative(0, 0)));
        assert_eq!(parse_a1("$B$2"), Some(CellAddr::absolute(1, 1)));
        assert_eq!(parse_a1("c$10"), Some(CellAddr::new(9, 2, true, false)));
        assert_eq!(parse_a1("IV65536"), Some(CellAddr::relative(65535, 255)));
    }

    #[test]
    fn rejects_non_references() {
        for text in ["", "A", "1", "A0", "IW1", "A65537", "A1B", "$$A1", "SUM"] {
            assert_eq!(parse_a1(text), None, "{text}");
        }
    }

    #[test]
    fn parses_r1c1_relative_to_anchor() {
        let anchor = CellCoord::new(4, 2);
        assert_eq!(parse_r1c1("R2C3", anchor), Some(CellAddr::absolute(1, 2)));
        assert_eq!(
            parse_r1c1("R[1]C[-1]", anchor),
            Some(CellAddr::relative(5, 1))
        );
        assert_eq!(parse_r1c1("RC[2]", anchor), Some(CellAddr::relative(4, 4)));
        assert_eq!(
            parse_r1c1("R[-1]C1", anchor),
            Some(CellAddr::new(3, 0, false, true))
        );
        assert_eq!(parse_r1c1("R[-5]C", anchor), None);
        assert_eq!(parse_r1c1("R1C1X", anchor), None);
    }

    #[test]
    fn column_labels_roundtrip() {
        let mut out = String::new();
        push_column_label(255, &mut out);
        assert_eq!(out, "IV");
        assert_eq!(column_label_to_index("IV"), Some(255));
        assert_eq!(column_label_to_index("a"), Some(0));
        assert_eq!(CellCoord::new(9, 27).to_a1(), "AB10");
    }

    #[test]
    fn offset_keeps_absolute_axes() {
        let anchor = CellCoord::new(10, 3);
        let addr = CellAddr::new(4, 1, true, false);
        assert_eq!(addr.offset_from(anchor), CellAddr::new(4, -2, true, false));
    }
}
