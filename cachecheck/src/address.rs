use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::error::VerifyError;

/// The shape of the simulated cache: `2^s` sets of `E` lines, each holding `2^b` bytes
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
pub struct Geometry {
    index_bits: u32,
    associativity: u32,
    offset_bits: u32,
}

impl Geometry {
    /// Creates a geometry, checking that `s + b <= 64` and `E >= 1`
    pub fn new(index_bits: u32, associativity: u32, offset_bits: u32) -> Result<Self, VerifyError> {
        if associativity == 0 {
            return Err(VerifyError::Config("associativity must be at least 1".to_string()));
        }
        if index_bits.checked_add(offset_bits).map_or(true, |sum| sum > u64::BITS) {
            return Err(VerifyError::Config(format!(
                "index bits ({index_bits}) and offset bits ({offset_bits}) exceed the 64 bit address"
            )));
        }
        Ok(Self {
            index_bits,
            associativity,
            offset_bits,
        })
    }

    pub fn index_bits(&self) -> u32 {
        self.index_bits
    }

    pub fn associativity(&self) -> u32 {
        self.associativity
    }

    pub fn offset_bits(&self) -> u32 {
        self.offset_bits
    }

    pub fn tag_bits(&self) -> u32 {
        u64::BITS - self.index_bits - self.offset_bits
    }
}

impl Display for Geometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "s={} E={} b={}", self.index_bits, self.associativity, self.offset_bits)
    }
}

/// An address split into its tag, set index, and block offset
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AddressFields {
    pub tag: u64,
    pub index: u64,
    pub offset: u64,
    geometry: Geometry,
}

// Width 64 is a valid field, so `1 << bits` can't be used directly
fn low_mask(bits: u32) -> u64 {
    u64::MAX.checked_shr(u64::BITS - bits).filter(|_| bits > 0).unwrap_or(0)
}

fn shift_right(value: u64, bits: u32) -> u64 {
    value.checked_shr(bits).unwrap_or(0)
}

fn shift_left(value: u64, bits: u32) -> u64 {
    value.checked_shl(bits).unwrap_or(0)
}

impl AddressFields {
    /// Splits an address, least significant field first: offset, then index, then tag
    pub fn decompose(address: u64, geometry: Geometry) -> Self {
        let b = geometry.offset_bits;
        let s = geometry.index_bits;
        Self {
            offset: address & low_mask(b),
            index: shift_right(address, b) & low_mask(s),
            tag: shift_right(address, b + s) & low_mask(geometry.tag_bits()),
            geometry,
        }
    }

    /// Puts the fields back together as `tag ∥ index ∥ offset`
    pub fn reassemble(&self) -> u64 {
        let b = self.geometry.offset_bits;
        let s = self.geometry.index_bits;
        shift_left(self.tag, b + s) | shift_left(self.index, b) | self.offset
    }

    /// Binary digits of `(tag, index, offset)`, most significant bit first, padded to the
    /// field width. A zero width field renders as an empty string
    pub fn to_binary(&self) -> [String; 3] {
        [
            render_binary(self.tag, self.geometry.tag_bits()),
            render_binary(self.index, self.geometry.index_bits),
            render_binary(self.offset, self.geometry.offset_bits),
        ]
    }

    /// Hexadecimal values of `(tag, index, offset)`
    pub fn to_hex(&self) -> [String; 3] {
        [
            format!("{:#x}", self.tag),
            format!("{:#x}", self.index),
            format!("{:#x}", self.offset),
        ]
    }

    /// Renders the fields as a boxed table with a binary row and a hex row
    ///
    /// ```text
    /// +--------+-------+--------+
    /// | tag    | index | offset |
    /// +--------+-------+--------+
    /// ...
    /// ```
    pub fn render_table(&self) -> String {
        let header = ["tag", "index", "offset"].map(String::from);
        render_table(&[header, self.to_binary(), self.to_hex()])
    }
}

fn render_binary(value: u64, width: u32) -> String {
    if width == 0 {
        return String::new();
    }
    format!("{value:0width$b}", width = width as usize)
}

/// Formats rows of cells as a table, the first row being the header
pub fn render_table<const N: usize>(rows: &[[String; N]]) -> String {
    let widths: Vec<usize> = (0..N)
        .map(|column| {
            let longest = rows.iter().map(|row| row[column].len() + 2).max().unwrap_or(2);
            // Rounded up rather than down, a column is never narrower than its widest cell
            (longest + 3) / 4 * 4 + 1
        })
        .collect();
    let bar = widths.iter().fold(String::from("+"), |mut bar, width| {
        bar.push_str(&"-".repeat(*width));
        bar.push('+');
        bar
    });
    let format_row = |row: &[String; N]| {
        row.iter().zip(&widths).fold(String::from("|"), |mut line, (cell, width)| {
            line.push(' ');
            line.push_str(cell);
            line.push_str(&" ".repeat(width.saturating_sub(cell.len() + 1)));
            line.push('|');
            line
        })
    };
    let mut out = Vec::with_capacity(rows.len() + 3);
    out.push(bar.clone());
    if let Some((header, body)) = rows.split_first() {
        out.push(format_row(header));
        out.push(bar.clone());
        out.extend(body.iter().map(format_row));
    }
    out.push(bar);
    out.join("\n")
}
