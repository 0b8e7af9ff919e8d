//! Color tables mapping labels to names and display colors
//!
//! The text format has one entry per line: `index name r g b a` with color components in
//! `0..=255`. Empty lines and lines starting with `#` are ignored.

use crate::Label;
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error as ThisError;

/// Name reported for indices inside of the table that have no entry
pub const NO_NAME: &str = "(none)";
/// Name that marks an entry as unusable
pub const INVALID_NAME: &str = "invalid";

/// A single named color of a [`ColorTable`]
#[derive(Clone, Debug, PartialEq)]
pub struct ColorEntry {
    pub name: String,
    /// RGBA components in `[0, 1]`
    pub rgba: [f64; 4],
}

/// Error type returned when a color table cannot be parsed
#[non_exhaustive]
#[derive(Debug, ThisError, PartialEq)]
pub enum ColorTableError {
    #[error("line {line}: expected 'index name r g b a' but found {found} field(s)")]
    MissingFields { line: usize, found: usize },
    #[error("line {line}: invalid label index '{value}'")]
    InvalidIndex { line: usize, value: String },
    #[error("line {line}: invalid color component '{value}'")]
    InvalidComponent { line: usize, value: String },
    #[error("the color table does not contain any entries")]
    Empty,
}

/// Lookup table from labels to color names and colors
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColorTable {
    entries: BTreeMap<Label, ColorEntry>,
}

impl ColorTable {
    /// Creates a table from explicit entries
    pub fn from_entries<I: IntoIterator<Item = (Label, ColorEntry)>>(entries: I) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Number of colors, one more than the largest index of the table
    pub fn number_of_colors(&self) -> usize {
        self.entries
            .keys()
            .next_back()
            .map(|&max| max as usize + 1)
            .unwrap_or(0)
    }

    /// Returns the entry of the given label if present
    pub fn entry(&self, label: Label) -> Option<&ColorEntry> {
        self.entries.get(&label)
    }

    /// Returns the color name of a label
    ///
    /// Labels inside of the table without an entry are called [`NO_NAME`], labels outside of
    /// the table have no name.
    pub fn color_name(&self, label: Label) -> Option<&str> {
        if label < 0 || label as usize >= self.number_of_colors() {
            return None;
        }
        Some(
            self.entries
                .get(&label)
                .map(|e| e.name.as_str())
                .unwrap_or(NO_NAME),
        )
    }

    /// Returns the RGBA color of the label if it has an entry
    pub fn color(&self, label: Label) -> Option<[f64; 4]> {
        self.entries.get(&label).map(|e| e.rgba)
    }
}

impl FromStr for ColorTable {
    type Err = ColorTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut entries = BTreeMap::new();

        for (line_idx, line) in s.lines().enumerate() {
            let line_no = line_idx + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields = line.split_whitespace().collect::<Vec<_>>();
            if fields.len() < 6 {
                return Err(ColorTableError::MissingFields {
                    line: line_no,
                    found: fields.len(),
                });
            }

            let index = fields[0]
                .parse::<Label>()
                .ok()
                .filter(|&i| i >= 0)
                .ok_or_else(|| ColorTableError::InvalidIndex {
                    line: line_no,
                    value: fields[0].to_string(),
                })?;

            // Names may contain whitespace, the color components are always the last four fields
            let name = fields[1..fields.len() - 4].join(" ");

            let mut rgba = [0.0; 4];
            for (c, value) in rgba.iter_mut().zip(&fields[fields.len() - 4..]) {
                let v = value
                    .parse::<f64>()
                    .ok()
                    .filter(|v| (0.0..=255.0).contains(v))
                    .ok_or_else(|| ColorTableError::InvalidComponent {
                        line: line_no,
                        value: value.to_string(),
                    })?;
                *c = v / 255.0;
            }

            entries.insert(index, ColorEntry { name, rgba });
        }

        if entries.is_empty() {
            return Err(ColorTableError::Empty);
        }

        Ok(Self { entries })
    }
}
