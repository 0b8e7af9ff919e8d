//! Convenience functions for reading label volumes and color tables and for writing meshes

use crate::color_table::ColorTable;
use anyhow::{Context, anyhow};
use std::fs;
use std::path::Path;

mod io_utils;
pub mod obj_format;
pub mod vtk_format;

/// Reads a color table from a text file with lines of the form `index name r g b a`
pub fn read_color_table<P: AsRef<Path>>(file_path: P) -> Result<ColorTable, anyhow::Error> {
    let file_path = file_path.as_ref();
    let content = fs::read_to_string(file_path)
        .with_context(|| anyhow!("Failed to read color table \"{}\"", file_path.display()))?;
    content
        .parse::<ColorTable>()
        .with_context(|| anyhow!("Failed to parse color table \"{}\"", file_path.display()))
}
