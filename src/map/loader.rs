//! ASCII map file loading.
//!
//! Format: optional `#` comment lines, a `<width> <height> <resolution>`
//! header, then `width * height` cell values in row-major order. Line breaks
//! inside the body are not significant.

use std::path::Path;

use crate::error::{MargaError, Result};
use crate::map::{Grid, Metadata};

/// Load a grid from a map file on disk.
pub fn load(path: &Path) -> Result<Grid> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        MargaError::Input(format!("Unable to open map file {}: {}", path.display(), e))
    })?;
    parse(&content)
}

/// Parse a grid from map file contents.
pub fn parse(input: &str) -> Result<Grid> {
    let mut lines = input.lines();

    let metadata = parse_header(&mut lines)?;
    let cells = parse_cells(lines, &metadata)?;

    Grid::new(metadata, cells)
}

fn parse_header<'a>(lines: &mut impl Iterator<Item = &'a str>) -> Result<Metadata> {
    for line in lines {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let width = parse_token::<usize>(tokens.next(), "width")?;
        let height = parse_token::<usize>(tokens.next(), "height")?;
        let resolution = parse_token::<f32>(tokens.next(), "resolution")?;

        if width == 0 || height == 0 {
            return Err(MargaError::Input(
                "Map dimensions must be positive".to_string(),
            ));
        }
        if resolution <= 0.0 {
            return Err(MargaError::Input(
                "Map resolution must be positive".to_string(),
            ));
        }

        return Metadata::new(width, height, resolution)
            .map_err(|e| MargaError::Input(e.to_string()));
    }

    Err(MargaError::Input("Map header not found".to_string()))
}

fn parse_token<T: std::str::FromStr>(token: Option<&str>, name: &str) -> Result<T> {
    let token = token.ok_or_else(|| {
        MargaError::Input(format!(
            "Failed to parse map header ({name} missing). Expected: <width> <height> <resolution>"
        ))
    })?;
    token.parse().map_err(|_| {
        MargaError::Input(format!("Failed to parse map header {name}: {token:?}"))
    })
}

fn parse_cells<'a>(
    lines: impl Iterator<Item = &'a str>,
    metadata: &Metadata,
) -> Result<Vec<f32>> {
    let expected = metadata.cell_count();
    let mut cells = Vec::with_capacity(expected);

    for line in lines {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        for token in line.split_whitespace() {
            let value: f32 = token.parse().map_err(|_| {
                MargaError::Input(format!("Failed to parse map cell value: {token:?}"))
            })?;
            cells.push(value);
        }

        if cells.len() == expected {
            break;
        }
    }

    if cells.len() != expected {
        return Err(MargaError::Input(format!(
            "Map file contained {} cells, expected {}",
            cells.len(),
            expected
        )));
    }

    Ok(cells)
}
