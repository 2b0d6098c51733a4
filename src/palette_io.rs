//! Palette exchange files.
//!
//! The tabular form has one row per entry and the columns
//! `m0,m1,m2,std0,std1,std2` (mean and standard deviation of hue, saturation
//! and value). Columns are located by header name, so extra columns such as
//! a leading row index are ignored. Paths ending in `.json` use the serde
//! representation instead.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::color::HsvPolar;
use crate::error::{PipelineError, Result};
use crate::palette_builder::{Palette, PaletteEntry};

pub const COLUMNS: [&str; 6] = ["m0", "m1", "m2", "std0", "std1", "std2"];
const DELIMITER: char = ',';

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl Palette {
    pub fn to_csv_string(&self) -> String {
        let mut out = COLUMNS.join(",");
        out.push('\n');
        for entry in self {
            let [m0, m1, m2] = entry.mean.channels();
            let [s0, s1, s2] = entry.std_dev.channels();
            // Writing into a String cannot fail.
            let _ = writeln!(out, "{m0},{m1},{m2},{s0},{s1},{s2}");
        }
        out
    }

    pub fn from_csv_str(text: &str) -> Result<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        let (header_line, header) = lines
            .next()
            .ok_or_else(|| PipelineError::format(1, "missing header row"))?;
        let names: Vec<&str> = header
            .split(DELIMITER)
            .map(|name| name.trim().trim_matches('"'))
            .collect();

        let mut positions = [0usize; 6];
        for (slot, column) in positions.iter_mut().zip(COLUMNS) {
            *slot = names
                .iter()
                .position(|name| *name == column)
                .ok_or_else(|| PipelineError::format(header_line, format!("missing column `{column}`")))?;
        }

        let mut entries = Vec::new();
        for (line_no, line) in lines {
            let fields: Vec<&str> = line.split(DELIMITER).map(str::trim).collect();
            let mut values = [0.0f64; 6];
            for ((value, &pos), column) in values.iter_mut().zip(&positions).zip(COLUMNS) {
                let raw = fields.get(pos).ok_or_else(|| {
                    PipelineError::format(line_no, format!("row has no value for `{column}`"))
                })?;
                *value = raw.parse().map_err(|_| {
                    PipelineError::format(line_no, format!("`{raw}` is not a number ({column})"))
                })?;
            }

            let [m0, m1, m2, s0, s1, s2] = values;
            let entry = PaletteEntry::new(HsvPolar::new(m0, m1, m2), HsvPolar::new(s0, s1, s2))
                .map_err(|e| PipelineError::format(line_no, e.to_string()))?;
            entries.push(entry);
        }

        Palette::new(entries)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let entries: Vec<PaletteEntry> = serde_json::from_str(text)?;
        Palette::new(entries)
    }

    /// Writes the palette as JSON or CSV depending on the file extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = if is_json(path) {
            self.to_json_string()?
        } else {
            self.to_csv_string()
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        fs::write(path, text).map_err(|e| PipelineError::io(path, e))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        if is_json(path) {
            Self::from_json_str(&text)
        } else {
            Self::from_csv_str(&text)
        }
    }
}
