use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ComposeError;

/// Upper bound for rows and columns on a sheet.
pub const MAX_GRID_DIMENSION: u32 = 10;

const PRESETS: &[(u32, u32)] = &[(1, 2), (1, 3), (2, 2), (2, 3), (3, 2), (3, 3)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Portrait => write!(f, "portrait"),
            Orientation::Landscape => write!(f, "landscape"),
        }
    }
}

/// Rows × columns of a sheet page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridLayout {
    pub rows: u32,
    pub columns: u32,
    pub name: String,
}

impl GridLayout {
    pub fn new(rows: u32, columns: u32) -> Result<Self, ComposeError> {
        let layout = Self {
            rows,
            columns,
            name: format!("{}x{}", rows, columns),
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Looks up one of the stock layouts by name, e.g. `"2x3"`.
    pub fn preset(name: &str) -> Option<Self> {
        Self::presets().into_iter().find(|l| l.name == name)
    }

    pub fn presets() -> Vec<Self> {
        PRESETS
            .iter()
            .map(|&(rows, columns)| Self {
                rows,
                columns,
                name: format!("{}x{}", rows, columns),
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), ComposeError> {
        let valid = |n: u32| (1..=MAX_GRID_DIMENSION).contains(&n);
        if !valid(self.rows) || !valid(self.columns) {
            return Err(ComposeError::InvalidGrid {
                rows: self.rows,
                columns: self.columns,
            });
        }
        Ok(())
    }

    /// Number of cells on one page.
    pub fn capacity(&self) -> usize {
        self.rows as usize * self.columns as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetCompositionOptions {
    pub grid_layout: GridLayout,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub generate_document: bool,
}

/// One full or partial grid page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedSheet {
    pub id: String,
    pub output_path: PathBuf,
    pub grid_layout: GridLayout,
    pub orientation: Orientation,
    /// Ids of the processed images on this page, in placement order.
    pub images: Vec<String>,
    pub empty_slots: usize,
}

impl ComposedSheet {
    pub fn is_full(&self) -> bool {
        self.empty_slots == 0
    }
}
