//! Metric workbook transport shapes.
//!
//! The DEFRA metric arrives pre-exported as JSON: three cell-grid sheets
//! (area, hedgerow, watercourse) and a headline block. The grids are kept
//! raw - `Vec<Vec<Cell>>` - because header positions vary between metric
//! versions and are located heuristically by the parser.

use serde::Deserialize;

/// One spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl Cell {
    /// Non-empty text content, trimmed.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            _ => None,
        }
    }

    /// Numeric content; numeric strings count.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().replace(',', "").parse().ok(),
            Cell::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }
}

/// A raw sheet: rows of cells, header not yet located.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Sheet {
    #[serde(default)]
    pub name: Option<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// The headline table: baseline units and the required net-gain percentage.
#[derive(Debug, Clone, Deserialize)]
pub struct Headline {
    pub baseline_units: f64,
    #[serde(default)]
    pub target_net_gain_pct: Option<f64>,
}

/// The full workbook.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricWorkbook {
    pub area: Sheet,
    pub hedgerow: Sheet,
    pub watercourse: Sheet,
    pub headline: Headline,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_deserialize_from_mixed_json() {
        let json = r#"[1.5, "Lowland meadows", null, "  ", "2,000.5"]"#;
        let cells: Vec<Cell> = serde_json::from_str(json).unwrap();
        assert_eq!(cells[0].as_number(), Some(1.5));
        assert_eq!(cells[1].as_text(), Some("Lowland meadows"));
        assert!(cells[2].is_empty());
        assert!(cells[3].is_empty());
        assert_eq!(cells[4].as_number(), Some(2000.5));
    }

    #[test]
    fn workbook_deserializes() {
        let json = r#"{
            "area": {"rows": [["Habitat", "Project-wide change"], ["Lowland meadows", -1.0]]},
            "hedgerow": {"rows": []},
            "watercourse": {"rows": []},
            "headline": {"baseline_units": 100.0, "target_net_gain_pct": 10.0}
        }"#;
        let workbook: MetricWorkbook = serde_json::from_str(json).unwrap();
        assert_eq!(workbook.area.rows.len(), 2);
        assert_eq!(workbook.headline.target_net_gain_pct, Some(10.0));
    }
}
