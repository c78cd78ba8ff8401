//! Metric-import error taxonomy.

use thiserror::Error;

use bng_core::ConfigError;

/// Failures while reducing a metric workbook.
#[derive(Error, Debug)]
pub enum MetricParseError {
    /// The structural heuristics could not find a header row.
    #[error("could not locate a header row in the {sheet} sheet")]
    HeaderNotFound { sheet: String },

    /// A distinctiveness value did not parse as a known tier.
    #[error("unknown distinctiveness '{value}' at row {row} of the {sheet} sheet")]
    UnknownDistinctiveness { sheet: String, row: usize, value: String },

    /// A habitat named in the workbook is absent from the catalogue.
    #[error("habitat '{habitat}' on the {sheet} sheet is not in the catalogue")]
    UnknownHabitat { sheet: String, habitat: String },

    /// The workbook bytes did not deserialize, or required pieces were
    /// missing.
    #[error("malformed metric workbook: {detail}")]
    Malformed { detail: String },

    /// The reference tables backing the parse were invalid.
    #[error(transparent)]
    InvalidReference(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_sheet() {
        let err = MetricParseError::HeaderNotFound { sheet: "hedgerow".into() };
        assert!(err.to_string().contains("hedgerow"));

        let err = MetricParseError::UnknownDistinctiveness {
            sheet: "area".into(),
            row: 7,
            value: "Middling".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Middling"));
        assert!(msg.contains("row 7"));
    }
}
