use clap::ValueEnum;
use serde_json::Value as JsonValue;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
    Tsv,
}

impl OutputFormat {
    /// Returns the delimiter for CSV/TSV formats
    pub(crate) fn delimiter(&self) -> Option<&'static str> {
        match self {
            Self::Csv => Some(","),
            Self::Tsv => Some("\t"),
            _ => None,
        }
    }

    /// Check if this is a delimited format (CSV or TSV)
    pub(crate) fn is_delimited(&self) -> bool {
        matches!(self, Self::Csv | Self::Tsv)
    }
}

/// Escape a field for CSV output (handles commas, quotes, newlines)
pub(crate) fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Escape a field for TSV output (replaces tabs and newlines)
pub(crate) fn tsv_escape(field: &str) -> String {
    field
        .replace('\t', "\\t")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Format fields as a delimited row (CSV or TSV)
pub(crate) fn format_delimited_row(format: OutputFormat, fields: &[String]) -> String {
    let escaped: Vec<String> = match format {
        OutputFormat::Csv => fields.iter().map(|f| csv_escape(f)).collect(),
        OutputFormat::Tsv => fields.iter().map(|f| tsv_escape(f)).collect(),
        _ => fields.to_vec(),
    };
    let delimiter = format.delimiter().unwrap_or(",");
    escaped.join(delimiter)
}

/// Render a result value for a table cell or delimited field
pub(crate) fn value_to_cell(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_delimited_rows() {
        let fields = vec!["GROCERY".to_string(), "1,024".to_string()];
        assert_eq!(format_delimited_row(OutputFormat::Csv, &fields), "GROCERY,\"1,024\"");
        assert_eq!(format_delimited_row(OutputFormat::Tsv, &fields), "GROCERY\t1,024");
        assert!(OutputFormat::Tsv.is_delimited());
        assert!(!OutputFormat::Json.is_delimited());
    }

    #[test]
    fn test_value_to_cell() {
        assert_eq!(value_to_cell(&json!(null)), "NULL");
        assert_eq!(value_to_cell(&json!("2020-01-05")), "2020-01-05");
        assert_eq!(value_to_cell(&json!(12.5)), "12.5");
    }
}
