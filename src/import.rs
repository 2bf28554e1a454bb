//! Batch parameter import: turns a block of pasted spreadsheet text into
//! parameter rows. Parsing is a pure preview step; committing the reviewed
//! rows is a separate endpoint (see routes::parameters).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{NewParameter, ParamType};

const DELIMITERS: &[&str] = &["\t", ",", "|", "  "];

// Header keywords in both source and target language.
const HEADER_KEYWORDS: &[&str] = &[
    "field", "param", "name", "type", "字段名", "参数", "名称", "类型",
];

const REQUIRED_TOKENS: &[&str] = &["是", "yes", "true", "1", "y", "必填"];

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ParsedParameter {
    pub field_name: String,
    pub name: String,
    pub data_type: String,
    pub param_type: ParamType,
    pub required: bool,
    pub default_value: Option<String>,
    pub description: Option<String>,
    pub example: Option<String>,
    pub order_index: i32,
}

impl From<ParsedParameter> for NewParameter {
    fn from(p: ParsedParameter) -> Self {
        NewParameter {
            name: p.name,
            field_name: p.field_name,
            data_type: p.data_type,
            param_type: p.param_type,
            required: p.required,
            default_value: p.default_value,
            description: p.description,
            example: p.example,
            order_index: p.order_index,
            dictionary_id: None,
        }
    }
}

/// Picks the delimiter producing the most columns on the first data line.
/// Ties fall to the earlier candidate; a single-column line defaults to tab.
fn detect_delimiter(line: &str) -> &'static str {
    let mut best = "\t";
    let mut best_count = 1;
    for &delim in DELIMITERS {
        let count = line.split(delim).filter(|c| !c.trim().is_empty()).count();
        if count > best_count {
            best_count = count;
            best = delim;
        }
    }
    best
}

// Only the first cell is consulted: the fixed column order puts field_name
// first, so a header row leads with a field/param keyword while a data row
// leads with an actual field name (which may itself contain "name" etc.).
fn is_header(line: &str, delim: &str) -> bool {
    let first_cell = split_columns(line, delim)
        .into_iter()
        .next()
        .unwrap_or_default()
        .to_lowercase();
    HEADER_KEYWORDS.iter().any(|k| first_cell.contains(k))
}

/// Fixed synonym table; unrecognized or empty tokens fall back to `string`.
fn normalize_type(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "varchar" | "char" => "varchar",
        "string" | "text" => "string",
        "int" | "integer" | "number" => "int",
        "float" | "double" | "decimal" => "float",
        "bool" | "boolean" => "boolean",
        "date" => "date",
        "datetime" | "timestamp" => "datetime",
        "object" | "json" => "object",
        "array" | "list" => "array",
        _ => "string",
    }
    .to_string()
}

fn parse_required(raw: &str) -> bool {
    let token = raw.trim().to_lowercase();
    REQUIRED_TOKENS.contains(&token.as_str())
}

// Tab/comma/pipe splits keep empty cells so later columns stay aligned; the
// double-space delimiter collapses runs instead (padding produces empties).
fn split_columns(line: &str, delim: &str) -> Vec<String> {
    if delim == "  " {
        line.split(delim)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    } else {
        line.split(delim).map(|c| c.trim().to_string()).collect()
    }
}

fn non_empty(cell: Option<&String>) -> Option<String> {
    cell.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())
}

/// Parses pasted tabular text into parameter rows.
///
/// Column order is fixed: field_name, name, data_type, default_value,
/// required, description, example; missing trailing columns default to empty.
/// The first non-empty line drives delimiter detection and is skipped when it
/// looks like a header. Rows with neither field_name nor name are discarded
/// silently. `order_index` continues from `start_index`.
pub fn parse_parameter_block(
    text: &str,
    param_type: ParamType,
    start_index: i32,
) -> Vec<ParsedParameter> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty()).peekable();

    let first = match lines.peek() {
        Some(l) => *l,
        None => return Vec::new(),
    };
    let delim = detect_delimiter(first);
    if is_header(first, delim) {
        lines.next();
    }

    let mut out = Vec::new();
    for line in lines {
        let cols = split_columns(line, delim);
        let field_name = non_empty(cols.first()).unwrap_or_default();
        let name = non_empty(cols.get(1)).unwrap_or_default();
        if field_name.is_empty() && name.is_empty() {
            continue;
        }
        let required = param_type == ParamType::Input
            && cols.get(4).map(|c| parse_required(c)).unwrap_or(false);
        out.push(ParsedParameter {
            field_name,
            name,
            data_type: normalize_type(cols.get(2).map(String::as_str).unwrap_or("")),
            param_type,
            required,
            default_value: non_empty(cols.get(3)),
            description: non_empty(cols.get(5)),
            example: non_empty(cols.get(6)),
            order_index: start_index + out.len() as i32,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tab_separated_row_without_header() {
        let rows = parse_parameter_block("id\tName\tvarchar\t50\t是\tdesc\tex1", ParamType::Input, 0);
        assert_eq!(rows.len(), 1);
        let p = &rows[0];
        assert_eq!(p.field_name, "id");
        assert_eq!(p.name, "Name");
        assert_eq!(p.data_type, "varchar");
        assert_eq!(p.default_value.as_deref(), Some("50"));
        assert!(p.required);
        assert_eq!(p.description.as_deref(), Some("desc"));
        assert_eq!(p.example.as_deref(), Some("ex1"));
        assert_eq!(p.order_index, 0);
    }

    #[test]
    fn skips_header_line_in_source_language() {
        let text = "字段名\t名称\t类型\npatient_id\t患者ID\tstring";
        let rows = parse_parameter_block(text, ParamType::Input, 0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field_name, "patient_id");
    }

    #[test]
    fn skips_header_line_in_english() {
        let text = "field\tname\ttype\nid\tID\tint";
        let rows = parse_parameter_block(text, ParamType::Output, 0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].data_type, "int");
    }

    #[test]
    fn detects_comma_and_pipe_delimiters() {
        let rows = parse_parameter_block("a,A,int,,,,\nb,B,float", ParamType::Output, 0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].data_type, "int");
        assert_eq!(rows[1].data_type, "float");

        let rows = parse_parameter_block("a|A|bool", ParamType::Output, 0);
        assert_eq!(rows[0].data_type, "boolean");
    }

    #[test]
    fn type_synonyms_normalize() {
        for (raw, want) in [
            ("CHAR", "varchar"),
            ("text", "string"),
            ("Integer", "int"),
            ("decimal", "float"),
            ("bool", "boolean"),
            ("timestamp", "datetime"),
            ("json", "object"),
            ("list", "array"),
            ("mystery", "string"),
            ("", "string"),
        ] {
            assert_eq!(normalize_type(raw), want, "raw={raw}");
        }
    }

    #[test]
    fn required_only_applies_to_input() {
        let rows = parse_parameter_block("f\tF\tint\t\t是", ParamType::Output, 0);
        assert!(!rows[0].required);
        let rows = parse_parameter_block("f\tF\tint\t\tY", ParamType::Input, 0);
        assert!(rows[0].required);
        let rows = parse_parameter_block("f\tF\tint\t\t否", ParamType::Input, 0);
        assert!(!rows[0].required);
    }

    #[test]
    fn rows_without_field_name_and_name_are_dropped() {
        let text = "id\tID\tint\n\t\tstring\nname\tName";
        let rows = parse_parameter_block(text, ParamType::Input, 0);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn order_index_continues_from_start() {
        let rows = parse_parameter_block("a\tA\nb\tB", ParamType::Input, 5);
        assert_eq!(rows[0].order_index, 5);
        assert_eq!(rows[1].order_index, 6);
    }

    #[test]
    fn missing_trailing_columns_default_empty() {
        let rows = parse_parameter_block("code\t编码", ParamType::Input, 0);
        let p = &rows[0];
        assert_eq!(p.data_type, "string");
        assert!(p.default_value.is_none());
        assert!(!p.required);
        assert!(p.description.is_none());
    }
}
