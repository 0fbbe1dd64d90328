//! Utility functions for reading loosely typed document fields

use serde_json::Value;

/// Numeric fields arrive either as JSON numbers or as numeric strings.
pub fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

// missing or non-string fields read as ""
pub fn text(value: Option<&Value>) -> &str {
    value.and_then(Value::as_str).unwrap_or_default()
}

pub fn format_amount(amount: f64) -> String {
    amount.to_string()
}

/// Split a comma-joined identifier list, skipping empty entries.
pub fn split_ids(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_parse_from_strings_and_numbers() {
        assert_eq!(number(Some(&json!("1000"))), Some(1000.0));
        assert_eq!(number(Some(&json!(" 2.5 "))), Some(2.5));
        assert_eq!(number(Some(&json!(7))), Some(7.0));
        assert_eq!(number(Some(&json!("abc"))), None);
        assert_eq!(number(Some(&json!(true))), None);
        assert_eq!(number(None), None);
    }

    #[test]
    fn amounts_format_without_trailing_zeros() {
        assert_eq!(format_amount(1000.0), "1000");
        assert_eq!(format_amount(12.5), "12.5");
    }

    #[test]
    fn split_skips_empty_entries() {
        let ids: Vec<_> = split_ids("INV1,INV2,,INV3,").collect();
        assert_eq!(ids, ["INV1", "INV2", "INV3"]);
    }
}
