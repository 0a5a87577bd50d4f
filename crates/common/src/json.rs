use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::warn;

/// Decodes a complete JSON document without a nesting limit.
///
/// The stack grows on demand while descending, so documents nested far deeper
/// than the default limit of 128 levels decode as long as memory allows.
/// Trailing non-whitespace input is an error.
/// 解析 JSON（不限巢狀深度）。
pub fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    deserializer.disable_recursion_limit();
    let value = T::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
    deserializer.end()?;
    Ok(value)
}

/// Decodes `text` as JSON, falling back to `default` when it does not parse.
///
/// The error is handed back next to the value instead of being raised, so
/// callers holding partially-loaded data can carry on with the fallback.
/// 安全解析 JSON；失敗時回傳錯誤與預設值。
pub fn safe_json_parse<T: DeserializeOwned>(text: &str, default: T) -> (Option<serde_json::Error>, T) {
    match decode_json(text) {
        Ok(value) => (None, value),
        Err(err) => {
            warn!(error = %err, "JSON decode failed, using default");
            (Some(err), default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn parses_valid_json() {
        let (err, value): (_, Value) = safe_json_parse(r#"{"a": [1, 2]}"#, Value::Null);
        assert!(err.is_none());
        assert_eq!(value, json!({ "a": [1, 2] }));
    }

    #[test]
    fn falls_back_on_malformed_input() {
        let (err, value) = safe_json_parse::<Vec<u32>>("[1, 2", vec![7]);
        assert!(err.unwrap().is_eof());
        assert_eq!(value, vec![7]);
    }

    #[test]
    fn falls_back_on_shape_mismatch() {
        let (err, value) = safe_json_parse::<Vec<u32>>(r#"{"not": "a list"}"#, Vec::new());
        assert!(err.unwrap().is_data());
        assert!(value.is_empty());
    }

    fn nested_arrays(depth: usize) -> String {
        format!("{}{}", "[".repeat(depth), "]".repeat(depth))
    }

    #[test]
    fn decodes_documents_deeper_than_the_default_limit() {
        let text = nested_arrays(5_000);
        assert!(serde_json::from_str::<Value>(&text).is_err());

        let mut value: Value = decode_json(&text).unwrap();
        let mut depth = 0;
        while let Value::Array(mut items) = value {
            depth += 1;
            value = items.pop().unwrap_or(Value::Null);
        }
        assert_eq!(depth, 5_000);

        let (err, value) = safe_json_parse(&nested_arrays(1_000), Value::Null);
        assert!(err.is_none());
        assert!(value.is_array());
    }

    #[test]
    fn rejects_trailing_input() {
        assert!(decode_json::<Vec<u32>>("[1] [2]").is_err());
        assert_eq!(decode_json::<Vec<u32>>(" [1, 2] \n").unwrap(), vec![1, 2]);
    }
}
