//! CSV rendering of a collection. Columns are the dotted leaf paths of the first document;
//! later documents missing a column get `n/a`.

use csv::{QuoteStyle, WriterBuilder};
use serde_json::Value;

pub const DELIMITER: u8 = b';';
pub const MISSING: &str = "n/a";

/// Leaf paths of `doc`, nested objects flattened. Arrays and empty objects are leaves.
pub fn field_paths(doc: &Value) -> Vec<Vec<String>> {
    let mut out = Vec::new();
    if let Value::Object(map) = doc {
        collect_paths(map, &mut Vec::new(), &mut out);
    }
    out
}

fn collect_paths(map: &serde_json::Map<String, Value>, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
    for (k, v) in map {
        prefix.push(k.clone());
        match v {
            Value::Object(inner) if !inner.is_empty() => collect_paths(inner, prefix, out),
            _ => out.push(prefix.clone()),
        }
        prefix.pop();
    }
}

fn lookup<'a>(doc: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(doc, |cur, seg| cur.get(seg))
}

fn render(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => MISSING.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

/// `;`-delimited CSV with a header row. An empty slice renders as an empty string.
pub fn to_csv(docs: &[Value]) -> Result<String, csv::Error> {
    let Some(first) = docs.first() else {
        return Ok(String::new());
    };
    let fields = field_paths(first);
    if fields.is_empty() {
        return Ok(String::new());
    }
    tracing::debug!(fields = ?fields.iter().map(|p| p.join(".")).collect::<Vec<_>>(), "csv fields");

    let mut writer = WriterBuilder::new()
        .delimiter(DELIMITER)
        .quote_style(QuoteStyle::NonNumeric)
        .from_writer(Vec::new());
    writer.write_record(fields.iter().map(|p| p.join(".")))?;
    for doc in docs {
        writer.write_record(fields.iter().map(|p| render(lookup(doc, p))))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
