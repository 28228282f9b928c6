//! Render retrieved documents into the prompt's documents block.

use serde_json::Value;

use tendril_common::Document;

pub fn format_doc(doc: &Document) -> String {
    let meta: String = doc
        .metadata
        .iter()
        .map(|(key, value)| format!(" {}={}", key, value_text(value)))
        .collect();
    format!("<document{}>\n{}\n</document>", meta, doc.content)
}

pub fn format_docs(docs: &[Document]) -> String {
    if docs.is_empty() {
        return "<documents></documents>".to_string();
    }
    let formatted: Vec<String> = docs.iter().map(format_doc).collect();
    format!("<documents>\n{}\n</documents>", formatted.join("\n"))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_docs_block() {
        assert_eq!(format_docs(&[]), "<documents></documents>");
    }

    #[test]
    fn test_metadata_rendered_as_attributes() {
        let doc = Document::new("body text")
            .with_id("d1")
            .with_metadata("id", json!("d1"))
            .with_metadata("user_id", json!("u1"));
        let formatted = format_doc(&doc);
        assert!(formatted.starts_with("<document id=d1 user_id=u1>"));
        assert!(formatted.contains("body text"));
        assert!(formatted.ends_with("</document>"));
    }

    #[test]
    fn test_docs_joined_inside_block() {
        let docs = vec![
            Document::new("first").with_id("1"),
            Document::new("second").with_id("2"),
        ];
        let formatted = format_docs(&docs);
        assert!(formatted.starts_with("<documents>\n"));
        assert!(formatted.contains("first"));
        assert!(formatted.contains("second"));
        assert!(formatted.ends_with("\n</documents>"));
    }
}
