//! Default system prompts and the `{placeholder}` renderer.

pub const RESPONSE_SYSTEM_PROMPT: &str = "\
You are a helpful AI assistant. Answer the user's questions based on the retrieved documents.

{retrieved_docs}

System time: {system_time}";

pub const QUERY_SYSTEM_PROMPT: &str = "\
Generate search queries to retrieve documents that may help answer the user's question. \
Previously, you made the following queries:

<previous_queries/>
{queries}
</previous_queries>

System time: {system_time}";

/// Substitute `{name}` placeholders. Placeholders without a binding are left
/// intact so a caller-supplied template never loses information silently.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_all_occurrences() {
        let out = render("{x} and {x} and {y}", &[("x", "a"), ("y", "b")]);
        assert_eq!(out, "a and a and b");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let out = render("{known} {unknown}", &[("known", "v")]);
        assert_eq!(out, "v {unknown}");
    }

    #[test]
    fn test_default_prompts_carry_placeholders() {
        assert!(RESPONSE_SYSTEM_PROMPT.contains("{retrieved_docs}"));
        assert!(RESPONSE_SYSTEM_PROMPT.contains("{system_time}"));
        assert!(QUERY_SYSTEM_PROMPT.contains("{queries}"));
        assert!(QUERY_SYSTEM_PROMPT.contains("{system_time}"));
    }
}
