//! Rendering of the text shown to the user.
//!
//! Telco framing (CON/END prefixes, message length limits) is left to the
//! request-handling layer.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use ussd_dsl::{Node, NodeKind};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder regex is valid")
});

/// Replace `{{name}}` placeholders with session variables.
/// Unknown variables render as the empty string.
pub fn interpolate(template: &str, variables: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            variables.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Interpolate every string inside a JSON value
pub fn interpolate_value(value: &Value, variables: &HashMap<String, String>) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate(s, variables)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| interpolate_value(item, variables))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_value(v, variables)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Text for a node: its prompt, followed by one line per menu option
pub fn render_node(node: &Node, variables: &HashMap<String, String>) -> String {
    let mut lines = Vec::new();

    if let Some(text) = &node.text {
        lines.push(interpolate(text, variables));
    }

    if let NodeKind::Menu { options } = &node.kind {
        for option in options {
            lines.push(format!(
                "{}. {}",
                option.key,
                interpolate(&option.text, variables)
            ));
        }
    }

    lines.join("\n")
}

/// Error message followed by the prompt of the node being re-presented
pub fn render_error(message: &str, node: &Node, variables: &HashMap<String, String>) -> String {
    let prompt = render_node(node, variables);
    if prompt.is_empty() {
        message.to_string()
    } else {
        format!("{}\n{}", message, prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ussd_dsl::MenuOption;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_interpolate() {
        let variables = vars(&[("name", "Amina"), ("amount", "500")]);
        assert_eq!(
            interpolate("Hi {{name}}, send {{ amount }}?", &variables),
            "Hi Amina, send 500?"
        );
        assert_eq!(interpolate("Hi {{missing}}!", &variables), "Hi !");
        assert_eq!(interpolate("No placeholders", &variables), "No placeholders");
    }

    #[test]
    fn test_interpolate_value() {
        let variables = vars(&[("account", "42")]);
        let params = json!({"account": "{{account}}", "tags": ["a-{{account}}"], "limit": 5});
        assert_eq!(
            interpolate_value(&params, &variables),
            json!({"account": "42", "tags": ["a-42"], "limit": 5})
        );
    }

    #[test]
    fn test_render_menu() {
        let node = Node::menu(
            "start",
            vec![
                MenuOption::new("1", "Check balance", Some("bal")),
                MenuOption::new("0", "Exit", None),
            ],
        )
        .with_text("Welcome {{name}}");

        assert_eq!(
            render_node(&node, &vars(&[("name", "Juma")])),
            "Welcome Juma\n1. Check balance\n0. Exit"
        );
    }

    #[test]
    fn test_render_error() {
        let node = Node::end("bye");
        assert_eq!(render_error("Oops", &node, &HashMap::new()), "Oops");

        let node = Node::end("bye").with_text("Goodbye");
        assert_eq!(render_error("Oops", &node, &HashMap::new()), "Oops\nGoodbye");
    }
}
