use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;

/// Variable bag for template substitution.
pub type Variables = BTreeMap<String, Value>;

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{\{([A-Za-z0-9_.\-]+)\}\}").unwrap();
}

/// String form of a variable. Null renders as nothing.
pub fn coerce(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Escapes `& < > " '` so a value cannot open markup or break out of an attribute.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn substitute(text: &str, vars: &Variables, value: impl Fn(&Value) -> String) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures| match vars.get(&caps[1]) {
            Some(v) => value(v),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Replaces every `{{key}}` found in `vars`. Unknown placeholders are left as written.
pub fn render(text: &str, vars: &Variables) -> String {
    substitute(text, vars, coerce)
}

/// Same as [`render`] for HTML bodies: substituted values are escaped,
/// the template markup itself is not.
pub fn render_html(text: &str, vars: &Variables) -> String {
    substitute(text, vars, |v| escape_html(&coerce(v)))
}

/// Placeholders still present after rendering.
pub fn unresolved(text: &str) -> Vec<String> {
    PLACEHOLDER_RE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(v: Value) -> Variables {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn substitutes_every_occurrence() {
        let out = render("Hi {{name}}, {{name}}!", &vars(json!({"name": "Ada"})));
        assert_eq!(out, "Hi Ada, Ada!");
    }

    #[test]
    fn unknown_placeholders_stay_verbatim() {
        let out = render("Hi {{name}} from {{team}}", &vars(json!({"name": "Ada"})));
        assert_eq!(out, "Hi Ada from {{team}}");
        assert_eq!(unresolved(&out), vec!["team".to_string()]);
    }

    #[test]
    fn text_without_matching_keys_is_byte_identical() {
        let vars = vars(json!({"name": "Ada"}));
        for text in ["plain text", "{{other}} stays", "{ {name} }", "{{ name }}", "ünïcödé {{x}}", ""] {
            assert_eq!(render(text, &vars), text);
        }
    }

    #[test]
    fn values_are_string_coerced() {
        let out = render(
            "{{n}} {{b}} {{z}}|{{list}}",
            &vars(json!({"n": 42, "b": true, "z": null, "list": [1, 2]})),
        );
        assert_eq!(out, "42 true |[1,2]");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let out = render("{{a}}", &vars(json!({"a": "{{b}}", "b": "boom"})));
        assert_eq!(out, "{{b}}");
    }

    #[test]
    fn html_values_are_escaped() {
        let vars = vars(json!({"name": "<a href=\"https://evil.example\">Click</a> & 'co'"}));
        let out = render_html("<h2>Hi {{name}}</h2>", &vars);
        assert_eq!(
            out,
            "<h2>Hi &lt;a href=&quot;https://evil.example&quot;&gt;Click&lt;/a&gt; &amp; &#39;co&#39;</h2>"
        );
        // plain-text rendering stays faithful to the value
        assert_eq!(render("{{name}}", &vars), vars["name"].as_str().unwrap());
    }

    #[test]
    fn html_without_matching_keys_is_byte_identical() {
        let text = "<p class=\"x\">{{other}} & more</p>";
        assert_eq!(render_html(text, &vars(json!({"name": "Ada"}))), text);
    }
}
