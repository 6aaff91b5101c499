//! `{{ path }}` placeholder rendering against a JSON scope.

use serde_json::Value;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Replace every `{{ path }}` in `template` with the value found by walking
/// `scope` along the dot-separated `path`. A leading `.` is accepted.
///
/// Returns a description of the problem when a placeholder is unterminated,
/// empty, or names a path that does not exist.
pub fn render(template: &str, scope: &Value) -> Result<String, String> {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        rendered.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            return Err(format!(
                "unterminated placeholder starting at '{}'",
                preview(&rest[start..])
            ));
        };

        let path = after_open[..end].trim();
        let path = path.strip_prefix('.').unwrap_or(path);
        if path.is_empty() {
            return Err("empty placeholder".to_string());
        }
        rendered.push_str(&display(lookup(scope, path)?));

        rest = &after_open[end + CLOSE.len()..];
    }

    rendered.push_str(rest);
    Ok(rendered)
}

fn lookup<'a>(scope: &'a Value, path: &str) -> Result<&'a Value, String> {
    let mut current = scope;
    for segment in path.split('.') {
        let next = match current {
            Value::Object(fields) => fields.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        current = next.ok_or_else(|| format!("no value at '{path}' (missing '{segment}')"))?;
    }
    Ok(current)
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            value.to_string()
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(24).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope() -> Value {
        json!({
            "Arg": "1.7.1",
            "Config": { "DownloadsDir": "/tmp/dl" },
            "StepOutputs": { "download": "/tmp/dl/jq" },
            "Tool": {
                "id": "jq",
                "symlinks": [{ "from": "jq" }],
                "extra": { "arm": true, "retries": 3, "none": null }
            }
        })
    }

    #[test]
    fn test_render_paths() {
        let out = render(
            "curl -o {{ .Config.DownloadsDir }}/{{Tool.id}}-{{ Arg }} && echo {{ StepOutputs.download }}",
            &scope(),
        )
        .unwrap();
        assert_eq!(out, "curl -o /tmp/dl/jq-1.7.1 && echo /tmp/dl/jq");
    }

    #[test]
    fn test_render_scalars_and_collections() {
        let s = scope();
        assert_eq!(render("{{ Tool.extra.arm }}", &s).unwrap(), "true");
        assert_eq!(render("{{ Tool.extra.retries }}", &s).unwrap(), "3");
        assert_eq!(render("[{{ Tool.extra.none }}]", &s).unwrap(), "[]");
        assert_eq!(render("{{ Tool.symlinks.0.from }}", &s).unwrap(), "jq");
        assert_eq!(
            render("{{ Tool.symlinks }}", &s).unwrap(),
            r#"[{"from":"jq"}]"#
        );
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(render("echo ${HOME} }}", &scope()).unwrap(), "echo ${HOME} }}");
    }

    #[test]
    fn test_render_errors() {
        let s = scope();
        assert!(render("{{ Tool.missing }}", &s).unwrap_err().contains("missing"));
        assert!(render("echo {{ Arg", &s).unwrap_err().contains("unterminated"));
        assert!(render("{{ }}", &s).is_err());
    }
}
