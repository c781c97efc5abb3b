// file: src/mail/template.rs
// description: HTML body template with {placeholder} substitution
// reference: placeholders use single braces, e.g. {name}

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const FALLBACK_TEMPLATE: &str =
    "<html><body><h1>Hello {name}</h1><p>Please find your QR code attached.</p></body></html>";

#[derive(Debug, Clone)]
pub struct EmailTemplate {
    template: String,
}

impl EmailTemplate {
    pub fn new(template: String) -> Self {
        Self { template }
    }

    /// Falls back to a minimal greeting when the file cannot be read.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(template) => {
                debug!("Loaded email template from {}", path.display());
                Self::new(template)
            }
            Err(e) => {
                warn!(
                    "Email template {} not readable ({}), using built-in body",
                    path.display(),
                    e
                );
                Self::fallback()
            }
        }
    }

    pub fn fallback() -> Self {
        Self::new(FALLBACK_TEMPLATE.to_string())
    }

    /// Single left-to-right pass: substituted values are never scanned
    /// again, and braces that do not name a known key are kept verbatim.
    pub fn render_with_map(&self, values: &HashMap<&str, &str>) -> String {
        let mut result = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            result.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            let token = after
                .find('}')
                .and_then(|close| values.get(&after[..close]).map(|value| (*value, close)));

            match token {
                Some((value, close)) => {
                    result.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    result.push('{');
                    rest = after;
                }
            }
        }

        result.push_str(rest);
        result
    }
}

impl Default for EmailTemplate {
    fn default() -> Self {
        Self::fallback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn values<'a>(pairs: &[(&'a str, &'a str)]) -> HashMap<&'a str, &'a str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_render_with_map() {
        let template =
            EmailTemplate::new("<p>{name}</p><img src=\"cid:qr_code\"><code>{unique_id}</code>".to_string());

        let html = template.render_with_map(&values(&[("name", "Bo"), ("unique_id", "abc")]));
        assert_eq!(html, "<p>Bo</p><img src=\"cid:qr_code\"><code>abc</code>");
    }

    #[test]
    fn test_repeated_placeholder() {
        let template = EmailTemplate::new("<p>Hi {name}, see you {name}!</p>".to_string());
        assert_eq!(
            template.render_with_map(&values(&[("name", "Ann")])),
            "<p>Hi Ann, see you Ann!</p>"
        );
    }

    #[test]
    fn test_values_are_not_expanded_again() {
        let template = EmailTemplate::new("Hello {name}".to_string());
        let row = values(&[
            ("name", "{unique_id}"),
            ("email", "ann@x.com"),
            ("unique_id", "ID-123"),
        ]);

        for _ in 0..50 {
            assert_eq!(template.render_with_map(&row), "Hello {unique_id}");
        }
    }

    #[test]
    fn test_unknown_braces_are_kept() {
        let template = EmailTemplate::new(
            "<style>p { color: red; }</style><p>{{name}} {missing} {</p>".to_string(),
        );
        assert_eq!(
            template.render_with_map(&values(&[("name", "Cy")])),
            "<style>p { color: red; }</style><p>{Cy} {missing} {</p>"
        );
    }

    #[test]
    fn test_load_falls_back() {
        let template = EmailTemplate::load(Path::new("/nonexistent/email_template.html"));
        let html = template.render_with_map(&values(&[("name", "Ann")]));
        assert!(html.contains("Hello Ann"));
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("email_template.html");
        fs::write(&path, "<b>{name}</b>").unwrap();

        let template = EmailTemplate::load(&path);
        assert_eq!(template.render_with_map(&values(&[("name", "Cy")])), "<b>Cy</b>");
    }
}
