//! Human-readable pages served by the gateway itself.

use std::fmt::Debug;

/// Content of an HTML page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub title: String,
    pub description: String,
    pub subtext: Option<String>,
}

impl Page {
    pub fn error(description: &str, code: Option<&str>) -> Self {
        Self {
            title: "An error occurred".to_string(),
            description: description.to_string(),
            subtext: code.map(|code| format!("(Error: {code})")),
        }
    }

    pub fn logout() -> Self {
        Self {
            title: "Logout successful".to_string(),
            description: "You may now close this tab".to_string(),
            subtext: Some("Thank you!".to_string()),
        }
    }
}

/// Renders [`Page`]s to complete HTML documents.
pub trait TemplateRenderer: Send + Sync + Debug {
    fn render(&self, page: &Page) -> String;

    fn error_page(&self, description: &str, code: Option<&str>) -> String {
        self.render(&Page::error(description, code))
    }

    fn logout_page(&self) -> String {
        self.render(&Page::logout())
    }
}

/// Minimal Bootstrap-styled page.
#[derive(Clone, Debug, Default)]
pub struct DefaultTemplate;

impl TemplateRenderer for DefaultTemplate {
    fn render(&self, page: &Page) -> String {
        let title = escape_html(&page.title);

        let mut content = String::new();
        if !page.title.is_empty() {
            content.push_str(&format!(
                "<h1 class=\"h4 mb-3 font-weight-normal\">{title}</h1>\n"
            ));
        }
        if !page.description.is_empty() {
            content.push_str(&format!("    <p>{}</p>\n", escape_html(&page.description)));
        }
        if let Some(subtext) = page.subtext.as_deref().filter(|subtext| !subtext.is_empty()) {
            content.push_str(&format!(
                "    <p class=\"text-muted text-small\">{}</p>\n",
                escape_html(subtext)
            ));
        }

        format!(
            r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0, user-scalable=no" />
  <meta name="robots" content="noindex, nofollow, nocache, noimageindex"/>
  <title>{title}</title>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@4/dist/css/bootstrap.min.css" crossorigin="anonymous" />
</head>
<body class="flex-column">
  <div class="text-center mx-auto my-5 px-3" style="max-width: 512px;">
    {content}  </div>
</body>
</html>
"#
        )
    }
}

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_page() {
        let html = DefaultTemplate.error_page("Something went really wrong", Some("invalid_request"));

        assert!(html.contains("<title>An error occurred</title>"));
        assert!(html.contains("<p>Something went really wrong</p>"));
        assert!(html.contains("(Error: invalid_request)"));
    }

    #[test]
    fn test_error_page_without_code() {
        let html = DefaultTemplate.error_page("Something went wrong", None);

        assert!(!html.contains("Error:"));
        assert!(!html.contains("text-muted"));
    }

    #[test]
    fn test_logout_page() {
        let html = DefaultTemplate.logout_page();

        assert!(html.contains("Logout successful"));
        assert!(html.contains("You may now close this tab"));
        assert!(html.contains("Thank you!"));
    }

    #[test]
    fn test_escapes_interpolated_text() {
        let html = DefaultTemplate.error_page("<script>alert('x')</script>", Some("a&b"));

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;"));
        assert!(html.contains("(Error: a&amp;b)"));
    }
}
