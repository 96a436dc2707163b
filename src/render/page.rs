use crate::render::html::escape;
use serde::Serialize;

const CLIENT_SCRIPT: &str = include_str!("assets/tabula.js");

/// Browser behaviour of the views: create/update form submission, inline cell and toggle
/// updates, rich-text editor start-up. Requests go to `<base_path>/add` and `<base_path>/update`.
pub fn client_script(base_path: &str) -> String {
    format!(
        "<script>window.tabulaBase = {};</script>\n<script>\n{}</script>",
        serde_json::Value::String(base_path.to_string()),
        CLIENT_SCRIPT
    )
}

/// Rendered view: title, auxiliary head tags and body content.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Page {
    pub title: String,
    pub header_tags: Vec<String>,
    pub content: String,
}

impl Page {
    /// Standalone HTML document for callers without their own layout.
    pub fn to_document(&self) -> String {
        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
             <title>{title}</title>\n\
             <link href=\"https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css\" rel=\"stylesheet\">\n\
             <link href=\"https://cdn.jsdelivr.net/npm/bootstrap-icons@1.11.3/font/bootstrap-icons.min.css\" rel=\"stylesheet\">\n\
             {head}\n</head>\n<body>\n<div class=\"container-fluid mt-3\">\n{content}\n</div>\n\
             <script src=\"https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/js/bootstrap.bundle.min.js\"></script>\n\
             </body>\n</html>\n",
            title = escape(&self.title),
            head = self.header_tags.join("\n"),
            content = self.content
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_contains_parts() {
        let page = Page {
            title: "Orders & Co".into(),
            header_tags: vec!["<script>1</script>".into()],
            content: "<table></table>".into(),
        };
        let doc = page.to_document();
        assert!(doc.contains("<title>Orders &amp; Co</title>"));
        assert!(doc.contains("<script>1</script>"));
        assert!(doc.contains("<table></table>"));
    }

    #[test]
    fn client_script_targets_base_path() {
        let tag = client_script("/admin");
        assert!(tag.starts_with("<script>window.tabulaBase = \"/admin\";</script>"));
        assert!(tag.contains("getElementById(\"addForm\")"));
        assert!(tag.contains("getElementById(\"saveButton\")"));
        assert!(tag.contains("window.tabulaEditors"));
        assert!(tag.contains("post(\"/update\""));
        assert!(tag.trim_end().ends_with("</script>"));
    }
}
