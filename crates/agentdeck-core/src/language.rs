use std::path::Path;

/// Syntax mode for the editor pane, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EditorLanguage {
    Python,
    TypeScript,
    JavaScript,
    Html,
    Css,
    Json,
    #[default]
    PlainText,
}

impl EditorLanguage {
    pub fn from_filename(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("py") => EditorLanguage::Python,
            Some("ts") | Some("tsx") => EditorLanguage::TypeScript,
            Some("js") | Some("jsx") => EditorLanguage::JavaScript,
            Some("html") => EditorLanguage::Html,
            Some("css") => EditorLanguage::Css,
            Some("json") => EditorLanguage::Json,
            _ => EditorLanguage::PlainText,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EditorLanguage::Python => "python",
            EditorLanguage::TypeScript => "typescript",
            EditorLanguage::JavaScript => "javascript",
            EditorLanguage::Html => "html",
            EditorLanguage::Css => "css",
            EditorLanguage::Json => "json",
            EditorLanguage::PlainText => "plaintext",
        }
    }
}

impl std::fmt::Display for EditorLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
