use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    File,
    Directory,
}

/// A node of the remote workspace tree. `path` is the stable identifier used for
/// content fetches and as the reconciliation key in views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

impl FileNode {
    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: FileKind::File,
            children: None,
        }
    }

    pub fn directory(
        name: impl Into<String>,
        path: impl Into<String>,
        children: Vec<FileNode>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: FileKind::Directory,
            children: Some(children),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn children(&self) -> &[FileNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Depth-first lookup by path across a forest.
    pub fn find<'a>(forest: &'a [FileNode], path: &str) -> Option<&'a FileNode> {
        for node in forest {
            if node.path == path {
                return Some(node);
            }
            if let Some(found) = FileNode::find(node.children(), path) {
                return Some(found);
            }
        }
        None
    }

    /// Pre-order walk of a forest, yielding each node with its depth.
    pub fn walk(forest: &[FileNode]) -> Vec<(usize, &FileNode)> {
        let mut out = Vec::new();
        let mut stack: Vec<(usize, &FileNode)> = forest.iter().rev().map(|n| (0, n)).collect();
        while let Some((depth, node)) = stack.pop() {
            out.push((depth, node));
            for child in node.children().iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContentResponse {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveFileRequest {
    pub path: String,
    pub content: String,
}

/// Save acknowledgement. The backend may answer with an empty body, so every
/// field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveFileResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "message")]
    pub detail: Option<String>,
}

impl SaveFileResponse {
    pub fn is_rejection(&self) -> bool {
        self.status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("error") || s.eq_ignore_ascii_case("failed"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_nested_forest() {
        let raw = r#"[
            {"name":"a.py","path":"/a.py","type":"file"},
            {"name":"src","path":"/src","type":"directory","children":[
                {"name":"main.ts","path":"/src/main.ts","type":"file"}
            ]}
        ]"#;
        let forest: Vec<FileNode> = serde_json::from_str(raw).expect("forest");
        assert_eq!(forest.len(), 2);
        assert!(!forest[0].is_dir());
        assert!(forest[0].children.is_none());
        assert_eq!(forest[1].children().len(), 1);

        let found = FileNode::find(&forest, "/src/main.ts").expect("nested lookup");
        assert_eq!(found.name, "main.ts");
        assert!(FileNode::find(&forest, "/missing").is_none());
    }

    #[test]
    fn walk_is_preorder_with_depth() {
        let forest = vec![
            FileNode::directory(
                "src",
                "/src",
                vec![
                    FileNode::file("lib.rs", "/src/lib.rs"),
                    FileNode::directory("ui", "/src/ui", vec![FileNode::file("mod.rs", "/src/ui/mod.rs")]),
                ],
            ),
            FileNode::file("README.md", "/README.md"),
        ];
        let order: Vec<(usize, &str)> = FileNode::walk(&forest)
            .into_iter()
            .map(|(depth, node)| (depth, node.path.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (0, "/src"),
                (1, "/src/lib.rs"),
                (1, "/src/ui"),
                (2, "/src/ui/mod.rs"),
                (0, "/README.md"),
            ]
        );
    }

    #[test]
    fn save_response_detects_rejection() {
        let ok: SaveFileResponse = serde_json::from_str(r#"{"status":"success"}"#).expect("ok");
        assert!(!ok.is_rejection());
        let rejected: SaveFileResponse =
            serde_json::from_str(r#"{"status":"error","message":"read-only"}"#).expect("err");
        assert!(rejected.is_rejection());
        assert_eq!(rejected.detail.as_deref(), Some("read-only"));
    }
}
