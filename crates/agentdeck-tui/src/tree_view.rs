use std::collections::HashSet;

use agentdeck_wire::FileNode;

/// One visible line of the file tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeRow<'a> {
    pub depth: usize,
    pub node: &'a FileNode,
    pub expanded: bool,
}

/// Expansion and cursor state of the file tree pane. Directories start
/// collapsed; expansion is remembered by path across refreshes.
#[derive(Debug, Clone, Default)]
pub struct TreeView {
    expanded: HashSet<String>,
    cursor: usize,
}

impl TreeView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.contains(path)
    }

    pub fn rows<'a>(&self, forest: &'a [FileNode]) -> Vec<TreeRow<'a>> {
        let mut rows = Vec::new();
        self.collect(forest, 0, &mut rows);
        rows
    }

    fn collect<'a>(&self, nodes: &'a [FileNode], depth: usize, rows: &mut Vec<TreeRow<'a>>) {
        for node in nodes {
            let expanded = node.is_dir() && self.is_expanded(&node.path);
            rows.push(TreeRow {
                depth,
                node,
                expanded,
            });
            if expanded {
                self.collect(node.children(), depth + 1, rows);
            }
        }
    }

    pub fn current<'a>(&self, forest: &'a [FileNode]) -> Option<&'a FileNode> {
        self.rows(forest).get(self.cursor).map(|row| row.node)
    }

    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_down(&mut self, forest: &[FileNode]) {
        let visible = self.rows(forest).len();
        if self.cursor + 1 < visible {
            self.cursor += 1;
        }
    }

    pub fn toggle(&mut self, path: &str) {
        if !self.expanded.remove(path) {
            self.expanded.insert(path.to_string());
        }
    }

    /// Drops expansion entries for paths that no longer exist and keeps the
    /// cursor inside the visible rows.
    pub fn reconcile(&mut self, forest: &[FileNode]) {
        self.expanded
            .retain(|path| FileNode::find(forest, path).is_some_and(FileNode::is_dir));
        let visible = self.rows(forest).len();
        self.cursor = self.cursor.min(visible.saturating_sub(1));
    }
}
