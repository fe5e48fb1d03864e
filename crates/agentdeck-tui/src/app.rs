use std::sync::Arc;

use agentdeck_core::{
    AlreadyConfirmed, ClientConfig, DeckError, SaveOutcome, SelectOutcome, SessionController,
    TraceTransport, TurnEnd, Update, WorkspaceBackend, WorkspaceManager,
};
use agentdeck_wire::{FileNode, Mode};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::text_buffer::TextBuffer;
use crate::tree_view::TreeView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Composer,
    Tree,
    Editor,
}

impl Focus {
    pub fn next(self) -> Self {
        match self {
            Focus::Composer => Focus::Tree,
            Focus::Tree => Focus::Editor,
            Focus::Editor => Focus::Composer,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Modal {
    ConfirmDiscard { next: FileNode },
    Notice { message: String, is_error: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    Char(char),
    Newline,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    CycleFocus,
    CycleMode,
    NewChat,
    RefreshTree,
    SaveFile,
    CancelTurn,
    Submit,
    Edit(Edit),
    TreeUp,
    TreeDown,
    TreeActivate,
    ConfirmDiscard(bool),
    DismissModal,
    ScrollUp,
    ScrollDown,
}

pub struct App {
    pub session: SessionController<dyn TraceTransport>,
    pub workspace: WorkspaceManager<dyn WorkspaceBackend>,
    pub mode: Mode,
    pub focus: Focus,
    pub modal: Option<Modal>,
    pub composer: TextBuffer,
    pub editor: TextBuffer,
    pub tree: TreeView,
    pub status: Option<String>,
    /// Lines scrolled up from the newest message.
    pub chat_scroll: u16,
    pub tick_count: usize,
    pub should_quit: bool,
}

impl App {
    pub fn new(
        transport: Arc<dyn TraceTransport>,
        files: Arc<dyn WorkspaceBackend>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            session: SessionController::new(transport)
                .with_stall_timeout(config.stall_timeout())
                .with_open_timeout(Some(config.request_timeout())),
            workspace: WorkspaceManager::new(files),
            mode: config.default_mode,
            focus: Focus::Composer,
            modal: None,
            composer: TextBuffer::new(),
            editor: TextBuffer::new(),
            tree: TreeView::new(),
            status: None,
            chat_scroll: 0,
            tick_count: 0,
            should_quit: false,
        }
    }

    pub fn handle_key_event(&self, key: KeyEvent) -> Option<Action> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }

        if let Some(modal) = &self.modal {
            return match modal {
                Modal::ConfirmDiscard { .. } => match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') => Some(Action::ConfirmDiscard(true)),
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                        Some(Action::ConfirmDiscard(false))
                    }
                    _ => None,
                },
                Modal::Notice { .. } => match key.code {
                    KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') => Some(Action::DismissModal),
                    _ => None,
                },
            };
        }

        if ctrl {
            return match key.code {
                KeyCode::Char('n') => Some(Action::NewChat),
                KeyCode::Char('r') => Some(Action::RefreshTree),
                KeyCode::Char('s') => Some(Action::SaveFile),
                _ => None,
            };
        }

        match key.code {
            KeyCode::Tab => return Some(Action::CycleFocus),
            KeyCode::F(2) => return Some(Action::CycleMode),
            KeyCode::Esc => {
                return self.session.is_active().then_some(Action::CancelTurn);
            }
            _ => {}
        }

        match self.focus {
            Focus::Tree => match key.code {
                KeyCode::Up | KeyCode::Char('k') => Some(Action::TreeUp),
                KeyCode::Down | KeyCode::Char('j') => Some(Action::TreeDown),
                KeyCode::Enter | KeyCode::Char(' ') => Some(Action::TreeActivate),
                _ => None,
            },
            Focus::Composer => match key.code {
                KeyCode::Enter
                    if key
                        .modifiers
                        .intersects(KeyModifiers::ALT | KeyModifiers::SHIFT) =>
                {
                    Some(Action::Edit(Edit::Newline))
                }
                KeyCode::Enter => Some(Action::Submit),
                KeyCode::PageUp => Some(Action::ScrollUp),
                KeyCode::PageDown => Some(Action::ScrollDown),
                code => edit_for(code).map(Action::Edit),
            },
            Focus::Editor => match key.code {
                KeyCode::Enter => Some(Action::Edit(Edit::Newline)),
                code => edit_for(code).map(Action::Edit),
            },
        }
    }

    pub async fn update(&mut self, action: Action) -> anyhow::Result<()> {
        match action {
            Action::Quit => self.should_quit = true,
            Action::CycleFocus => self.focus = self.focus.next(),
            Action::CycleMode => {
                self.mode = self.mode.next();
                self.status = Some(format!("Mode: {}", self.mode.label()));
            }
            Action::NewChat => {
                self.session.reset();
                self.composer.clear();
                self.chat_scroll = 0;
                self.status = Some("Started a new chat".to_string());
            }
            Action::RefreshTree => self.refresh_tree().await,
            Action::SaveFile => self.save().await,
            Action::CancelTurn => {
                if self.session.cancel() {
                    self.status = Some("Cancelled".to_string());
                }
            }
            Action::Submit => self.submit().await,
            Action::Edit(edit) => self.apply_edit(edit),
            Action::TreeUp => self.tree.move_up(),
            Action::TreeDown => self.tree.move_down(self.workspace.tree()),
            Action::TreeActivate => self.activate_tree_row().await,
            Action::ConfirmDiscard(confirmed) => {
                if let Some(Modal::ConfirmDiscard { next }) = self.modal.take() {
                    if confirmed {
                        self.open_file(&next).await;
                    }
                }
            }
            Action::DismissModal => self.modal = None,
            Action::ScrollUp => self.chat_scroll = self.chat_scroll.saturating_add(3),
            Action::ScrollDown => self.chat_scroll = self.chat_scroll.saturating_sub(3),
        }
        Ok(())
    }

    pub fn on_stream_update(&mut self, update: Update) {
        match update {
            Update::Appended(_) => self.chat_scroll = 0,
            Update::Finished(end) => {
                self.status = match end {
                    TurnEnd::Completed => None,
                    TurnEnd::AgentError => Some("The agent reported an error".to_string()),
                    TurnEnd::TransportFailed => Some("Connection to the agent was lost".to_string()),
                    TurnEnd::Stalled => Some("The agent stopped responding".to_string()),
                    TurnEnd::Cancelled => Some("Cancelled".to_string()),
                };
            }
            Update::Skipped | Update::Ignored => {}
        }
    }

    pub fn tick(&mut self) {
        self.tick_count = self.tick_count.wrapping_add(1);
    }

    pub async fn refresh_tree(&mut self) {
        let refreshed = self.workspace.refresh_tree().await.map(|_| ());
        match refreshed {
            Ok(()) => self.tree.reconcile(self.workspace.tree()),
            Err(e) => self.status = Some(format!("Failed to load file tree: {e}")),
        }
    }

    async fn submit(&mut self) {
        if self.session.is_active() {
            self.status = Some("The agent is still working".to_string());
            return;
        }
        if self.composer.text().trim().is_empty() {
            return;
        }
        let text = self.composer.take();
        self.chat_scroll = 0;
        match self.session.send(&text, self.mode).await {
            Ok(()) => self.status = None,
            Err(DeckError::EmptyPrompt) | Err(DeckError::TurnInFlight) => {
                self.composer.set_text(text);
            }
            Err(e) => self.status = Some(format!("Failed to reach the agent: {e}")),
        }
    }

    fn apply_edit(&mut self, edit: Edit) {
        match self.focus {
            Focus::Composer => {
                if !self.session.is_active() {
                    apply_to(&mut self.composer, edit);
                }
            }
            Focus::Editor => {
                if self.workspace.selected().is_none() {
                    return;
                }
                if apply_to(&mut self.editor, edit) {
                    self.workspace.edit(self.editor.text());
                }
            }
            Focus::Tree => {}
        }
    }

    async fn activate_tree_row(&mut self) {
        let Some(node) = self.tree.current(self.workspace.tree()).cloned() else {
            return;
        };
        if node.is_dir() {
            self.tree.toggle(&node.path);
        } else if self.workspace.is_dirty() {
            self.modal = Some(Modal::ConfirmDiscard { next: node });
        } else {
            self.open_file(&node).await;
        }
    }

    // The discard question was already answered through the modal.
    async fn open_file(&mut self, node: &FileNode) {
        match self.workspace.select_file(node, &mut AlreadyConfirmed).await {
            Ok(SelectOutcome::Loaded) => {
                self.editor.set_text(self.workspace.content());
                self.focus = Focus::Editor;
                self.status = Some(format!("Opened {}", node.path));
            }
            Ok(SelectOutcome::Declined) => {}
            Err(e) => self.status = Some(format!("Failed to open {}: {e}", node.path)),
        }
    }

    async fn save(&mut self) {
        match self.workspace.save().await {
            Ok(SaveOutcome::Saved) => {
                self.modal = Some(Modal::Notice {
                    message: "File saved!".to_string(),
                    is_error: false,
                });
            }
            Ok(SaveOutcome::NothingSelected) => {
                self.status = Some("No file is open".to_string());
            }
            Err(e) => {
                self.modal = Some(Modal::Notice {
                    message: format!("Failed to save file: {e}"),
                    is_error: true,
                });
            }
        }
    }
}

fn edit_for(code: KeyCode) -> Option<Edit> {
    match code {
        KeyCode::Char(c) => Some(Edit::Char(c)),
        KeyCode::Backspace => Some(Edit::Backspace),
        KeyCode::Delete => Some(Edit::Delete),
        KeyCode::Left => Some(Edit::Left),
        KeyCode::Right => Some(Edit::Right),
        KeyCode::Up => Some(Edit::Up),
        KeyCode::Down => Some(Edit::Down),
        KeyCode::Home => Some(Edit::Home),
        KeyCode::End => Some(Edit::End),
        _ => None,
    }
}

/// Returns true when the text changed.
fn apply_to(buffer: &mut TextBuffer, edit: Edit) -> bool {
    match edit {
        Edit::Char(c) => {
            buffer.insert_char(c);
            true
        }
        Edit::Newline => {
            buffer.insert_newline();
            true
        }
        Edit::Backspace => buffer.backspace(),
        Edit::Delete => buffer.delete_forward(),
        Edit::Left => {
            buffer.move_left();
            false
        }
        Edit::Right => {
            buffer.move_right();
            false
        }
        Edit::Up => {
            buffer.move_up();
            false
        }
        Edit::Down => {
            buffer.move_down();
            false
        }
        Edit::Home => {
            buffer.move_home();
            false
        }
        Edit::End => {
            buffer.move_end();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdeck_core::{SignalStream, StreamRequest};
    use agentdeck_wire::SaveFileRequest;
    use async_trait::async_trait;
    use futures::{stream, StreamExt};
    use std::collections::HashMap;

    struct Silent;

    #[async_trait]
    impl TraceTransport for Silent {
        async fn open_stream(&self, _request: &StreamRequest) -> agentdeck_core::Result<SignalStream> {
            Ok(stream::pending().boxed())
        }
    }

    struct Files(HashMap<String, String>);

    #[async_trait]
    impl WorkspaceBackend for Files {
        async fn fetch_tree(&self) -> agentdeck_core::Result<Vec<FileNode>> {
            let mut paths: Vec<&String> = self.0.keys().collect();
            paths.sort();
            Ok(paths
                .into_iter()
                .map(|path| FileNode::file(path.trim_start_matches('/'), path.as_str()))
                .collect())
        }

        async fn fetch_content(&self, path: &str) -> agentdeck_core::Result<String> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| DeckError::NotAFile(path.to_string()))
        }

        async fn save_file(&self, _request: &SaveFileRequest) -> agentdeck_core::Result<()> {
            Ok(())
        }
    }

    fn app() -> App {
        let files = Files(HashMap::from([
            ("/a.py".to_string(), "a = 1\n".to_string()),
            ("/b.css".to_string(), "body {}\n".to_string()),
        ]));
        App::new(Arc::new(Silent), Arc::new(files), &ClientConfig::default())
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn global_keys_map_to_actions() {
        let app = app();
        assert_eq!(app.handle_key_event(ctrl('c')), Some(Action::Quit));
        assert_eq!(app.handle_key_event(ctrl('s')), Some(Action::SaveFile));
        assert_eq!(app.handle_key_event(key(KeyCode::Tab)), Some(Action::CycleFocus));
        assert_eq!(app.handle_key_event(key(KeyCode::F(2))), Some(Action::CycleMode));
        assert_eq!(app.handle_key_event(key(KeyCode::Esc)), None);
        assert_eq!(app.handle_key_event(key(KeyCode::Enter)), Some(Action::Submit));
    }

    #[test]
    fn modal_captures_keys() {
        let mut app = app();
        app.modal = Some(Modal::ConfirmDiscard {
            next: FileNode::file("b.css", "/b.css"),
        });
        assert_eq!(
            app.handle_key_event(key(KeyCode::Char('y'))),
            Some(Action::ConfirmDiscard(true))
        );
        assert_eq!(
            app.handle_key_event(key(KeyCode::Esc)),
            Some(Action::ConfirmDiscard(false))
        );
        assert_eq!(app.handle_key_event(key(KeyCode::Tab)), None);
        assert_eq!(app.handle_key_event(ctrl('c')), Some(Action::Quit));
    }

    #[tokio::test]
    async fn submit_disables_composer_until_turn_ends() {
        let mut app = app();
        for c in "list files".chars() {
            app.update(Action::Edit(Edit::Char(c))).await.unwrap();
        }
        app.update(Action::Submit).await.unwrap();

        assert!(app.session.is_active());
        assert!(app.composer.is_empty());
        assert_eq!(app.session.messages().len(), 1);
        assert_eq!(app.handle_key_event(key(KeyCode::Esc)), Some(Action::CancelTurn));

        app.update(Action::Edit(Edit::Char('x'))).await.unwrap();
        assert!(app.composer.is_empty());

        app.update(Action::CancelTurn).await.unwrap();
        assert!(!app.session.is_active());
        assert_eq!(app.session.messages().len(), 1);
    }

    #[tokio::test]
    async fn dirty_buffer_asks_before_switching_files() {
        let mut app = app();
        app.refresh_tree().await;
        app.focus = Focus::Tree;
        app.update(Action::TreeActivate).await.unwrap();
        assert_eq!(app.workspace.selected().map(|n| n.path.as_str()), Some("/a.py"));
        assert_eq!(app.focus, Focus::Editor);

        app.update(Action::Edit(Edit::Home)).await.unwrap();
        assert!(!app.workspace.is_dirty());
        app.update(Action::Edit(Edit::Char('#'))).await.unwrap();
        assert!(app.workspace.is_dirty());
        assert_eq!(app.workspace.content(), "#a = 1\n");

        app.focus = Focus::Tree;
        app.update(Action::TreeDown).await.unwrap();
        app.update(Action::TreeActivate).await.unwrap();
        assert!(matches!(app.modal, Some(Modal::ConfirmDiscard { .. })));

        app.update(Action::ConfirmDiscard(false)).await.unwrap();
        assert!(app.modal.is_none());
        assert_eq!(app.workspace.selected().map(|n| n.path.as_str()), Some("/a.py"));
        assert!(app.workspace.is_dirty());

        app.update(Action::TreeActivate).await.unwrap();
        app.update(Action::ConfirmDiscard(true)).await.unwrap();
        assert_eq!(app.workspace.selected().map(|n| n.path.as_str()), Some("/b.css"));
        assert_eq!(app.editor.text(), "body {}\n");
        assert!(!app.workspace.is_dirty());
    }

    #[tokio::test]
    async fn save_reports_through_notice() {
        let mut app = app();
        app.update(Action::SaveFile).await.unwrap();
        assert!(app.modal.is_none());

        app.refresh_tree().await;
        app.focus = Focus::Tree;
        app.update(Action::TreeActivate).await.unwrap();
        app.update(Action::Edit(Edit::Char('x'))).await.unwrap();
        app.update(Action::SaveFile).await.unwrap();
        assert_eq!(
            app.modal,
            Some(Modal::Notice {
                message: "File saved!".to_string(),
                is_error: false
            })
        );
        assert!(!app.workspace.is_dirty());
    }
}
