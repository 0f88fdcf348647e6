//! Search panel controller: query inputs, selection, shortcuts and the
//! command queue the presentation adapter drains after every interaction.

use std::sync::Arc;

use shared::domain::{ResultItem, SortMode};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
    keys::{DispatchOutcome, KeyCode, KeyDispatcher, KeyEvent, SubscriptionHandle},
    pagination::{LoadOutcome, Pager, ResultView},
    selection::Selection,
    types::{QuerySignature, ViewCommand},
};

/// Selection navigation runs ahead of item shortcuts.
pub const NAVIGATION_PRIORITY: i32 = 10;
pub const SHORTCUT_PRIORITY: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelStats {
    pub count: usize,
    pub show_sort: bool,
}

/// Everything key handlers may read or change.
pub struct PanelState {
    pager: Arc<Pager>,
    query: String,
    tags: Vec<String>,
    sort: SortMode,
    selection: Selection,
    menu_open: bool,
    commands: Vec<ViewCommand>,
}

impl PanelState {
    fn new(pager: Arc<Pager>) -> Self {
        let signature = pager.signature();
        Self {
            query: signature.text().to_string(),
            tags: signature.tags().map(str::to_owned).collect(),
            sort: signature.sort(),
            pager,
            selection: Selection::default(),
            menu_open: false,
            commands: Vec::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn sort(&self) -> SortMode {
        self.sort
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_menu_open(&self) -> bool {
        self.menu_open
    }

    pub fn signature(&self) -> QuerySignature {
        QuerySignature::new(&self.query, self.tags.iter().cloned(), self.sort)
    }

    /// Visible item count at this instant.
    pub fn count(&self) -> usize {
        self.pager.visible_len()
    }

    pub fn selected_item(&self) -> Option<ResultItem> {
        self.selection
            .selected()
            .and_then(|index| self.pager.item(index))
    }

    pub fn set_query(&mut self, text: &str) {
        self.query = text.to_string();
        self.retarget();
    }

    pub fn add_tag(&mut self, tag: &str) {
        if self.tags.iter().any(|existing| existing == tag) {
            return;
        }
        self.tags.push(tag.to_string());
        self.retarget();
    }

    pub fn remove_tag(&mut self, tag: &str) {
        let before = self.tags.len();
        self.tags.retain(|existing| existing != tag);
        if before != self.tags.len() {
            self.retarget();
        }
    }

    pub fn set_sort(&mut self, sort: SortMode) {
        self.sort = sort;
        self.retarget();
    }

    /// Clears text and tags and returns focus to the input.
    pub fn reset_query(&mut self) {
        self.query.clear();
        self.tags.clear();
        self.pager.set_signature(self.signature());
        self.restart_list();
    }

    pub fn on_input_focus(&mut self) {
        let commands = self.selection.reset();
        self.commands.extend(commands);
    }

    pub fn on_row_click(&mut self, index: usize) {
        let count = self.clamp_selection();
        let commands = self.selection.select(index, count);
        self.commands.extend(commands);
    }

    /// Pulls a selection past the visible items back in range and returns
    /// the count it was checked against.
    fn clamp_selection(&mut self) -> usize {
        let count = self.count();
        let commands = self.selection.clamp(count);
        self.commands.extend(commands);
        count
    }

    fn retarget(&mut self) {
        if self.pager.set_signature(self.signature()) {
            self.restart_list();
        }
    }

    fn restart_list(&mut self) {
        let commands = self.selection.reset();
        self.commands.extend(commands);
        self.commands.push(ViewCommand::ScrollToTop);
    }
}

fn navigate(state: &mut PanelState, event: &KeyEvent) -> bool {
    if state.menu_open {
        return false;
    }
    let count = state.clamp_selection();
    match state.selection.handle_key(event, count) {
        Some(commands) => {
            state.commands.extend(commands);
            true
        }
        None => false,
    }
}

fn item_shortcut(state: &mut PanelState, event: &KeyEvent) -> bool {
    if state.menu_open || !event.modifiers.is_none() {
        return false;
    }
    state.clamp_selection();
    let Some(item) = state.selected_item() else {
        return false;
    };
    let command = match event.code {
        KeyCode::Enter => ViewCommand::OpenFile { path: item.path },
        KeyCode::Char('f') => ViewCommand::OpenContainingFolder { path: item.path },
        KeyCode::Char('c') => ViewCommand::CopyToClipboard {
            text: item.path.display().to_string(),
        },
        KeyCode::Escape => {
            state.reset_query();
            return true;
        }
        _ => return false,
    };
    debug!(?command, "item shortcut");
    state.commands.push(command);
    true
}

/// Must be created inside a tokio runtime: the first page is reloaded after
/// every cache flush for as long as the panel lives.
pub struct SearchPanel {
    state: PanelState,
    keys: KeyDispatcher<PanelState>,
    reload_task: JoinHandle<()>,
}

impl SearchPanel {
    pub fn new(pager: Arc<Pager>) -> Self {
        let mut keys = KeyDispatcher::new();
        keys.register(NAVIGATION_PRIORITY, navigate);
        keys.register(SHORTCUT_PRIORITY, item_shortcut);
        let reload_task = pager.spawn_reload_on_flush();
        Self {
            state: PanelState::new(pager),
            keys,
            reload_task,
        }
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn pager(&self) -> Arc<Pager> {
        Arc::clone(&self.state.pager)
    }

    pub fn set_query(&mut self, text: &str) {
        self.state.set_query(text);
    }

    pub fn add_tag(&mut self, tag: &str) {
        self.state.add_tag(tag);
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.state.remove_tag(tag);
    }

    pub fn set_sort(&mut self, sort: SortMode) {
        self.state.set_sort(sort);
    }

    pub fn reset_query(&mut self) {
        self.state.reset_query();
    }

    pub fn on_input_focus(&mut self) {
        self.state.on_input_focus();
    }

    pub fn on_row_click(&mut self, index: usize) {
        self.state.on_row_click(index);
    }

    pub fn set_menu_open(&mut self, open: bool) {
        self.state.menu_open = open;
    }

    pub fn handle_key(&mut self, event: KeyEvent) -> DispatchOutcome {
        self.keys.dispatch(&mut self.state, event)
    }

    /// Adds a handler next to the built-in ones, e.g. an app-wide shortcut.
    pub fn register_key_handler(
        &mut self,
        priority: i32,
        handler: impl FnMut(&mut PanelState, &KeyEvent) -> bool + Send + 'static,
    ) -> SubscriptionHandle {
        self.keys.register(priority, handler)
    }

    pub fn unregister_key_handler(&mut self, handle: SubscriptionHandle) -> bool {
        self.keys.unregister(handle)
    }

    pub fn drain_commands(&mut self) -> Vec<ViewCommand> {
        std::mem::take(&mut self.state.commands)
    }

    pub async fn load_first(&self) -> LoadOutcome {
        self.state.pager.load_first().await
    }

    pub async fn on_end_reached(&self) -> LoadOutcome {
        self.state.pager.on_end_reached().await
    }

    /// Current list contents. A selection beyond the visible items is pulled
    /// back first.
    pub fn view(&mut self) -> ResultView {
        let view = self.state.pager.view();
        let commands = self.state.selection.clamp(view.items.len());
        self.state.commands.extend(commands);
        view
    }

    pub fn stats(&self) -> PanelStats {
        let count = self
            .state
            .pager
            .cache()
            .entry(&self.state.pager.signature())
            .map_or(0, |entry| entry.total_count());
        PanelStats {
            count,
            show_sort: !self.state.query.trim().is_empty() && count > 0,
        }
    }
}

impl Drop for SearchPanel {
    fn drop(&mut self) {
        self.reload_task.abort();
    }
}

#[cfg(test)]
#[path = "tests/panel_tests.rs"]
mod tests;
