//! Keyboard selection over a growing result list.
//!
//! `index == -1` means nothing is selected and the search input owns focus.
//! Only moving down leaves that state; moving up from it does nothing.
//! Item counts are supplied by the caller on every transition so the bound is
//! always the list length at the time of the keypress.

use crate::{
    keys::{KeyCode, KeyEvent, Modifiers},
    types::{Movement, ScrollAlign, ViewCommand},
};

pub const UNSELECTED: isize = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    index: isize,
    last_movement: Movement,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            index: UNSELECTED,
            last_movement: Movement::None,
        }
    }
}

impl Selection {
    pub fn index(&self) -> isize {
        self.index
    }

    pub fn selected(&self) -> Option<usize> {
        usize::try_from(self.index).ok()
    }

    pub fn is_selected(&self) -> bool {
        self.index > UNSELECTED
    }

    pub fn last_movement(&self) -> Movement {
        self.last_movement
    }

    pub fn move_up(&mut self) -> Vec<ViewCommand> {
        self.last_movement = Movement::Up;
        if self.index > UNSELECTED {
            self.goto(self.index - 1)
        } else {
            Vec::new()
        }
    }

    pub fn move_down(&mut self, count: usize) -> Vec<ViewCommand> {
        self.last_movement = Movement::Down;
        let last = count as isize - 1;
        if self.index < last {
            self.goto(self.index + 1)
        } else {
            Vec::new()
        }
    }

    /// Direct selection, e.g. from a row click.
    pub fn select(&mut self, index: usize, count: usize) -> Vec<ViewCommand> {
        if index >= count {
            return Vec::new();
        }
        self.goto(index as isize)
    }

    pub fn reset(&mut self) -> Vec<ViewCommand> {
        self.last_movement = Movement::None;
        self.goto(UNSELECTED)
    }

    /// Pulls the index back inside `[-1, count - 1]` after the list shrank.
    pub fn clamp(&mut self, count: usize) -> Vec<ViewCommand> {
        let last = count as isize - 1;
        if self.index > last {
            self.goto(last)
        } else {
            Vec::new()
        }
    }

    /// Maps navigation keys to transitions. `j`/`k` only count while something
    /// is selected so they can still be typed into the search input.
    pub fn handle_key(&mut self, event: &KeyEvent, count: usize) -> Option<Vec<ViewCommand>> {
        let plain = event.modifiers.is_none();
        let ctrl = event.modifiers == Modifiers::CTRL;
        let selected = self.is_selected();
        match event.code {
            KeyCode::ArrowUp if plain => Some(self.move_up()),
            KeyCode::Char('k') if plain && selected => Some(self.move_up()),
            KeyCode::Char('p') if ctrl => Some(self.move_up()),
            KeyCode::ArrowDown if plain => Some(self.move_down(count)),
            KeyCode::Char('j') if plain && selected => Some(self.move_down(count)),
            KeyCode::Char('n') if ctrl => Some(self.move_down(count)),
            _ => None,
        }
    }

    fn goto(&mut self, index: isize) -> Vec<ViewCommand> {
        if index == self.index {
            return Vec::new();
        }
        self.index = index;
        match self.selected() {
            None => vec![ViewCommand::FocusInput],
            Some(index) => {
                let align = match self.last_movement {
                    Movement::Up => ScrollAlign::End,
                    Movement::Down | Movement::None => ScrollAlign::Start,
                };
                vec![
                    ViewCommand::BlurInput,
                    ViewCommand::ScrollIntoView { index, align },
                ]
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
