//! Key event routing.
//!
//! Every physical keypress is dispatched once. Handlers run from the highest
//! priority down (later registrations first among equals) until one consumes
//! the event.

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// Printable character, lowercase for letter keys
    Char(char),
    ArrowUp,
    ArrowDown,
    Enter,
    Escape,
    Other,
}

impl KeyCode {
    /// Parses DOM-style physical key codes (`ArrowUp`, `KeyJ`, `Digit1`, ...).
    pub fn from_code(code: &str) -> Self {
        match code {
            "ArrowUp" => KeyCode::ArrowUp,
            "ArrowDown" => KeyCode::ArrowDown,
            "Enter" | "NumpadEnter" => KeyCode::Enter,
            "Escape" => KeyCode::Escape,
            "Space" => KeyCode::Char(' '),
            _ => {
                let single = code
                    .strip_prefix("Key")
                    .or_else(|| code.strip_prefix("Digit"))
                    .filter(|rest| rest.chars().count() == 1)
                    .and_then(|rest| rest.chars().next());
                match single {
                    Some(c) => KeyCode::Char(c.to_ascii_lowercase()),
                    None => KeyCode::Other,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
    };
    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        shift: false,
    };

    pub fn is_none(&self) -> bool {
        !self.ctrl && !self.shift
    }
}

/// Where the key event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyTarget {
    TextInput,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
    pub target: KeyTarget,
}

impl KeyEvent {
    pub fn new(code: KeyCode, modifiers: Modifiers, target: KeyTarget) -> Self {
        Self {
            code,
            modifiers,
            target,
        }
    }

    pub fn plain(code: KeyCode) -> Self {
        Self::new(code, Modifiers::NONE, KeyTarget::Other)
    }

    pub fn in_input(code: KeyCode) -> Self {
        Self::new(code, Modifiers::NONE, KeyTarget::TextInput)
    }

    pub fn ctrl(code: KeyCode) -> Self {
        Self::new(code, Modifiers::CTRL, KeyTarget::Other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub consumed: bool,
    /// The adapter must cancel the platform's default action (typing, beeps).
    pub suppress_native: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

/// Returns `true` when the key was consumed.
pub type KeyHandler<C> = Box<dyn FnMut(&mut C, &KeyEvent) -> bool + Send>;

struct Registration<C> {
    handle: SubscriptionHandle,
    priority: i32,
    handler: KeyHandler<C>,
}

pub struct KeyDispatcher<C> {
    // Kept sorted in invocation order.
    registrations: Vec<Registration<C>>,
    next_id: u64,
}

impl<C> Default for KeyDispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> KeyDispatcher<C> {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            next_id: 0,
        }
    }

    pub fn register(
        &mut self,
        priority: i32,
        handler: impl FnMut(&mut C, &KeyEvent) -> bool + Send + 'static,
    ) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_id);
        self.next_id += 1;
        // Insert ahead of every registration with the same or lower priority.
        let position = self
            .registrations
            .iter()
            .position(|existing| existing.priority <= priority)
            .unwrap_or(self.registrations.len());
        self.registrations.insert(
            position,
            Registration {
                handle,
                priority,
                handler: Box::new(handler),
            },
        );
        handle
    }

    pub fn unregister(&mut self, handle: SubscriptionHandle) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.handle != handle);
        before != self.registrations.len()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn dispatch(&mut self, ctx: &mut C, event: KeyEvent) -> DispatchOutcome {
        let consumed = self
            .registrations
            .iter_mut()
            .any(|registration| (registration.handler)(ctx, &event));
        let suppress_native = consumed || event.target != KeyTarget::TextInput;
        trace!(code = ?event.code, consumed, suppress_native, "key dispatched");
        DispatchOutcome {
            consumed,
            suppress_native,
        }
    }
}

#[cfg(test)]
#[path = "tests/keys_tests.rs"]
mod tests;
