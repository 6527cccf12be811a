//! Input processing layer: key mapping and numeric prefix accumulator.
//!
//! Pure logic, no I/O. All functions are deterministic and testable.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

const MAX_COUNT: u32 = 9_999;

/// Accumulated numeric prefix for vim/less-style commands.
///
/// Users type digits then a command character: `5j` moves five rows down,
/// `3l` moves three items right.
pub(super) struct InputAccumulator {
    count: Option<u32>,
}

impl InputAccumulator {
    pub(super) fn new() -> Self {
        Self { count: None }
    }

    /// Feed a digit character ('0'..='9'). Returns false if overflow would occur.
    fn push_digit(&mut self, d: u32) -> bool {
        let current = self.count.unwrap_or(0);
        let new = current.saturating_mul(10).saturating_add(d);
        if new > MAX_COUNT {
            return false; // ignore further digits
        }
        self.count = Some(new);
        true
    }

    /// Take the accumulated count, resetting to None.
    fn take(&mut self) -> Option<u32> {
        self.count.take()
    }

    /// Peek at the current accumulated count without consuming it.
    pub(super) fn peek(&self) -> Option<u32> {
        self.count
    }

    pub(super) fn reset(&mut self) {
        self.count = None;
    }

    pub(super) fn is_active(&self) -> bool {
        self.count.is_some()
    }
}

/// Actions produced by normal-mode key input.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Action {
    Quit,
    Left(u32),
    Right(u32),
    Down(u32),
    Up(u32),
    JumpToTop,
    JumpToBottom,
    MoreColumns,
    FewerColumns,
    Retry,
    OpenSelected,
    ShowInfo,
    EnterCommand,
    CancelInput,
    /// A digit was accumulated; caller should redraw status bar.
    Digit,
}

/// Actions produced by command-mode key input.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum CommandAction {
    Type(char),
    Backspace,
    Execute,
    Cancel,
}

/// Map a key event to an `Action`, consuming/updating the accumulator as needed.
///
/// Returns `None` for unknown keys (caller should reset accumulator).
pub(super) fn map_key_event(key: KeyEvent, acc: &mut InputAccumulator) -> Option<Action> {
    let KeyEvent { code, modifiers, .. } = key;

    match (code, modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
            Some(Action::Quit)
        }

        // Esc: cancel pending input
        (KeyCode::Esc, _) => {
            acc.reset();
            Some(Action::CancelInput)
        }

        // Digits: accumulate
        (KeyCode::Char(c @ '0'..='9'), KeyModifiers::NONE) => {
            let d = c as u32 - '0' as u32;
            acc.push_digit(d);
            Some(Action::Digit)
        }

        (KeyCode::Char('h'), _) | (KeyCode::Left, _) => Some(Action::Left(acc.take().unwrap_or(1))),
        (KeyCode::Char('l'), _) | (KeyCode::Right, _) => {
            Some(Action::Right(acc.take().unwrap_or(1)))
        }
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(Action::Down(acc.take().unwrap_or(1))),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(Action::Up(acc.take().unwrap_or(1))),

        (KeyCode::Char('g'), _) | (KeyCode::Home, _) => {
            acc.reset();
            Some(Action::JumpToTop)
        }
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => {
            acc.reset();
            Some(Action::JumpToBottom)
        }

        (KeyCode::Char('+'), _) | (KeyCode::Char('='), _) => Some(Action::MoreColumns),
        (KeyCode::Char('-'), _) => Some(Action::FewerColumns),

        (KeyCode::Char('r'), _) => Some(Action::Retry),
        (KeyCode::Char('o'), _) | (KeyCode::Enter, _) => Some(Action::OpenSelected),
        (KeyCode::Char('i'), _) => Some(Action::ShowInfo),
        (KeyCode::Char(':'), _) => {
            acc.reset();
            Some(Action::EnterCommand)
        }

        _ => None,
    }
}

/// Map a key event in command mode.
pub(super) fn map_command_key(key: KeyEvent) -> Option<CommandAction> {
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
            Some(CommandAction::Cancel)
        }
        (KeyCode::Enter, _) => Some(CommandAction::Execute),
        (KeyCode::Backspace, _) => Some(CommandAction::Backspace),
        (KeyCode::Char(c), _) => Some(CommandAction::Type(c)),
        _ => None,
    }
}
