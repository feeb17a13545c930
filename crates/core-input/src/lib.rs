//! core-input: terminal events as command keys.
//!
//! Maps crossterm key and mouse events onto the normative key-event
//! strings (`C-Chr-x`, `Return`, `M:Press-1`, …) so a terminal driver
//! can dispatch them without knowing anything about the encoding.
//! Returns `None` for events the vocabulary does not cover (media keys,
//! focus changes, key releases); the driver drops those.

use core_comm::keyname::{KeyName, MouseAction, NamedKey};
use crossterm::event::{
    Event as CEvent, KeyCode as CKeyCode, KeyEvent as CKeyEvent, KeyEventKind as CKeyEventKind,
    KeyModifiers as CKeyModifiers, MouseButton as CMouseButton, MouseEvent as CMouseEvent,
    MouseEventKind as CMouseEventKind,
};
use tracing::trace;

/// A translated event: the key string plus, for mouse events, the
/// terminal cell it landed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    pub key: String,
    pub xy: Option<(i32, i32)>,
}

/// Translate any crossterm event the command vocabulary can express.
pub fn map_event(event: &CEvent) -> Option<InputEvent> {
    match event {
        CEvent::Key(k) => map_key_event(k).map(|key| InputEvent { key, xy: None }),
        CEvent::Mouse(m) => map_mouse_event(m),
        _ => None,
    }
}

/// Map a key press (or repeat) onto its key string.
pub fn map_key_event(event: &CKeyEvent) -> Option<String> {
    if matches!(event.kind, CKeyEventKind::Release) {
        return None;
    }
    let mut name = map_key_code(&event.code)?;
    if event.modifiers.contains(CKeyModifiers::CONTROL) {
        name = name.with_ctrl();
    }
    if event.modifiers.contains(CKeyModifiers::ALT) || event.modifiers.contains(CKeyModifiers::META)
    {
        name = name.with_meta();
    }
    // Shift is already present in the character for Chr- events; it is
    // only spelled out for named keys.
    if event.modifiers.contains(CKeyModifiers::SHIFT) && name.as_char().is_none() {
        name = name.with_shift();
    }
    let key = name.to_string();
    trace!(target: "input", key, "key_event");
    Some(key)
}

fn map_key_code(code: &CKeyCode) -> Option<KeyName> {
    Some(match code {
        CKeyCode::Char(c) => KeyName::chr(*c),
        CKeyCode::Enter => KeyName::named(NamedKey::Return),
        CKeyCode::Esc => KeyName::named(NamedKey::Esc),
        CKeyCode::Backspace => KeyName::named(NamedKey::Backspace),
        CKeyCode::Tab => KeyName::named(NamedKey::Tab),
        CKeyCode::BackTab => KeyName::named(NamedKey::Tab).with_shift(),
        CKeyCode::Up => KeyName::named(NamedKey::Up),
        CKeyCode::Down => KeyName::named(NamedKey::Down),
        CKeyCode::Left => KeyName::named(NamedKey::Left),
        CKeyCode::Right => KeyName::named(NamedKey::Right),
        CKeyCode::Home => KeyName::named(NamedKey::Home),
        CKeyCode::End => KeyName::named(NamedKey::End),
        CKeyCode::PageUp => KeyName::named(NamedKey::Prior),
        CKeyCode::PageDown => KeyName::named(NamedKey::Next),
        CKeyCode::Delete => KeyName::named(NamedKey::Del),
        CKeyCode::F(n) => KeyName::named(NamedKey::F(*n)),
        CKeyCode::Null
        | CKeyCode::Insert
        | CKeyCode::CapsLock
        | CKeyCode::ScrollLock
        | CKeyCode::NumLock
        | CKeyCode::PrintScreen
        | CKeyCode::Pause
        | CKeyCode::Menu
        | CKeyCode::KeypadBegin
        | CKeyCode::Media(_)
        | CKeyCode::Modifier(_) => return None,
    })
}

/// Map a mouse event onto its key string and cell position. Release of
/// a tracked button also produces the `Click` synthesis upstream; here
/// only the raw protocol events are spelled.
pub fn map_mouse_event(event: &CMouseEvent) -> Option<InputEvent> {
    let name = match event.kind {
        CMouseEventKind::Down(b) => KeyName::mouse(MouseAction::Press, button_num(b)),
        CMouseEventKind::Up(b) => KeyName::mouse(MouseAction::Release, button_num(b)),
        CMouseEventKind::Moved | CMouseEventKind::Drag(_) => KeyName::mouse_move(),
        CMouseEventKind::ScrollDown
        | CMouseEventKind::ScrollUp
        | CMouseEventKind::ScrollLeft
        | CMouseEventKind::ScrollRight => return None,
    };
    let mut name = name;
    if event.modifiers.contains(CKeyModifiers::CONTROL) {
        name = name.with_ctrl();
    }
    if event.modifiers.contains(CKeyModifiers::ALT) {
        name = name.with_meta();
    }
    if event.modifiers.contains(CKeyModifiers::SHIFT) {
        name = name.with_shift();
    }
    Some(InputEvent {
        key: name.to_string(),
        xy: Some((i32::from(event.column), i32::from(event.row))),
    })
}

fn button_num(b: CMouseButton) -> u8 {
    match b {
        CMouseButton::Left => 1,
        CMouseButton::Middle => 2,
        CMouseButton::Right => 3,
    }
}

/// Fold a press/release pair at the same cell into a `Click`, and
/// repeated clicks into `DClick`/`TClick`. The driver calls this with
/// the previous click state; the returned string replaces the raw
/// release event.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClickState {
    last: Option<(u8, i32, i32, u8)>,
}

impl ClickState {
    /// Record a release of `button` at `(x, y)`; yields the click key.
    pub fn on_release(&mut self, button: u8, x: i32, y: i32) -> String {
        let count = match self.last {
            Some((b, lx, ly, n)) if b == button && lx == x && ly == y => (n + 1).min(3),
            _ => 1,
        };
        self.last = Some((button, x, y, count));
        let action = match count {
            1 => MouseAction::Click,
            2 => MouseAction::DClick,
            _ => MouseAction::TClick,
        };
        KeyName::mouse(action, button).to_string()
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
