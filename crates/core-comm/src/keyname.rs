//! Key-event strings.
//!
//! Key and mouse events travel through dispatch as ordinary command keys, so
//! their spelling is part of the interop surface:
//! * modifier prefixes `C-`, `M-`, `S-` (Control, Meta, Shift, in that
//!   canonical order);
//! * `Chr-X` for a literal character `X`, with multibyte characters
//!   following as UTF-8;
//! * mouse events under the `M:` prefix: `M:Press-1`, `M:Release-1`,
//!   `M:Click-1`, `M:DClick-1`, `M:TClick-1`, and `M:Move` (no button);
//! * function and editing keys spelled out: `Up`, `Down`, `Left`, `Right`,
//!   `Prior`, `Next`, `End`, `Home`, `Del`, `Return`, `Tab`, `LF`,
//!   `Backspace`, `ESC`, `F1`…
//!
//! [`KeyName`] builds and parses these strings; translation from a concrete
//! terminal backend lives in `core-input`.

use std::fmt;

/// Spelled-out non-character keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedKey {
    Up,
    Down,
    Left,
    Right,
    /// Page up.
    Prior,
    /// Page down.
    Next,
    Home,
    End,
    Del,
    Return,
    Tab,
    LF,
    Backspace,
    Esc,
    /// Function key `F1`..
    F(u8),
}

impl NamedKey {
    fn write(self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("Up"),
            Self::Down => f.write_str("Down"),
            Self::Left => f.write_str("Left"),
            Self::Right => f.write_str("Right"),
            Self::Prior => f.write_str("Prior"),
            Self::Next => f.write_str("Next"),
            Self::Home => f.write_str("Home"),
            Self::End => f.write_str("End"),
            Self::Del => f.write_str("Del"),
            Self::Return => f.write_str("Return"),
            Self::Tab => f.write_str("Tab"),
            Self::LF => f.write_str("LF"),
            Self::Backspace => f.write_str("Backspace"),
            Self::Esc => f.write_str("ESC"),
            Self::F(n) => write!(f, "F{n}"),
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "Up" => Self::Up,
            "Down" => Self::Down,
            "Left" => Self::Left,
            "Right" => Self::Right,
            "Prior" => Self::Prior,
            "Next" => Self::Next,
            "Home" => Self::Home,
            "End" => Self::End,
            "Del" => Self::Del,
            "Return" => Self::Return,
            "Tab" => Self::Tab,
            "LF" => Self::LF,
            "Backspace" => Self::Backspace,
            "ESC" => Self::Esc,
            _ => {
                let n = s.strip_prefix('F')?.parse::<u8>().ok()?;
                Self::F(n)
            }
        })
    }
}

/// Mouse event kinds under the `M:` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Press,
    Release,
    Click,
    DClick,
    TClick,
    Move,
}

impl MouseAction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Press => "Press",
            Self::Release => "Release",
            Self::Click => "Click",
            Self::DClick => "DClick",
            Self::TClick => "TClick",
            Self::Move => "Move",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Base {
    Chr(char),
    Named(NamedKey),
    Mouse { action: MouseAction, button: u8 },
}

/// A structured key event convertible to and from its string spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyName {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    base: Base,
}

/// Failure to parse a key-event string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed key event string: {0:?}")]
pub struct KeyNameError(pub String);

impl KeyName {
    /// A literal character event (`Chr-X`).
    pub fn chr(c: char) -> Self {
        Self { ctrl: false, meta: false, shift: false, base: Base::Chr(c) }
    }

    /// A spelled-out key event.
    pub fn named(key: NamedKey) -> Self {
        Self { ctrl: false, meta: false, shift: false, base: Base::Named(key) }
    }

    /// A buttoned mouse event (`M:Press-1` etc.).
    pub fn mouse(action: MouseAction, button: u8) -> Self {
        Self { ctrl: false, meta: false, shift: false, base: Base::Mouse { action, button } }
    }

    /// The buttonless `M:Move` event.
    pub fn mouse_move() -> Self {
        Self::mouse(MouseAction::Move, 0)
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// The literal character, when this is a `Chr-` event.
    pub fn as_char(&self) -> Option<char> {
        match self.base {
            Base::Chr(c) => Some(c),
            _ => None,
        }
    }

    /// True for events under the `M:` prefix.
    pub fn is_mouse(&self) -> bool {
        matches!(self.base, Base::Mouse { .. })
    }

    /// Parse a key-event string produced by [`fmt::Display`].
    pub fn parse(s: &str) -> Result<Self, KeyNameError> {
        let mut rest = s;
        let (mut ctrl, mut meta, mut shift) = (false, false, false);
        loop {
            if let Some(r) = rest.strip_prefix("C-") {
                ctrl = true;
                rest = r;
            } else if rest.starts_with("M-") && !rest.starts_with("M:") {
                meta = true;
                rest = &rest[2..];
            } else if let Some(r) = rest.strip_prefix("S-") {
                shift = true;
                rest = r;
            } else {
                break;
            }
        }
        let base = if let Some(m) = rest.strip_prefix("M:") {
            if m == "Move" {
                Base::Mouse { action: MouseAction::Move, button: 0 }
            } else {
                let (action, button) = m
                    .split_once('-')
                    .ok_or_else(|| KeyNameError(s.to_string()))?;
                let action = match action {
                    "Press" => MouseAction::Press,
                    "Release" => MouseAction::Release,
                    "Click" => MouseAction::Click,
                    "DClick" => MouseAction::DClick,
                    "TClick" => MouseAction::TClick,
                    _ => return Err(KeyNameError(s.to_string())),
                };
                let button = button.parse().map_err(|_| KeyNameError(s.to_string()))?;
                Base::Mouse { action, button }
            }
        } else if let Some(c) = rest.strip_prefix("Chr-") {
            let mut chars = c.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Base::Chr(ch),
                _ => return Err(KeyNameError(s.to_string())),
            }
        } else {
            Base::Named(NamedKey::parse(rest).ok_or_else(|| KeyNameError(s.to_string()))?)
        };
        Ok(Self { ctrl, meta, shift, base })
    }
}

impl fmt::Display for KeyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("C-")?;
        }
        if self.meta {
            f.write_str("M-")?;
        }
        if self.shift {
            f.write_str("S-")?;
        }
        match self.base {
            Base::Chr(c) => write!(f, "Chr-{c}"),
            Base::Named(k) => k.write(f),
            Base::Mouse { action: MouseAction::Move, .. } => f.write_str("M:Move"),
            Base::Mouse { action, button } => write!(f, "M:{}-{}", action.as_str(), button),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_char() {
        assert_eq!(KeyName::chr('x').to_string(), "Chr-x");
    }

    #[test]
    fn multibyte_char_follows_as_utf8() {
        let k = KeyName::chr('é');
        assert_eq!(k.to_string(), "Chr-é");
        assert_eq!(KeyName::parse("Chr-é").unwrap(), k);
    }

    #[test]
    fn modifier_prefixes_in_canonical_order() {
        let k = KeyName::chr('x').with_ctrl().with_meta();
        assert_eq!(k.to_string(), "C-M-Chr-x");
        let k = KeyName::named(NamedKey::Return).with_shift();
        assert_eq!(k.to_string(), "S-Return");
    }

    #[test]
    fn mouse_events() {
        assert_eq!(KeyName::mouse(MouseAction::Press, 1).to_string(), "M:Press-1");
        assert_eq!(KeyName::mouse(MouseAction::TClick, 3).to_string(), "M:TClick-3");
        assert_eq!(KeyName::mouse_move().to_string(), "M:Move");
    }

    #[test]
    fn meta_prefix_does_not_eat_mouse_prefix() {
        let k = KeyName::parse("M:Click-1").unwrap();
        assert!(k.is_mouse());
        assert!(!k.meta);
        let k = KeyName::parse("M-M:Click-1").unwrap();
        assert!(k.is_mouse());
        assert!(k.meta);
    }

    #[test]
    fn round_trips() {
        for s in [
            "Chr-a",
            "C-Chr-a",
            "C-M-S-Chr-%",
            "Up",
            "Prior",
            "ESC",
            "F12",
            "C-Return",
            "M:Press-1",
            "M:DClick-2",
            "S-M:Move",
        ] {
            let k = KeyName::parse(s).unwrap();
            assert_eq!(k.to_string(), s, "round trip of {s}");
        }
    }

    #[test]
    fn rejects_garbage() {
        for s in ["", "Chr-", "Chr-ab", "M:", "M:Zap-1", "Q-Chr-a", "F", "Fx"] {
            assert!(KeyName::parse(s).is_err(), "should reject {s:?}");
        }
    }
}
