//! Key normalization for raw host key events.
//!
//! The host hands us raw character data, a hardware virtual code and a set of
//! modifier booleans once per key-down. `normalize_key` folds those into a
//! canonical [`Key`] value: control-modified codes are remapped to their
//! terminal-style equivalents, platform function-key code points become
//! abstract [`FunctionKey`] values, and a fixed table of hardware codes marks
//! input coming from the numeric keypad. The function is pure; a `Key` is
//! never mutated after construction.

use phf::{phf_map, phf_set};

/// Modifier flags captured with a key event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub option: bool,
    pub command: bool,
    pub caps_lock: bool,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::default()
        }
    }

    pub fn control() -> Self {
        Self {
            control: true,
            ..Self::default()
        }
    }

    pub fn control_shift() -> Self {
        Self {
            control: true,
            shift: true,
            ..Self::default()
        }
    }
}

/// Abstract non-printable keys recognized by conversion engines.
///
/// Platform navigation and function key code points are remapped to this
/// closed set so contexts never see raw platform constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKey {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    ForwardDelete,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
}

/// The primary code carried by a [`Key`].
///
/// A 7-bit code is carried as a single scalar; platform function keys map to
/// the abstract [`FunctionKey`] set; anything else (composed/dead-key input,
/// multi-byte IME keys) keeps the original character data as a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyCode {
    Ascii(u8),
    Function(FunctionKey),
    Text(String),
}

/// Canonical key value produced once per physical key event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    code: KeyCode,
    virtual_code: u16,
    modifiers: Modifiers,
    numeric_keypad: bool,
}

// Platform function-key code points (private-use range delivered by the
// host for arrows, paging, and F-keys) to abstract keys.
static FUNCTION_KEYS: phf::Map<char, FunctionKey> = phf_map! {
    '\u{F700}' => FunctionKey::Up,
    '\u{F701}' => FunctionKey::Down,
    '\u{F702}' => FunctionKey::Left,
    '\u{F703}' => FunctionKey::Right,
    '\u{F704}' => FunctionKey::F1,
    '\u{F705}' => FunctionKey::F2,
    '\u{F706}' => FunctionKey::F3,
    '\u{F707}' => FunctionKey::F4,
    '\u{F708}' => FunctionKey::F5,
    '\u{F709}' => FunctionKey::F6,
    '\u{F70A}' => FunctionKey::F7,
    '\u{F70B}' => FunctionKey::F8,
    '\u{F70C}' => FunctionKey::F9,
    '\u{F70D}' => FunctionKey::F10,
    '\u{F728}' => FunctionKey::ForwardDelete,
    '\u{F729}' => FunctionKey::Home,
    '\u{F72B}' => FunctionKey::End,
    '\u{F72C}' => FunctionKey::PageUp,
    '\u{F72D}' => FunctionKey::PageDown,
};

// Hardware virtual codes of the numeric keypad:
// 0-9, ., +, -, *, /, =
static NUMERIC_KEYPAD_CODES: phf::Set<u16> = phf_set! {
    0x52u16, 0x53u16, 0x54u16, 0x55u16, 0x56u16, 0x57u16, 0x58u16, 0x59u16,
    0x5Bu16, 0x5Cu16, 0x41u16, 0x45u16, 0x4Eu16, 0x43u16, 0x4Bu16, 0x51u16,
};

/// Normalize one raw key event into a [`Key`].
///
/// Returns `None` when the host delivered no character data.
pub fn normalize_key(raw_chars: &str, virtual_code: u16, modifiers: Modifiers) -> Option<Key> {
    let first = raw_chars.chars().next()?;
    let mut code = first as u32;

    if modifiers.control {
        if code < 27 {
            // Terminal Ctrl-letter semantics: 1..26 -> 'a'..'z'.
            code += 'a' as u32 - 1;
        } else {
            code = match code {
                27 => {
                    if modifiers.shift {
                        '{' as u32
                    } else {
                        '[' as u32
                    }
                }
                28 => {
                    if modifiers.shift {
                        '|' as u32
                    } else {
                        '\\' as u32
                    }
                }
                29 => {
                    if modifiers.shift {
                        '}' as u32
                    } else {
                        ']' as u32
                    }
                }
                31 => {
                    if modifiers.shift {
                        '_' as u32
                    } else {
                        '-' as u32
                    }
                }
                other => other,
            };
        }
    }

    let code_char = char::from_u32(code)?;
    let key_code = if let Some(func) = FUNCTION_KEYS.get(&code_char) {
        KeyCode::Function(*func)
    } else if code < 128 {
        KeyCode::Ascii(code as u8)
    } else {
        KeyCode::Text(raw_chars.to_string())
    };

    Some(Key {
        code: key_code,
        virtual_code,
        modifiers,
        numeric_keypad: NUMERIC_KEYPAD_CODES.contains(&virtual_code),
    })
}

impl Key {
    /// Build a key directly from a [`KeyCode`]. Intended for contexts and
    /// tests that synthesize keys without a raw host event.
    pub fn with_code(code: KeyCode, modifiers: Modifiers) -> Self {
        Self {
            code,
            virtual_code: 0,
            modifiers,
            numeric_keypad: false,
        }
    }

    pub fn ascii_char(ch: char, modifiers: Modifiers) -> Self {
        debug_assert!(ch.is_ascii());
        Self::with_code(KeyCode::Ascii(ch as u8), modifiers)
    }

    pub fn function(func: FunctionKey, modifiers: Modifiers) -> Self {
        Self::with_code(KeyCode::Function(func), modifiers)
    }

    pub fn code(&self) -> &KeyCode {
        &self.code
    }

    pub fn virtual_code(&self) -> u16 {
        self.virtual_code
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn is_from_numeric_keypad(&self) -> bool {
        self.numeric_keypad
    }

    /// The 7-bit scalar code, when this key carries one.
    pub fn ascii(&self) -> Option<u8> {
        match self.code {
            KeyCode::Ascii(code) => Some(code),
            _ => None,
        }
    }

    /// The abstract function key, when this key carries one.
    pub fn func(&self) -> Option<FunctionKey> {
        match self.code {
            KeyCode::Function(func) => Some(func),
            _ => None,
        }
    }

    /// The original multi-unit character data, when this key carries it.
    pub fn text(&self) -> Option<&str> {
        match &self.code {
            KeyCode::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The key as a printable ASCII character (space through tilde).
    pub fn printable_char(&self) -> Option<char> {
        match self.code {
            KeyCode::Ascii(code) if (0x20..0x7F).contains(&code) => Some(code as char),
            _ => None,
        }
    }
}
