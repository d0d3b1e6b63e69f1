use crate::machine::{Machine, KEYPAD_SIZE};
use std::collections::HashMap;
use thiserror::Error;

/// map of keyboard characters to what the chip8 might expect
/// where '1' => 0x01 and 'a' => 0x0a
const CHIP8_LITERAL_KEYMAP: [(char, u8); 16] = [
    ('0', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('4', 0x04),
    ('5', 0x05),
    ('6', 0x06),
    ('7', 0x07),
    ('8', 0x08),
    ('9', 0x09),
    ('a', 0x0a),
    ('b', 0x0b),
    ('c', 0x0c),
    ('d', 0x0d),
    ('e', 0x0e),
    ('f', 0x0f),
];

/// ditto using left-hand side of qwerty keyboard
///   1 2 3 C      1 2 3 4
///   4 5 6 D  <-  q w e r
///   7 8 9 E      a s d f
///   A 0 B F      z x c v
const CHIP8_CONVENTIONAL_KEYMAP: [(char, u8); 16] = [
    ('x', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('q', 0x04),
    ('w', 0x05),
    ('e', 0x06),
    ('a', 0x07),
    ('s', 0x08),
    ('d', 0x09),
    ('z', 0x0a),
    ('c', 0x0b),
    ('4', 0x0c),
    ('r', 0x0d),
    ('f', 0x0e),
    ('v', 0x0f),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyMapError {
    #[error("'{key}' is mapped to {index:#x}, the keypad only goes up to 0xf")]
    IndexOutOfRange { key: char, index: u8 },
}

/// Static mapping of physical keys to keypad indices. Characters are
/// matched without regard to case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMap {
    keys: HashMap<char, u8>,
}

impl KeyMap {
    pub fn new(pairs: impl IntoIterator<Item = (char, u8)>) -> Result<Self, KeyMapError> {
        let mut keys = HashMap::new();
        for (key, index) in pairs {
            if index >= KEYPAD_SIZE {
                return Err(KeyMapError::IndexOutOfRange { key, index });
            }
            keys.insert(normalise(key), index);
        }
        Ok(KeyMap { keys })
    }

    /// left-hand side of a qwerty keyboard, laid out like the COSMAC VIP keypad
    pub fn qwerty() -> Self {
        KeyMap {
            keys: HashMap::from(CHIP8_CONVENTIONAL_KEYMAP),
        }
    }

    /// the hex digit printed on each key
    pub fn hex() -> Self {
        KeyMap {
            keys: HashMap::from(CHIP8_LITERAL_KEYMAP),
        }
    }

    pub fn get(&self, key: char) -> Option<u8> {
        self.keys.get(&normalise(key)).copied()
    }

    /// keypad indices nothing is mapped to
    pub fn unmapped_indices(&self) -> Vec<u8> {
        (0..KEYPAD_SIZE)
            .filter(|i| !self.keys.values().any(|v| v == i))
            .collect()
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::qwerty()
    }
}

fn normalise(key: char) -> char {
    key.to_ascii_lowercase()
}

/// Forwards press/release edges for mapped keys to the machine. Holds no
/// key state of its own; repeats are passed through untouched.
#[derive(Debug, Clone, Default)]
pub struct KeyBridge {
    map: KeyMap,
}

impl KeyBridge {
    pub fn new(map: KeyMap) -> Self {
        let missing = map.unmapped_indices();
        if !missing.is_empty() {
            log::warn!("no key mapped to keypad indices {:x?}", missing);
        }
        KeyBridge { map }
    }

    pub fn translate(&self, key: char) -> Option<u8> {
        self.map.get(key)
    }

    /// true if the key is part of the keypad
    pub fn on_key_down(&self, machine: &mut impl Machine, key: char) -> bool {
        match self.translate(key) {
            Some(index) => {
                machine.key_down(index);
                true
            }
            None => {
                log::trace!("dropping press of unmapped key {:?}", key);
                false
            }
        }
    }

    /// true if the key is part of the keypad
    pub fn on_key_up(&self, machine: &mut impl Machine, key: char) -> bool {
        match self.translate(key) {
            Some(index) => {
                machine.key_up(index);
                true
            }
            None => {
                log::trace!("dropping release of unmapped key {:?}", key);
                false
            }
        }
    }
}
