//! Symbolic key sequences (`"ctrl+shift+t"`) and the uinput virtual keyboard
//! that plays them.

use std::{fmt, thread, time::Duration};

use anyhow::{Context, Result, anyhow};
use thiserror::Error;
use uinput::event::keyboard::{Key, KeyPad, Keyboard, Misc};

use crate::inject::KeyInjector;
use crate::mapping::MappingTable;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyNameError {
    #[error("empty key sequence")]
    Empty,
    #[error("unknown key {key:?} in {sequence:?}")]
    Unknown { key: String, sequence: String },
}

/// Keys pressed left to right and released right to left.
pub struct KeySequence {
    keys: Vec<Keyboard>,
    source: String,
}

impl KeySequence {
    pub fn parse(sequence: &str) -> Result<Self, KeyNameError> {
        if sequence.trim().is_empty() {
            return Err(KeyNameError::Empty);
        }

        let keys = sequence
            .split('+')
            .map(|part| {
                key_named(part).ok_or_else(|| KeyNameError::Unknown {
                    key: part.trim().to_string(),
                    sequence: sequence.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            keys,
            source: sequence.to_string(),
        })
    }

    pub fn keys(&self) -> &[Keyboard] {
        &self.keys
    }
}

impl fmt::Display for KeySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl fmt::Debug for KeySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeySequence({:?})", self.source)
    }
}

/// One parsed sequence per table name, indexed by `NameId`.
pub fn parse_all(table: &MappingTable) -> Result<Vec<KeySequence>> {
    table
        .names()
        .map(|(_, name)| KeySequence::parse(name).with_context(|| format!("mapping name {name:?}")))
        .collect()
}

/// Case-insensitive; `_` and `-` are ignored so X11 names like `Page_Up` work.
fn key_named(name: &str) -> Option<Keyboard> {
    let name: String = name
        .trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect();

    main_key(&name)
        .map(Keyboard::Key)
        .or_else(|| keypad_key(&name).map(Keyboard::KeyPad))
        .or_else(|| media_key(&name).map(Keyboard::Misc))
}

fn main_key(name: &str) -> Option<Key> {
    let key = match name {
        "a" => Key::A,
        "b" => Key::B,
        "c" => Key::C,
        "d" => Key::D,
        "e" => Key::E,
        "f" => Key::F,
        "g" => Key::G,
        "h" => Key::H,
        "i" => Key::I,
        "j" => Key::J,
        "k" => Key::K,
        "l" => Key::L,
        "m" => Key::M,
        "n" => Key::N,
        "o" => Key::O,
        "p" => Key::P,
        "q" => Key::Q,
        "r" => Key::R,
        "s" => Key::S,
        "t" => Key::T,
        "u" => Key::U,
        "v" => Key::V,
        "w" => Key::W,
        "x" => Key::X,
        "y" => Key::Y,
        "z" => Key::Z,
        "0" => Key::_0,
        "1" => Key::_1,
        "2" => Key::_2,
        "3" => Key::_3,
        "4" => Key::_4,
        "5" => Key::_5,
        "6" => Key::_6,
        "7" => Key::_7,
        "8" => Key::_8,
        "9" => Key::_9,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        "f13" => Key::F13,
        "f14" => Key::F14,
        "f15" => Key::F15,
        "f16" => Key::F16,
        "f17" => Key::F17,
        "f18" => Key::F18,
        "f19" => Key::F19,
        "f20" => Key::F20,
        "f21" => Key::F21,
        "f22" => Key::F22,
        "f23" => Key::F23,
        "f24" => Key::F24,
        "ctrl" | "control" | "controll" | "lctrl" => Key::LeftControl,
        "controlr" | "rctrl" => Key::RightControl,
        "shift" | "shiftl" | "lshift" => Key::LeftShift,
        "shiftr" | "rshift" => Key::RightShift,
        "alt" | "altl" | "lalt" => Key::LeftAlt,
        "altr" | "ralt" | "altgr" | "isolevel3shift" => Key::RightAlt,
        "super" | "superl" | "meta" | "win" => Key::LeftMeta,
        "superr" => Key::RightMeta,
        "return" | "enter" => Key::Enter,
        "escape" | "esc" => Key::Esc,
        "tab" => Key::Tab,
        "space" => Key::Space,
        "backspace" => Key::BackSpace,
        "delete" | "del" => Key::Delete,
        "insert" | "ins" => Key::Insert,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "prior" => Key::PageUp,
        "pagedown" | "next" => Key::PageDown,
        "up" => Key::Up,
        "down" => Key::Down,
        "left" => Key::Left,
        "right" => Key::Right,
        "capslock" => Key::CapsLock,
        "minus" => Key::Minus,
        "equal" => Key::Equal,
        "comma" => Key::Comma,
        "period" | "dot" => Key::Dot,
        "slash" => Key::Slash,
        "backslash" => Key::BackSlash,
        "semicolon" => Key::SemiColon,
        "apostrophe" => Key::Apostrophe,
        "grave" => Key::Grave,
        "bracketleft" => Key::LeftBrace,
        "bracketright" => Key::RightBrace,
        _ => return None,
    };
    Some(key)
}

fn keypad_key(name: &str) -> Option<KeyPad> {
    let key = match name {
        "kp0" => KeyPad::_0,
        "kp1" => KeyPad::_1,
        "kp2" => KeyPad::_2,
        "kp3" => KeyPad::_3,
        "kp4" => KeyPad::_4,
        "kp5" => KeyPad::_5,
        "kp6" => KeyPad::_6,
        "kp7" => KeyPad::_7,
        "kp8" => KeyPad::_8,
        "kp9" => KeyPad::_9,
        "kpenter" => KeyPad::Enter,
        "kpadd" | "kpplus" => KeyPad::Plus,
        "kpsubtract" | "kpminus" => KeyPad::Minus,
        "kpmultiply" | "kpasterisk" => KeyPad::Asterisk,
        "kpdivide" | "kpslash" => KeyPad::Slash,
        "kpdecimal" | "kpdot" => KeyPad::Dot,
        "kpequal" => KeyPad::Equal,
        _ => return None,
    };
    Some(key)
}

/// XF86 multimedia names plus short forms.
fn media_key(name: &str) -> Option<Misc> {
    let key = match name {
        "xf86audioraisevolume" | "volumeup" | "volup" => Misc::VolumeUp,
        "xf86audiolowervolume" | "volumedown" | "voldown" => Misc::VolumeDown,
        "xf86audiomute" | "mute" => Misc::Mute,
        "xf86audiomicmute" | "micmute" => Misc::MicMute,
        "xf86audioplay" | "xf86audiopause" | "playpause" => Misc::PlayPause,
        "xf86audionext" | "nextsong" => Misc::NextSong,
        "xf86audioprev" | "prevsong" => Misc::PreviousSong,
        "xf86audiostop" | "stop" => Misc::StopCD,
        _ => return None,
    };
    Some(key)
}

// ───────────────────────────── device ──────────────────────────────────── //

/// Virtual keyboard on `/dev/uinput`. Removed by the kernel when dropped.
pub struct UinputKeyboard {
    device: uinput::Device,
}

impl UinputKeyboard {
    pub fn create(name: &str) -> Result<Self> {
        let device = uinput::default()
            .map_err(|e| anyhow!("open /dev/uinput: {e}"))?
            .name(name)
            .map_err(|e| anyhow!("name uinput device: {e}"))?
            .event(uinput::event::Keyboard::All)
            .map_err(|e| anyhow!("enable keyboard events: {e}"))?
            .create()
            .map_err(|e| anyhow!("create uinput keyboard: {e}"))?;

        log::info!("⌨️  Virtual keyboard {name:?} ready");
        Ok(Self { device })
    }

    fn press(&mut self, key: &Keyboard) -> Result<()> {
        self.device
            .press(key)
            .and_then(|_| self.device.synchronize())
            .map_err(|e| anyhow!("key press: {e}"))
    }

    fn release(&mut self, key: &Keyboard) -> Result<()> {
        self.device
            .release(key)
            .and_then(|_| self.device.synchronize())
            .map_err(|e| anyhow!("key release: {e}"))
    }
}

impl KeyInjector for UinputKeyboard {
    fn key_down(&mut self, keys: &KeySequence, delay: Duration) -> Result<()> {
        for (i, key) in keys.keys().iter().enumerate() {
            if i > 0 {
                thread::sleep(delay);
            }
            self.press(key)?;
        }
        Ok(())
    }

    fn key_up(&mut self, keys: &KeySequence, delay: Duration) -> Result<()> {
        for (i, key) in keys.keys().iter().rev().enumerate() {
            if i > 0 {
                thread::sleep(delay);
            }
            self.release(key)?;
        }
        Ok(())
    }

    fn key_press(&mut self, keys: &KeySequence, delay: Duration) -> Result<()> {
        self.key_down(keys, delay)?;
        thread::sleep(delay);
        self.key_up(keys, delay)
    }
}
