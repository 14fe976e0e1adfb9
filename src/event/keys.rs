//! Decoding of raw terminal input into key events.
//!
//! Input arrives as raw byte chunks while the terminal is in raw mode. This
//! module turns a chunk into the key events it contains so the listener can
//! observe keystrokes and spot kill gestures, without altering the bytes that
//! are forwarded to the child.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

const ESC: char = '\x1b';

/// Decodes every key event contained in a raw input chunk.
///
/// This is the inverse of the usual terminal encoding: `Ctrl+letter` is a
/// C0 control byte, `Alt+key` (meta) is the key prefixed by ESC, and the
/// navigation keys are CSI/SS3 escape sequences. Bytes that are not valid
/// UTF-8 are decoded lossily; unknown escape sequences are skipped.
pub fn decode_keys(chunk: &[u8]) -> Vec<KeyEvent> {
    let text = String::from_utf8_lossy(chunk);
    let chars: Vec<char> = text.chars().collect();
    let mut keys = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != ESC {
            keys.push(decode_plain(c, KeyModifiers::NONE));
            i += 1;
            continue;
        }

        match chars.get(i + 1).copied() {
            // Lone ESC, or ESC ESC (meta+escape collapses to escape)
            None => {
                keys.push(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
                i += 1;
            }
            Some(ESC) => {
                keys.push(KeyEvent::new(KeyCode::Esc, KeyModifiers::ALT));
                i += 2;
            }
            Some('[') => {
                let (key, consumed) = decode_csi(&chars[i + 2..]);
                keys.extend(key);
                i += 2 + consumed;
            }
            Some('O') if chars.get(i + 2).is_some() => {
                keys.extend(decode_ss3(chars[i + 2]));
                i += 3;
            }
            Some(next) => {
                keys.push(decode_plain(next, KeyModifiers::ALT));
                i += 2;
            }
        }
    }

    keys
}

/// Returns true for the key combinations that abort the supervised run:
/// Ctrl+C, Meta+C, Meta+Q and Ctrl+Q. Letter case is ignored.
pub fn is_kill_gesture(key: &KeyEvent) -> bool {
    let KeyCode::Char(c) = key.code else {
        return false;
    };
    let modified = key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);
    modified && matches!(c.to_ascii_lowercase(), 'c' | 'q')
}

fn decode_plain(c: char, base: KeyModifiers) -> KeyEvent {
    let (code, modifiers) = match c {
        '\r' => (KeyCode::Enter, KeyModifiers::NONE),
        '\n' => (KeyCode::Enter, KeyModifiers::NONE),
        '\t' => (KeyCode::Tab, KeyModifiers::NONE),
        '\x7f' | '\x08' => (KeyCode::Backspace, KeyModifiers::NONE),
        '\0' => (KeyCode::Char(' '), KeyModifiers::CONTROL),
        // Ctrl+A = 0x01 ... Ctrl+Z = 0x1a
        '\x01'..='\x1a' => {
            let letter = (b'a' + (c as u8) - 1) as char;
            (KeyCode::Char(letter), KeyModifiers::CONTROL)
        }
        '\x1c' => (KeyCode::Char('\\'), KeyModifiers::CONTROL),
        '\x1d' => (KeyCode::Char(']'), KeyModifiers::CONTROL),
        '\x1e' => (KeyCode::Char('^'), KeyModifiers::CONTROL),
        '\x1f' => (KeyCode::Char('_'), KeyModifiers::CONTROL),
        c if c.is_uppercase() => (
            KeyCode::Char(c.to_lowercase().next().unwrap_or(c)),
            KeyModifiers::SHIFT,
        ),
        c => (KeyCode::Char(c), KeyModifiers::NONE),
    };
    KeyEvent::new(code, modifiers | base)
}

/// Decodes the body of a CSI sequence (after `ESC [`).
///
/// Returns the key, if recognised, and the number of chars consumed.
fn decode_csi(rest: &[char]) -> (Option<KeyEvent>, usize) {
    // Parameters and intermediates run until the final byte (0x40..=0x7e)
    let Some(end) = rest.iter().position(|c| ('\x40'..='\x7e').contains(c)) else {
        return (None, rest.len());
    };
    let params: String = rest[..end].iter().collect();
    let final_char = rest[end];

    let mut fields = params.split(';');
    let first = fields.next().unwrap_or("");
    let modifiers = fields
        .next()
        .and_then(|m| m.parse::<u8>().ok())
        .map(xterm_modifiers)
        .unwrap_or(KeyModifiers::NONE);

    let code = match final_char {
        'A' => Some(KeyCode::Up),
        'B' => Some(KeyCode::Down),
        'C' => Some(KeyCode::Right),
        'D' => Some(KeyCode::Left),
        'H' => Some(KeyCode::Home),
        'F' => Some(KeyCode::End),
        'Z' => Some(KeyCode::BackTab),
        '~' => match first {
            "1" | "7" => Some(KeyCode::Home),
            "2" => Some(KeyCode::Insert),
            "3" => Some(KeyCode::Delete),
            "4" | "8" => Some(KeyCode::End),
            "5" => Some(KeyCode::PageUp),
            "6" => Some(KeyCode::PageDown),
            n => n
                .parse::<u8>()
                .ok()
                .and_then(function_key_from_tilde)
                .map(KeyCode::F),
        },
        _ => None,
    };

    (code.map(|code| KeyEvent::new(code, modifiers)), end + 1)
}

fn decode_ss3(c: char) -> Option<KeyEvent> {
    let code = match c {
        'P' => KeyCode::F(1),
        'Q' => KeyCode::F(2),
        'R' => KeyCode::F(3),
        'S' => KeyCode::F(4),
        'A' => KeyCode::Up,
        'B' => KeyCode::Down,
        'C' => KeyCode::Right,
        'D' => KeyCode::Left,
        'H' => KeyCode::Home,
        'F' => KeyCode::End,
        _ => return None,
    };
    Some(KeyEvent::new(code, KeyModifiers::NONE))
}

fn function_key_from_tilde(n: u8) -> Option<u8> {
    match n {
        11..=15 => Some(n - 10),
        17..=21 => Some(n - 11),
        23 | 24 => Some(n - 12),
        _ => None,
    }
}

/// xterm encodes modifiers as `1 + bitmask` (shift=1, alt=2, ctrl=4).
fn xterm_modifiers(param: u8) -> KeyModifiers {
    let mask = param.saturating_sub(1);
    let mut modifiers = KeyModifiers::NONE;
    if mask & 1 != 0 {
        modifiers |= KeyModifiers::SHIFT;
    }
    if mask & 2 != 0 {
        modifiers |= KeyModifiers::ALT;
    }
    if mask & 4 != 0 {
        modifiers |= KeyModifiers::CONTROL;
    }
    modifiers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_control_letters() {
        assert_eq!(
            decode_keys(b"\x03"),
            vec![key(KeyCode::Char('c'), KeyModifiers::CONTROL)]
        );
        assert_eq!(
            decode_keys(b"\x11"),
            vec![key(KeyCode::Char('q'), KeyModifiers::CONTROL)]
        );
    }

    #[test]
    fn test_meta_prefix() {
        assert_eq!(
            decode_keys(b"\x1bc"),
            vec![key(KeyCode::Char('c'), KeyModifiers::ALT)]
        );
        assert_eq!(
            decode_keys(b"\x1bQ"),
            vec![key(KeyCode::Char('q'), KeyModifiers::ALT | KeyModifiers::SHIFT)]
        );
    }

    #[test]
    fn test_plain_text_and_enter() {
        let keys = decode_keys("hé\r".as_bytes());
        assert_eq!(
            keys,
            vec![
                key(KeyCode::Char('h'), KeyModifiers::NONE),
                key(KeyCode::Char('é'), KeyModifiers::NONE),
                key(KeyCode::Enter, KeyModifiers::NONE),
            ]
        );
    }

    #[test]
    fn test_escape_sequences() {
        assert_eq!(decode_keys(b"\x1b[A"), vec![key(KeyCode::Up, KeyModifiers::NONE)]);
        assert_eq!(
            decode_keys(b"\x1b[1;5C"),
            vec![key(KeyCode::Right, KeyModifiers::CONTROL)]
        );
        assert_eq!(decode_keys(b"\x1b[3~"), vec![key(KeyCode::Delete, KeyModifiers::NONE)]);
        assert_eq!(decode_keys(b"\x1b[15~"), vec![key(KeyCode::F(5), KeyModifiers::NONE)]);
        assert_eq!(decode_keys(b"\x1bOP"), vec![key(KeyCode::F(1), KeyModifiers::NONE)]);
        assert_eq!(decode_keys(b"\x1b"), vec![key(KeyCode::Esc, KeyModifiers::NONE)]);
    }

    #[test]
    fn test_unknown_csi_is_skipped() {
        assert_eq!(
            decode_keys(b"\x1b[99xa"),
            vec![key(KeyCode::Char('a'), KeyModifiers::NONE)]
        );
    }

    #[test]
    fn test_kill_gestures() {
        for chunk in [&b"\x03"[..], b"\x11", b"\x1bc", b"\x1bq", b"\x1bC"] {
            let keys = decode_keys(chunk);
            assert_eq!(keys.len(), 1, "chunk {:?}", chunk);
            assert!(is_kill_gesture(&keys[0]), "chunk {:?}", chunk);
        }
    }

    #[test]
    fn test_non_gestures() {
        for chunk in [&b"c"[..], b"q", b"C", b"\x04", b"\x1bx", b"\x1b[A"] {
            for k in decode_keys(chunk) {
                assert!(!is_kill_gesture(&k), "chunk {:?}", chunk);
            }
        }
    }
}
