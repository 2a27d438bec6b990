//! SysEx byte templates.
//!
//! A template is hex text with placeholders that are substituted at send
//! time: `%c` is the channel as one hex digit, `%C` the channel as two
//! digits, `%n` the note as two digits, and `%v` the value as two digits.
//! Whitespace and commas between bytes are ignored.
//!
//! Example: `"F0 41 10 %C 12 %n %v F7"`.

use smallvec::SmallVec;

use crate::error::{Error, Result};

/// Expanded SysEx payload. Stays inline for typical short messages.
pub type SysexBytes = SmallVec<[u8; 32]>;

/// Expand `template` against a channel, note, and value into raw bytes.
pub fn expand(template: &str, channel: u8, note: u8, value: u8) -> Result<SysexBytes> {
    let mut bytes = SysexBytes::new();
    let mut pending: Option<u8> = None;

    let mut push_nibble = |bytes: &mut SysexBytes, nibble: u8| {
        pending = match pending.take() {
            Some(high) => {
                bytes.push(high << 4 | nibble);
                None
            }
            None => Some(nibble),
        };
    };

    let mut push_byte_text = |bytes: &mut SysexBytes, text: &str| -> Result<()> {
        for ch in text.chars() {
            let nibble = ch
                .to_digit(16)
                .ok_or(Error::InvalidTemplateChar(ch))? as u8;
            push_nibble(bytes, nibble);
        }
        Ok(())
    };

    let mut chars = template.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '%' => {
                let text = match chars.next() {
                    Some('c') => format!("{:X}", channel & 0x0F),
                    Some('C') => format!("{:02X}", channel),
                    Some('n') => format!("{:02X}", note),
                    Some('v') => format!("{:02X}", value),
                    Some(other) => return Err(Error::UnknownPlaceholder(other)),
                    None => return Err(Error::UnterminatedHexByte),
                };
                push_byte_text(&mut bytes, &text)?;
            }
            c if c.is_ascii_hexdigit() => {
                push_byte_text(&mut bytes, &c.to_string())?;
            }
            c if c.is_whitespace() || c == ',' => {}
            other => return Err(Error::InvalidTemplateChar(other)),
        }
    }

    if pending.is_some() {
        return Err(Error::UnterminatedHexByte);
    }

    Ok(bytes)
}
