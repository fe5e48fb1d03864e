//! Recovers display text from node outputs that arrive as the upstream agent's
//! own object representation, e.g. `{'messages': [AIMessage(content='Done.\nNext', ...)]}`.
//!
//! Only the escapes `\n`, `\t`, `\r`, `\\`, `\'`, `\"` and `\uXXXX` are decoded. A
//! literal unescaped `'` inside a single-quoted payload ends the match early; that
//! input is not representable by the upstream serializer and is left as a known gap.

use std::sync::OnceLock;

use regex::Regex;

fn wrapper_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r#"(?s)\b\w*Message\(\s*content=(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")"#,
            )
            .map_err(|e| tracing::error!("content wrapper pattern failed to compile: {}", e))
            .ok()
        })
        .as_ref()
}

/// Returns the inner payload of the last message wrapper in `raw`, unescaped, or
/// `raw` unchanged when there is no wrapper or it cannot be decoded.
pub fn normalize(raw: &str) -> String {
    match extract(raw) {
        Some(text) => text,
        None => raw.to_string(),
    }
}

fn extract(raw: &str) -> Option<String> {
    let pattern = wrapper_pattern()?;
    let captures = pattern.captures_iter(raw).last()?;
    let payload = captures.get(1).or_else(|| captures.get(2))?;
    let decoded = unescape(payload.as_str());
    if decoded.is_none() {
        tracing::debug!(
            "content wrapper found but payload could not be unescaped; passing through"
        );
    }
    decoded
}

fn unescape(escaped: &str) -> Option<String> {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'u' => {
                let high = read_hex4(&mut chars)?;
                if (0xD800..0xDC00).contains(&high) {
                    if chars.next()? != '\\' || chars.next()? != 'u' {
                        return None;
                    }
                    let low = read_hex4(&mut chars)?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return None;
                    }
                    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    out.push(char::from_u32(code)?);
                } else {
                    out.push(char::from_u32(high)?);
                }
            }
            _ => return None,
        }
    }
    Some(out)
}

fn read_hex4(chars: &mut std::str::Chars<'_>) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..4 {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    Some(value)
}
