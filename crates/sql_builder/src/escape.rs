/// Backslash-escape the characters MySQL treats specially inside string
/// literals: NUL, `\n`, `\r`, `\`, `'`, `"` and Ctrl-Z.
pub fn escape_string(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len() * 2);
    for c in raw.chars() {
        let replacement = match c {
            '\0' => Some('0'),
            '\n' => Some('n'),
            '\r' => Some('r'),
            '\\' => Some('\\'),
            '\'' => Some('\''),
            '"' => Some('"'),
            '\u{1a}' => Some('Z'),
            _ => None,
        };
        match replacement {
            Some(r) => {
                escaped.push('\\');
                escaped.push(r);
            }
            None => escaped.push(c),
        }
    }
    escaped
}
