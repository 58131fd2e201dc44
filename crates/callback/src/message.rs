//! printf-style formatting where every operand is a string.
//!
//! Directives take the form `%[flags][width][.precision]verb`, with an
//! optional `[n]` argument index before the width, the precision or the
//! verb. Supported flags are `-` `+` `#` `0` and space, and `*` reads a width
//! or precision from the operands (strings never qualify, so it renders
//! `%!(BADWIDTH)` or `%!(BADPREC)`).
//!
//! | verb | output |
//! |---|---|
//! | `%s` `%v` | the operand |
//! | `%q` | double-quoted; `%#q` backquoted when possible, `%+q` ASCII only |
//! | `%x` `%X` | hex of the operand's bytes; `% x` spaces them, `%#x` adds `0x` |
//! | `%%` | a literal percent |
//! | other | `%!d(string=value)` |
//!
//! Missing operands render as `%!s(MISSING)`, out-of-range indexes as
//! `%!s(BADINDEX)`, and leftovers are appended as
//! `%!(EXTRA string=a, string=b)` unless an argument index was used.

// Widths and precisions beyond this are treated as malformed.
const NUMBER_LIMIT: usize = 1_000_000;

const LOWER_HEX: &[u8; 16] = b"0123456789abcdef";
const UPPER_HEX: &[u8; 16] = b"0123456789ABCDEF";

pub fn format_message(format: &str, params: &[String]) -> String {
    Printer::new(format, params).run()
}

#[derive(Debug, Default, Clone, Copy)]
struct Directive {
    sharp: bool,
    zero: bool,
    plus: bool,
    minus: bool,
    space: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

impl Directive {
    fn print(&self, out: &mut String, param: &str, verb: char) {
        match verb {
            's' => self.pad(out, self.truncate(param)),
            'v' if self.sharp => self.pad(out, &quote(self.truncate(param), false)),
            'v' => self.pad(out, self.truncate(param)),
            'q' => {
                let text = self.truncate(param);
                let quoted = if self.sharp && can_backquote(text) {
                    format!("`{text}`")
                } else {
                    quote(text, self.plus)
                };
                self.pad(out, &quoted);
            }
            'x' => self.hex(out, param, LOWER_HEX),
            'X' => self.hex(out, param, UPPER_HEX),
            other => {
                out.push_str("%!");
                out.push(other);
                out.push_str("(string=");
                self.pad(out, self.truncate(param));
                out.push(')');
            }
        }
    }

    fn truncate<'s>(&self, text: &'s str) -> &'s str {
        match self.precision {
            Some(limit) => match text.char_indices().nth(limit) {
                Some((cut, _)) => &text[..cut],
                None => text,
            },
            None => text,
        }
    }

    fn padding(&self, count: usize) -> impl Iterator<Item = char> {
        let fill = if self.zero { '0' } else { ' ' };
        std::iter::repeat(fill).take(count)
    }

    fn pad(&self, out: &mut String, text: &str) {
        let len = text.chars().count();
        let fill = self.width.unwrap_or(0).saturating_sub(len);
        if self.minus {
            out.push_str(text);
            out.extend(std::iter::repeat(' ').take(fill));
        } else {
            out.extend(self.padding(fill));
            out.push_str(text);
        }
    }

    fn hex(&self, out: &mut String, param: &str, digits: &[u8; 16]) {
        let bytes = param.as_bytes();
        let length = self.precision.map_or(bytes.len(), |p| p.min(bytes.len()));
        if length == 0 {
            out.extend(self.padding(self.width.unwrap_or(0)));
            return;
        }

        let mut encoded_width = 2 * length;
        if self.space {
            if self.sharp {
                encoded_width *= 2;
            }
            encoded_width += length - 1;
        } else if self.sharp {
            encoded_width += 2;
        }
        let fill = self.width.unwrap_or(0).saturating_sub(encoded_width);
        if !self.minus {
            out.extend(self.padding(fill));
        }

        let prefix = ['0', char::from(if digits == UPPER_HEX { b'X' } else { b'x' })];
        if self.sharp {
            out.extend(prefix);
        }
        for (i, byte) in bytes[..length].iter().enumerate() {
            if self.space && i > 0 {
                out.push(' ');
                if self.sharp {
                    out.extend(prefix);
                }
            }
            out.push(char::from(digits[usize::from(byte >> 4)]));
            out.push(char::from(digits[usize::from(byte & 0x0f)]));
        }

        if self.minus {
            out.extend(std::iter::repeat(' ').take(fill));
        }
    }
}

struct Printer<'a> {
    chars: Vec<char>,
    params: &'a [String],
    arg: usize,
    reordered: bool,
    good_index: bool,
    out: String,
}

impl<'a> Printer<'a> {
    fn new(format: &str, params: &'a [String]) -> Self {
        Self {
            chars: format.chars().collect(),
            params,
            arg: 0,
            reordered: false,
            good_index: true,
            out: String::with_capacity(
                format.len() + params.iter().map(String::len).sum::<usize>(),
            ),
        }
    }

    fn run(mut self) -> String {
        let params = self.params;
        let end = self.chars.len();
        let mut i = 0;

        while i < end {
            self.good_index = true;
            while i < end && self.chars[i] != '%' {
                self.out.push(self.chars[i]);
                i += 1;
            }
            if i >= end {
                break;
            }
            i += 1;

            let mut directive = Directive::default();
            while i < end {
                match self.chars[i] {
                    '#' => directive.sharp = true,
                    '0' => directive.zero = !directive.minus,
                    '+' => directive.plus = true,
                    '-' => {
                        directive.minus = true;
                        directive.zero = false;
                    }
                    ' ' => directive.space = true,
                    _ => break,
                }
                i += 1;
            }

            let (next, mut after_index) = self.arg_index(i);
            i = next;

            if i < end && self.chars[i] == '*' {
                i += 1;
                directive.width = self.star();
                if directive.width.is_none() {
                    self.out.push_str("%!(BADWIDTH)");
                }
                after_index = false;
            } else {
                let (width, next) = parse_number(&self.chars, i, end);
                directive.width = width;
                i = next;
                if after_index && width.is_some() {
                    self.good_index = false;
                }
            }

            if i + 1 < end && self.chars[i] == '.' {
                i += 1;
                if after_index {
                    self.good_index = false;
                }
                let (next, found) = self.arg_index(i);
                i = next;
                after_index = found;
                if i < end && self.chars[i] == '*' {
                    i += 1;
                    directive.precision = self.star();
                    if directive.precision.is_none() {
                        self.out.push_str("%!(BADPREC)");
                    }
                    after_index = false;
                } else {
                    let (precision, next) = parse_number(&self.chars, i, end);
                    directive.precision = Some(precision.unwrap_or(0));
                    i = next;
                }
            }

            if !after_index {
                i = self.arg_index(i).0;
            }

            if i >= end {
                self.out.push_str("%!(NOVERB)");
                break;
            }
            let verb = self.chars[i];
            i += 1;

            if verb == '%' {
                self.out.push('%');
                continue;
            }
            if !self.good_index {
                self.out.push_str(&format!("%!{verb}(BADINDEX)"));
                continue;
            }
            let Some(param) = params.get(self.arg) else {
                self.out.push_str(&format!("%!{verb}(MISSING)"));
                continue;
            };
            self.arg += 1;
            directive.print(&mut self.out, param, verb);
        }

        if !self.reordered && self.arg < params.len() {
            let extra: Vec<String> = params[self.arg..]
                .iter()
                .map(|p| format!("string={p}"))
                .collect();
            self.out.push_str(&format!("%!(EXTRA {})", extra.join(", ")));
        }
        self.out
    }

    /// Consume an `[n]` index at `i`. Returns the next position and whether
    /// a well-formed index was present.
    fn arg_index(&mut self, i: usize) -> (usize, bool) {
        if self.chars.get(i) != Some(&'[') {
            return (i, false);
        }
        self.reordered = true;
        let (index, width, well_formed) = parse_arg_index(&self.chars[i..]);
        match index {
            Some(n) if well_formed && (1..=self.params.len()).contains(&n) => {
                self.arg = n - 1;
                (i + width, true)
            }
            _ => {
                self.good_index = false;
                (i + width, well_formed)
            }
        }
    }

    /// `*` consumes an operand; string operands never yield a number.
    fn star(&mut self) -> Option<usize> {
        if self.arg < self.params.len() {
            self.arg += 1;
        }
        None
    }
}

/// Digits in `chars[start..end]`. Returns the value, if any, and the
/// position after it; an overlong number swallows the rest of the input.
fn parse_number(chars: &[char], start: usize, end: usize) -> (Option<usize>, usize) {
    let mut num: Option<usize> = None;
    let mut i = start;
    while i < end {
        let Some(digit) = chars[i].to_digit(10) else {
            break;
        };
        let current = num.unwrap_or(0);
        if current > NUMBER_LIMIT {
            return (None, end);
        }
        num = Some(current * 10 + digit as usize);
        i += 1;
    }
    (num, i)
}

/// Parses `[n]` at the start of `chars`. Returns the 1-based index, the
/// number of characters consumed and whether the brackets were well formed.
fn parse_arg_index(chars: &[char]) -> (Option<usize>, usize, bool) {
    if chars.len() < 3 {
        return (None, 1, false);
    }
    match chars.iter().skip(1).position(|c| *c == ']') {
        Some(offset) => {
            let close = offset + 1;
            match parse_number(chars, 1, close) {
                (Some(n), next) if next == close => (Some(n), close + 1, true),
                _ => (None, close + 1, false),
            }
        }
        None => (None, 1, false),
    }
}

fn can_backquote(text: &str) -> bool {
    !text
        .chars()
        .any(|c| c == '`' || c == '\u{7f}' || c == '\u{feff}' || (c < ' ' && c != '\t'))
}

fn quote(raw: &str, ascii_only: bool) -> String {
    let mut quoted = String::with_capacity(raw.len() + 2);
    quoted.push('"');
    for c in raw.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\u{7}' => quoted.push_str("\\a"),
            '\u{8}' => quoted.push_str("\\b"),
            '\u{c}' => quoted.push_str("\\f"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\u{b}' => quoted.push_str("\\v"),
            c if c < ' ' || c == '\u{7f}' => quoted.push_str(&format!("\\x{:02x}", c as u32)),
            c if c.is_control() || (ascii_only && !c.is_ascii()) => {
                if (c as u32) < 0x10000 {
                    quoted.push_str(&format!("\\u{:04x}", c as u32));
                } else {
                    quoted.push_str(&format!("\\U{:08x}", c as u32));
                }
            }
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
