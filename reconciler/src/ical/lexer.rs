//! Content line lexer: unfolding and `name;params:value` tokenizing.

use super::error::{ParseError, ParseErrorKind, ParseResult};

/// One unfolded `name *(";" param) ":" value` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLine {
    /// Upper-cased property name
    pub name: String,
    /// Upper-cased parameter names with their unquoted values
    pub params: Vec<(String, String)>,
    pub value: String,
}

impl ContentLine {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Splits input into logical lines, merging folded continuations. Returns
/// each line with the number of the physical line it started on. Accepts both
/// CRLF and bare LF.
pub fn split_lines(input: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();

    for (i, raw_line) in input.lines().enumerate() {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }

        if let Some(continuation) = line.strip_prefix([' ', '\t']) {
            match lines.last_mut() {
                Some((_, prev)) => prev.push_str(continuation),
                None => lines.push((i + 1, continuation.to_string())),
            }
        } else {
            lines.push((i + 1, line.to_string()));
        }
    }

    lines
}

pub fn parse_content_line(line: &str, line_num: usize) -> ParseResult<ContentLine> {
    let name_end = line
        .find([';', ':'])
        .ok_or_else(|| ParseError::new(ParseErrorKind::MissingColon, line_num))?;

    let name = line[..name_end].trim();
    if name.is_empty() {
        return Err(ParseError::new(ParseErrorKind::MissingPropertyName, line_num));
    }

    let mut params = Vec::new();
    let mut rest = &line[name_end..];

    while let Some(after_semi) = rest.strip_prefix(';') {
        let eq = after_semi
            .find('=')
            .ok_or_else(|| ParseError::new(ParseErrorKind::MissingColon, line_num))?;
        let param_name = after_semi[..eq].trim().to_ascii_uppercase();
        let after_eq = &after_semi[eq + 1..];

        let (param_value, remainder) = if let Some(quoted) = after_eq.strip_prefix('"') {
            let close = quoted
                .find('"')
                .ok_or_else(|| ParseError::new(ParseErrorKind::UnclosedQuote, line_num))?;
            (&quoted[..close], &quoted[close + 1..])
        } else {
            let end = after_eq
                .find([';', ':'])
                .ok_or_else(|| ParseError::new(ParseErrorKind::MissingColon, line_num))?;
            (&after_eq[..end], &after_eq[end..])
        };

        params.push((param_name, param_value.to_string()));
        rest = remainder;
    }

    let value = rest
        .strip_prefix(':')
        .ok_or_else(|| ParseError::new(ParseErrorKind::MissingColon, line_num))?;

    Ok(ContentLine {
        name: name.to_ascii_uppercase(),
        params,
        value: value.to_string(),
    })
}

/// Reverses TEXT escaping (`\n`, `\,`, `\;`, `\\`).
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}
