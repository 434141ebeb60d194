//! Top-level argument splitting for SQL function calls.
//!
//! Given the text between a call's outer parentheses, [`split_call_args`]
//! returns the comma-separated arguments exactly as a human reading the call
//! would delimit them: commas inside nested calls, inside single- or
//! double-quoted literals, or behind a backslash escape never split.

use thiserror::Error;

/// Structural errors in a call's argument text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    /// More `)` than `(`, or parentheses left open at end of input.
    #[error("unbalanced parentheses in argument list")]
    Unbalanced,

    /// A quoted literal was never closed.
    #[error("unterminated {0} quote in argument list")]
    UnterminatedQuote(char),
}

/// Split a call's interior into trimmed top-level arguments.
///
/// Single left-to-right scan tracking nesting depth, the active quote
/// character, and a pending backslash escape. A comma is a split point only
/// at depth zero outside quotes. Empty segments are dropped.
///
/// Unbalanced input fails fast rather than mis-splitting silently.
pub fn split_call_args(input: &str) -> Result<Vec<String>, ArgsError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth: u32 = 0;
    let mut quote: Option<char> = None;
    let mut escape = false;

    for ch in input.chars() {
        if escape {
            current.push(ch);
            escape = false;
            continue;
        }

        if ch == '\\' {
            escape = true;
            current.push(ch);
            continue;
        }

        if let Some(q) = quote {
            current.push(ch);
            if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                if depth == 0 {
                    return Err(ArgsError::Unbalanced);
                }
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                push_arg(&mut args, &mut current);
            }
            _ => current.push(ch),
        }
    }

    if depth != 0 {
        return Err(ArgsError::Unbalanced);
    }
    if let Some(q) = quote {
        return Err(ArgsError::UnterminatedQuote(q));
    }

    push_arg(&mut args, &mut current);
    Ok(args)
}

fn push_arg(args: &mut Vec<String>, current: &mut String) {
    let arg = current.trim();
    if !arg.is_empty() {
        args.push(arg.to_string());
    }
    current.clear();
}

/// Strip one matching pair of surrounding quotes, if present.
pub fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    let bytes = s.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'\'' || bytes[0] == b'"')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}
