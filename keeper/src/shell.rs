//! POSIX shell quoting for the job scripts of the generated pipeline. Arguments made of safe
//! characters only are left as they are, everything else is single quoted, with each embedded `'`
//! written as `'\''`.

use std::borrow::Cow;

/// Quotes each argument and joins them with spaces.
pub fn quote_join<'a, I: IntoIterator<Item = &'a str>>(args: I) -> String {
    let mut out = String::new();
    quote_join_into(&mut out, args);
    out
}

/// Appends each quoted argument, separated by spaces. If out is non-empty, starts by adding a space
/// before the first arg.
pub fn quote_join_into<'a, I: IntoIterator<Item = &'a str>>(out: &mut String, args: I) {
    for arg in args {
        let stat = arg_encoding_info(arg);
        out.reserve(usize::from(!out.is_empty()) + stat.encoded_len);
        if !out.is_empty() {
            out.push(' ');
        }
        let initial_len = out.len();
        encode_into(out, arg, &stat);
        debug_assert_bytes_written(out.len() - initial_len, stat.encoded_len, arg);
    }
}

/// Quotes a single argument if necessary.
pub fn quote(arg: &str) -> Cow<str> {
    let stat = arg_encoding_info(arg);
    match stat.encoding {
        Encoding::Verbatim => Cow::Borrowed(arg),
        _ => {
            let mut out = String::with_capacity(stat.encoded_len);
            encode_into(&mut out, arg, &stat);
            debug_assert_bytes_written(out.len(), stat.encoded_len, arg);
            Cow::Owned(out)
        }
    }
}

fn debug_assert_bytes_written(actual: usize, expected: usize, arg: &str) {
    debug_assert_eq!(
        actual, expected,
        "wrote {actual} bytes instead of the expected {expected} bytes when encoding {arg:?}",
    );
}

fn encode_into(out: &mut String, arg: &str, stat: &EncodingInfo) {
    match stat.encoding {
        Encoding::Empty => out.push_str("''"),
        Encoding::Verbatim => out.push_str(arg),
        Encoding::SingleQuoted => {
            out.push('\'');
            let mut parts = arg.split('\'');
            if let Some(first) = parts.next() {
                out.push_str(first);
            }
            for part in parts {
                out.push_str(r"'\''");
                out.push_str(part);
            }
            out.push('\'');
        }
    }
}

enum Encoding {
    /// The input string was empty.
    Empty,
    /// The input string can be written as-is.
    Verbatim,
    /// The input string must be single quoted.
    SingleQuoted,
}

struct EncodingInfo {
    encoded_len: usize,
    encoding: Encoding,
}

fn arg_encoding_info(arg: &str) -> EncodingInfo {
    if arg.is_empty() {
        return EncodingInfo {
            encoded_len: 2,
            encoding: Encoding::Empty,
        };
    }

    let mut all_inert = true;
    let mut quotes = 0;
    for b in arg.bytes() {
        match kind(b) {
            Kind::Inert => {}
            Kind::SingleQuote => {
                all_inert = false;
                quotes += 1;
            }
            Kind::Special => all_inert = false,
        }
    }

    if all_inert {
        EncodingInfo {
            encoded_len: arg.len(),
            encoding: Encoding::Verbatim,
        }
    } else {
        // Each `'` grows into `'\''`, plus the surrounding pair.
        EncodingInfo {
            encoded_len: arg.len() + 3 * quotes + 2,
            encoding: Encoding::SingleQuoted,
        }
    }
}

#[derive(Clone, Copy)]
enum Kind {
    /// Never interpreted by the shell.
    Inert,
    SingleQuote,
    /// Anything else, literal inside single quotes.
    Special,
}

fn kind(b: u8) -> Kind {
    match b {
        b'a'..=b'z'
        | b'A'..=b'Z'
        | b'0'..=b'9'
        | b',' | b'.' | b'/' | b'_' | b'-' | b'+' | b'=' | b':' | b'@' | b'%' => Kind::Inert,
        b'\'' => Kind::SingleQuote,
        _ => Kind::Special,
    }
}
