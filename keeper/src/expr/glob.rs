use regex::Regex;

/// A shell-style pattern where `*` matches any run of characters and `?` exactly one. Every other
/// character, brackets included, matches itself.
#[derive(Debug, Clone)]
pub struct Glob {
    source: String,
    exact: Regex,
    search: Regex,
}

fn translate(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2);
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    out
}

impl Glob {
    pub fn new(glob: &str) -> Self {
        let pattern = translate(glob);
        // The translated pattern only contains escaped literals, `.` and `.*`.
        Self {
            source: glob.to_owned(),
            exact: Regex::new(&format!("(?s)^(?:{pattern})$")).unwrap(),
            search: Regex::new(&format!("(?s){pattern}")).unwrap(),
        }
    }

    fn matches(&self, s: &str) -> bool {
        self.exact.is_match(s)
    }

    /// `${s%glob}` when `longest` is false, `${s%%glob}` otherwise.
    pub fn strip_suffix<'a>(&self, s: &'a str, longest: bool) -> &'a str {
        let mut boundaries = char_boundaries(s);
        let found = if longest {
            boundaries.find(|&i| self.matches(&s[i..]))
        } else {
            boundaries.rev().find(|&i| self.matches(&s[i..]))
        };
        found.map_or(s, |i| &s[..i])
    }

    /// `${s#glob}` when `longest` is false, `${s##glob}` otherwise.
    pub fn strip_prefix<'a>(&self, s: &'a str, longest: bool) -> &'a str {
        let mut boundaries = char_boundaries(s);
        let found = if longest {
            boundaries.rev().find(|&i| self.matches(&s[..i]))
        } else {
            boundaries.find(|&i| self.matches(&s[..i]))
        };
        found.map_or(s, |i| &s[i..])
    }

    /// Replaces the leftmost match, extended as far as it goes.
    pub fn replace_first(&self, s: &str, with: &str) -> String {
        match self.search.find(s) {
            Some(m) => {
                let mut out = String::with_capacity(s.len() + with.len());
                out.push_str(&s[..m.start()]);
                out.push_str(with);
                out.push_str(&s[m.end()..]);
                out
            }
            None => s.to_owned(),
        }
    }
}

impl PartialEq for Glob {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Glob {}

/// Every index at which `s` can be split, from `0` to `s.len()` inclusive.
fn char_boundaries(s: &str) -> impl DoubleEndedIterator<Item = usize> + '_ {
    s.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_escapes_everything_but_wildcards() {
        assert_eq!(translate("?????678-*.txt"), r".....678\-.*\.txt");
        assert_eq!(translate("[a]"), r"\[a\]");
    }

    #[test]
    fn strip_suffix_shortest_and_longest() {
        let glob = Glob::new(".*");
        assert_eq!(glob.strip_suffix("8.10.0", false), "8.10");
        assert_eq!(glob.strip_suffix("8.10.0", true), "8");
        assert_eq!(glob.strip_suffix("dev", false), "dev");
        assert_eq!(Glob::new("???").strip_suffix("3.14159", false), "3.14");
        assert_eq!(Glob::new("-*").strip_suffix("4.13.1-flambda", false), "4.13.1");
    }

    #[test]
    fn strip_prefix_shortest_and_longest() {
        let glob = Glob::new("*.");
        assert_eq!(glob.strip_prefix("8.10.0", false), "10.0");
        assert_eq!(glob.strip_prefix("8.10.0", true), "0");
        assert_eq!(Glob::new("v").strip_prefix("v8.18", false), "8.18");
    }

    #[test]
    fn replace_first_only_touches_the_leftmost_match() {
        assert_eq!(Glob::new("pl").replace_first("8.5pl3", "."), "8.5.3");
        assert_eq!(Glob::new("-").replace_first("8.12-alpha-1", "+"), "8.12+alpha-1");
        assert_eq!(Glob::new("4.05.0").replace_first("4.05.0", ""), "");
        assert_eq!(Glob::new("x").replace_first("abc", "y"), "abc");
    }

    #[test]
    fn wildcards_span_multibyte_characters() {
        assert_eq!(Glob::new("-*").strip_suffix("café-é", false), "café");
    }
}
