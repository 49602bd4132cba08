//! fnmatch-style globs compiled to regular expressions
//!
//! `*` matches any run of characters including `/`, `?` one character,
//! `[...]` a class (`[!...]` negated). Everything else is literal.

use regex::Regex;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
}

impl Glob {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&translate(pattern)).map_err(|e| Error::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Whether a string contains glob metacharacters.
pub fn has_wildcards(text: &str) -> bool {
    text.contains(['*', '?', '['])
}

fn translate(pattern: &str) -> String {
    let mut out = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => match chars[i + 1..].iter().position(|&c| c == ']') {
                Some(offset) if offset > 0 => {
                    let class: String = chars[i + 1..i + 1 + offset].iter().collect();
                    out.push('[');
                    match class.strip_prefix('!') {
                        Some(rest) => {
                            out.push('^');
                            out.push_str(&escape_class(rest));
                        }
                        None => out.push_str(&escape_class(&class)),
                    }
                    out.push(']');
                    i += offset + 1;
                }
                _ => out.push_str(r"\["),
            },
            '\\' if i + 1 < chars.len() => {
                i += 1;
                out.push_str(&regex::escape(&chars[i].to_string()));
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    out.push('$');
    out
}

fn escape_class(class: &str) -> String {
    class
        .chars()
        .map(|c| match c {
            '\\' | '[' | ']' | '^' | '&' | '~' => format!("\\{}", c),
            c => c.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("*.json", "x.json", true)]
    #[case("*.json", "a/b/x.json", true)]
    #[case("recipes/*", "recipes/a/b.rb", true)]
    #[case("x.json", "recipes/x.json", false)]
    #[case("?.rb", "a.rb", true)]
    #[case("?.rb", "ab.rb", false)]
    #[case("[ab].rb", "b.rb", true)]
    #[case("[!ab].rb", "b.rb", false)]
    #[case("[!ab].rb", "c.rb", true)]
    #[case("a.b", "axb", false)]
    #[case("[unclosed", "[unclosed", true)]
    fn test_matching(#[case] pattern: &str, #[case] text: &str, #[case] expected: bool) {
        assert_eq!(Glob::new(pattern).unwrap().is_match(text), expected);
    }

    #[test]
    fn test_has_wildcards() {
        assert!(has_wildcards("/roles/*.json"));
        assert!(!has_wildcards("/roles/web.json"));
    }
}
