//! Resource Identifiers: `PATH:METHOD[:SIGNAL]` wildcard patterns used by
//! subscriptions and access grants (§3.6, §8).
//!
//! `PATH` is matched segment-by-segment against `/`-separated text, with
//! POSIX.2 3.13-style wildcards within a segment (`?`, `*`, `[...]`) and a
//! `**` segment that matches zero or more whole path segments. `METHOD`
//! and `SIGNAL` are matched as single glob segments (no `/` in either).

use crate::error::ProtoError;

/// A parsed `PATH:METHOD[:SIGNAL]` pattern, ready to test candidates
/// against with [`ResourceId::matches`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceId {
    pub path: String,
    pub method: String,
    pub signal: Option<String>,
}

impl ResourceId {
    pub fn parse(s: &str) -> Result<Self, ProtoError> {
        let mut parts = s.splitn(3, ':');
        let path = parts
            .next()
            .ok_or_else(|| ProtoError::InvalidRi(s.to_string()))?
            .to_string();
        let method = parts
            .next()
            .ok_or_else(|| ProtoError::InvalidRi(s.to_string()))?
            .to_string();
        let signal = parts.next().map(str::to_string);
        Ok(ResourceId { path, method, signal })
    }

    pub fn matches(&self, path: &str, method: &str, signal: Option<&str>) -> bool {
        path_match(&self.path, path)
            && glob_match_segment(&self.method, method)
            && match (&self.signal, signal) {
                (None, _) => true,
                (Some(pat), Some(sig)) => glob_match_segment(pat, sig),
                (Some(_), None) => false,
            }
    }
}

/// Match a `/`-separated path against a pattern whose segments may be
/// literal, a single-segment glob, or `**` (zero or more segments).
pub fn path_match(pattern: &str, text: &str) -> bool {
    let pat_segs: Vec<&str> = pattern.split('/').collect();
    let text_segs: Vec<&str> = if text.is_empty() {
        Vec::new()
    } else {
        text.split('/').collect()
    };
    match_segments(&pat_segs, &text_segs)
}

fn match_segments(pat: &[&str], text: &[&str]) -> bool {
    match pat.first() {
        None => text.is_empty(),
        Some(&"**") => {
            // ** matches zero or more whole segments: try consuming 0, 1, 2, ...
            for i in 0..=text.len() {
                if match_segments(&pat[1..], &text[i..]) {
                    return true;
                }
            }
            false
        }
        Some(seg) => match text.first() {
            Some(t) if glob_match_segment(seg, t) => match_segments(&pat[1..], &text[1..]),
            _ => false,
        },
    }
}

/// Match one path/method/signal segment against a POSIX.2-ish glob:
/// `*` any run of characters, `?` one character, `[abc]`/`[a-z]`/`[!abc]`
/// a character class.
pub fn glob_match_segment(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    glob_rec(&p, &t)
}

fn glob_rec(p: &[char], t: &[char]) -> bool {
    match p.first() {
        None => t.is_empty(),
        Some('*') => {
            for i in 0..=t.len() {
                if glob_rec(&p[1..], &t[i..]) {
                    return true;
                }
            }
            false
        }
        Some('?') => !t.is_empty() && glob_rec(&p[1..], &t[1..]),
        Some('[') => {
            let Some(close) = p.iter().position(|&c| c == ']') else {
                return !t.is_empty() && t[0] == '[' && glob_rec(&p[1..], &t[1..]);
            };
            if t.is_empty() {
                return false;
            }
            let class = &p[1..close];
            let (negate, class) = if class.first() == Some(&'!') {
                (true, &class[1..])
            } else {
                (false, class)
            };
            let hit = char_in_class(class, t[0]);
            if hit == negate {
                return false;
            }
            glob_rec(&p[close + 1..], &t[1..])
        }
        Some(c) => !t.is_empty() && t[0] == *c && glob_rec(&p[1..], &t[1..]),
    }
}

fn char_in_class(class: &[char], c: char) -> bool {
    let mut i = 0;
    while i < class.len() {
        if i + 2 < class.len() && class[i + 1] == '-' {
            if c >= class[i] && c <= class[i + 2] {
                return true;
            }
            i += 3;
        } else {
            if class[i] == c {
                return true;
            }
            i += 1;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_path_matches_itself() {
        assert!(path_match("a/b/c", "a/b/c"));
        assert!(!path_match("a/b/c", "a/b/d"));
    }

    #[test]
    fn star_matches_within_segment_only() {
        assert!(path_match("a/*/c", "a/xyz/c"));
        assert!(!path_match("a/*/c", "a/x/y/c"));
    }

    #[test]
    fn double_star_matches_zero_segments() {
        assert!(path_match("a/**/c", "a/c"));
        assert!(path_match("a/**/c", "a/b/c"));
        assert!(path_match("a/**/c", "a/b/d/c"));
    }

    #[test]
    fn double_star_matches_zero_segments_before_trailing_slash() {
        assert!(path_match("foo/**", "foo"));
        assert!(path_match("foo/**", "foo/bar"));
        assert!(path_match("foo/**", "foo/bar/baz"));
    }

    #[test]
    fn full_ri_matches_method_and_signal() {
        let ri = ResourceId::parse("test/**:get:chng").unwrap();
        assert!(ri.matches("test/device", "get", Some("chng")));
        assert!(!ri.matches("test/device", "set", Some("chng")));
        assert!(!ri.matches("test/device", "get", Some("other")));
    }

    #[test]
    fn ri_without_signal_matches_any_signal() {
        let ri = ResourceId::parse("a/b:*").unwrap();
        assert!(ri.matches("a/b", "get", None));
        assert!(ri.matches("a/b", "get", Some("chng")));
    }

    #[test]
    fn character_class() {
        assert!(glob_match_segment("[a-c]bc", "abc"));
        assert!(!glob_match_segment("[!a-c]bc", "abc"));
    }
}
