//! Type, name, and parameter patterns
//!
//! Patterns tokenize on `.`:
//! - `*` inside a segment matches any run of characters within that segment;
//!   a lone `*` segment matches exactly one segment
//! - `..` matches zero or more segments (type patterns) or any number of
//!   parameters (start/end of a parameter list only)
//!
//! Single-segment patterns (`PaymentService`, `*Service`, `*`) are matched
//! against the simple name of a type, so they select a type regardless of
//! its package. Qualified patterns match full names segment by segment.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// TYPE PATTERNS
// =============================================================================

/// One `.`-separated element of a type pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    /// A segment name, possibly containing `*` wildcards
    Name(String),
    /// `..` - zero or more segments
    AnyDepth,
}

/// Pattern over fully-qualified type names, e.g. `com.x..*Service`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypePattern {
    pub segments: Vec<Segment>,
}

impl TypePattern {
    /// Pattern matching every type (`*`)
    pub fn any() -> Self {
        Self {
            segments: vec![Segment::Name("*".to_string())],
        }
    }

    /// Check whether this is the match-everything pattern
    pub fn is_any(&self) -> bool {
        matches!(self.segments.as_slice(), [Segment::Name(n)] if n == "*")
    }

    /// Tokenize raw pattern text into segments.
    ///
    /// Rejects empty segments (`a..b.` / `.a`) and runs of three or more dots.
    pub fn parse(raw: &str) -> Result<Self, &'static str> {
        let mut segments = Vec::new();
        let mut rest = raw;

        loop {
            let end = rest.find('.').unwrap_or(rest.len());
            let name = &rest[..end];
            if name.is_empty() {
                return Err("type pattern segment");
            }
            segments.push(Segment::Name(name.to_string()));
            rest = &rest[end..];

            if rest.is_empty() {
                break;
            }

            if let Some(after) = rest.strip_prefix("..") {
                if after.starts_with('.') {
                    return Err("at most two consecutive dots in a type pattern");
                }
                segments.push(Segment::AnyDepth);
                rest = after;
                if rest.is_empty() {
                    break;
                }
            } else {
                rest = &rest[1..];
                if rest.is_empty() {
                    return Err("type pattern segment after '.'");
                }
            }
        }

        Ok(Self { segments })
    }

    /// Match a fully-qualified type name
    pub fn matches(&self, type_name: &str) -> bool {
        if let [Segment::Name(only)] = self.segments.as_slice() {
            return glob_match(only, simple_name(type_name));
        }
        let parts: Vec<&str> = type_name.split('.').collect();
        segments_match(&self.segments, &parts)
    }
}

fn segments_match(pattern: &[Segment], parts: &[&str]) -> bool {
    match pattern.split_first() {
        None => parts.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=parts.len()).any(|skip| segments_match(rest, &parts[skip..]))
        }
        Some((Segment::Name(glob), rest)) => match parts.split_first() {
            Some((first, tail)) => glob_match(glob, first) && segments_match(rest, tail),
            None => false,
        },
    }
}

impl fmt::Display for TypePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Name(name) => {
                    if !out.is_empty() && !out.ends_with("..") {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                Segment::AnyDepth => out.push_str(".."),
            }
        }
        f.write_str(&out)
    }
}

// =============================================================================
// NAME PATTERNS
// =============================================================================

/// Single-segment glob for method names, e.g. `process*`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamePattern(pub String);

impl NamePattern {
    pub fn new(glob: impl Into<String>) -> Self {
        Self(glob.into())
    }

    pub fn matches(&self, name: &str) -> bool {
        glob_match(&self.0, name)
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// PARAMETER PATTERNS
// =============================================================================

/// Parameter list pattern: `()`, `(..)`, `(*, String)`, `(.., int)`, `(Request, ..)`
///
/// `..` is only legal at the start and/or end of the list, so the pattern is
/// fully described by the fixed middle and two "open end" flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamPattern {
    pub leading_any: bool,
    pub types: Vec<TypePattern>,
    pub trailing_any: bool,
}

impl ParamPattern {
    pub fn new(leading_any: bool, types: Vec<TypePattern>, trailing_any: bool) -> Self {
        // (.., ..) says nothing more than (..)
        let trailing_any = trailing_any && !(leading_any && types.is_empty());
        Self {
            leading_any,
            types,
            trailing_any,
        }
    }

    /// `(..)` - any parameters
    pub fn any() -> Self {
        Self::new(true, Vec::new(), false)
    }

    /// `()` - no parameters
    pub fn none() -> Self {
        Self::new(false, Vec::new(), false)
    }

    /// Exact positional list
    pub fn exact(types: Vec<TypePattern>) -> Self {
        Self::new(false, types, false)
    }

    /// Match declared parameter types (values are never consulted)
    pub fn matches(&self, params: &[String]) -> bool {
        let n = self.types.len();
        let all = |window: &[String]| {
            self.types
                .iter()
                .zip(window)
                .all(|(pattern, param)| pattern.matches(param))
        };

        match (self.leading_any, self.trailing_any) {
            (false, false) => params.len() == n && all(params),
            (true, false) => params.len() >= n && all(&params[params.len() - n..]),
            (false, true) => params.len() >= n && all(&params[..n]),
            (true, true) => n == 0 || params.windows(n).any(all),
        }
    }
}

impl fmt::Display for ParamPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut items: Vec<String> = Vec::with_capacity(self.types.len() + 2);
        if self.leading_any {
            items.push("..".to_string());
        }
        items.extend(self.types.iter().map(|t| t.to_string()));
        if self.trailing_any {
            items.push("..".to_string());
        }
        write!(f, "({})", items.join(", "))
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Last `.`-separated segment of a qualified name
pub fn simple_name(type_name: &str) -> &str {
    type_name.rsplit('.').next().unwrap_or(type_name)
}

/// Exact type-name comparison used by `target`, `this`, and annotation ids.
///
/// A qualified name must match exactly; an unqualified one may also match
/// the candidate's simple name.
pub fn type_name_matches(name: &str, candidate: &str) -> bool {
    if name.contains('.') {
        name == candidate
    } else {
        candidate == name || simple_name(candidate) == name
    }
}

/// `*`-only glob match (no character classes)
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            pi += 1;
            mark = ti;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tp(raw: &str) -> TypePattern {
        TypePattern::parse(raw).unwrap()
    }

    fn params(types: &[&str]) -> Vec<String> {
        types.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("*", ""));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("process*", "processPayment"));
        assert!(glob_match("*Payment", "processPayment"));
        assert!(glob_match("p*P*t", "processPayment"));
        assert!(!glob_match("process*", "refund"));
        assert!(!glob_match("charge", "charges"));
    }

    #[test]
    fn test_parse_segments() {
        assert_eq!(
            tp("com..Service").segments,
            vec![
                Segment::Name("com".into()),
                Segment::AnyDepth,
                Segment::Name("Service".into()),
            ]
        );
        assert_eq!(tp("com.x..").segments.last(), Some(&Segment::AnyDepth));
        assert!(TypePattern::parse(".com").is_err());
        assert!(TypePattern::parse("com.").is_err());
        assert!(TypePattern::parse("com...x").is_err());
    }

    #[test]
    fn test_qualified_type_match() {
        let pattern = tp("com.x.Service");
        assert!(pattern.matches("com.x.Service"));
        assert!(!pattern.matches("com.x.Other"));
        assert!(!pattern.matches("com.x.sub.Service"));

        let star = tp("com.x.*");
        assert!(star.matches("com.x.Service"));
        assert!(!star.matches("com.x.sub.Service"));
        assert!(!star.matches("com.x"));
    }

    #[test]
    fn test_any_depth_type_match() {
        let pattern = tp("com..*Service");
        assert!(pattern.matches("com.PaymentService"));
        assert!(pattern.matches("com.a.b.c.PaymentService"));
        assert!(!pattern.matches("org.PaymentService"));

        let subpackages = tp("com.x..");
        assert!(subpackages.matches("com.x"));
        assert!(subpackages.matches("com.x.y.Z"));
    }

    #[test]
    fn test_single_segment_matches_simple_name() {
        assert!(tp("PaymentService").matches("payments.service.PaymentService"));
        assert!(tp("*Service").matches("payments.service.PaymentService"));
        assert!(TypePattern::any().matches("java.lang.String"));
        assert!(!tp("Payment").matches("payments.service.PaymentService"));
    }

    #[test]
    fn test_type_pattern_display() {
        for raw in ["com.x.Service", "com..*", "com.x..", "*"] {
            assert_eq!(tp(raw).to_string(), raw);
        }
    }

    #[test]
    fn test_param_patterns() {
        assert!(ParamPattern::any().matches(&[]));
        assert!(ParamPattern::any().matches(&params(&["int", "String"])));

        assert!(ParamPattern::none().matches(&[]));
        assert!(!ParamPattern::none().matches(&params(&["int"])));

        let one = ParamPattern::exact(vec![TypePattern::any()]);
        assert!(one.matches(&params(&["com.x.Request"])));
        assert!(!one.matches(&params(&["a", "b"])));

        let trailing = ParamPattern::new(false, vec![tp("Request")], true);
        assert!(trailing.matches(&params(&["com.x.Request", "int"])));
        assert!(!trailing.matches(&params(&["int", "com.x.Request"])));

        let leading = ParamPattern::new(true, vec![tp("int")], false);
        assert!(leading.matches(&params(&["com.x.Request", "int"])));
        assert!(!leading.matches(&params(&[])));

        let both = ParamPattern::new(true, vec![tp("int")], true);
        assert!(both.matches(&params(&["a", "int", "b"])));
        assert!(!both.matches(&params(&["a", "b"])));
    }

    #[test]
    fn test_param_pattern_display() {
        assert_eq!(ParamPattern::any().to_string(), "(..)");
        assert_eq!(ParamPattern::none().to_string(), "()");
        assert_eq!(
            ParamPattern::new(false, vec![tp("String")], true).to_string(),
            "(String, ..)"
        );
        assert_eq!(ParamPattern::new(true, vec![], true), ParamPattern::any());
    }

    #[test]
    fn test_type_name_matches() {
        assert!(type_name_matches("PaymentCheck", "payments.annotation.PaymentCheck"));
        assert!(type_name_matches(
            "payments.annotation.PaymentCheck",
            "payments.annotation.PaymentCheck"
        ));
        assert!(!type_name_matches("other.PaymentCheck", "payments.annotation.PaymentCheck"));
        assert!(!type_name_matches("Payment", "payments.annotation.PaymentCheck"));
    }
}
