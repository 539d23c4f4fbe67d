//! Pointcut expression parser
//!
//! Turns a predicate string into a [`PointcutExpr`]. Parsing happens once,
//! at registration time; the hot path only ever sees the AST.
//!
//! ## Grammar
//!
//! ```text
//! expr     := and ("||" and)*
//! and      := unary ("&&" unary)*
//! unary    := "!" unary | primary
//! primary  := "(" expr ")" | leaf | ident ["()"]
//! leaf     := "execution(" [modifier]* retPat WS qualifiedMethodPat "(" params ")" ")"
//!           | "within(" typePat ")" | "@within(" annId ")"
//!           | "@annotation(" annId ")" | "target(" typeName ")"
//!           | "this(" typeName ")" | "args(" params ")"
//! params   := [item ("," item)*]      -- item is a type pattern or ".."
//! ```
//!
//! The parser is total and fails fast: the first error is reported with the
//! offending token and its byte position. There is no recovery. Nesting of
//! `!` and parentheses is capped at [`MAX_NESTING`].

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{alpha1, alphanumeric1, char, multispace0, multispace1},
    combinator::{all_consuming, cut, map, not, opt, recognize},
    error::{context, ErrorKind, VerboseError, VerboseErrorKind},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};
use thiserror::Error;

use crate::ast::{ExecutionPattern, PointcutExpr};
use crate::pattern::{NamePattern, ParamPattern, Segment, TypePattern};

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Deepest accepted nesting of `!` and parenthesized groups
pub const MAX_NESTING: usize = 64;

// ============================================================================
// Errors
// ============================================================================

/// Localized parse failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected} at position {position}, found '{token}'")]
pub struct PointcutParseError {
    /// Byte offset of the offending token
    pub position: usize,
    /// The offending token (`<end of input>` when input ran out)
    pub token: String,
    /// What the parser was looking for
    pub expected: String,
}

impl PointcutParseError {
    fn from_verbose(source: &str, error: &VerboseError<&str>) -> Self {
        let rest = error.errors.first().map(|(rest, _)| *rest).unwrap_or(source);

        let expected = match error.errors.first().map(|(_, kind)| kind) {
            Some(VerboseErrorKind::Nom(ErrorKind::Eof)) => "end of expression".to_string(),
            first => error
                .errors
                .iter()
                .find_map(|(_, kind)| match kind {
                    VerboseErrorKind::Context(ctx) => Some(ctx.to_string()),
                    _ => None,
                })
                .unwrap_or_else(|| match first {
                    Some(VerboseErrorKind::Char(c)) => format!("'{}'", c),
                    Some(VerboseErrorKind::Nom(kind)) => format!("{:?}", kind).to_lowercase(),
                    _ => "pointcut expression".to_string(),
                }),
        };

        Self::at(source, rest, expected)
    }

    fn at(source: &str, rest: &str, expected: impl Into<String>) -> Self {
        let trimmed = rest.trim_start();
        Self {
            position: source.len() - trimmed.len(),
            token: offending_token(trimmed),
            expected: expected.into(),
        }
    }
}

fn offending_token(rest: &str) -> String {
    if rest.is_empty() {
        return "<end of input>".to_string();
    }
    if rest.starts_with("&&") || rest.starts_with("||") {
        return rest[..2].to_string();
    }
    let word_len = rest
        .char_indices()
        .find(|(_, c)| !is_word_char(*c) && *c != '@')
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    if word_len > 0 {
        rest[..word_len].to_string()
    } else {
        rest.chars().next().map(String::from).unwrap_or_default()
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Parse a complete pointcut expression
pub fn parse_pointcut(input: &str) -> Result<PointcutExpr, PointcutParseError> {
    if input.trim().is_empty() {
        return Err(PointcutParseError::at(input, input, "pointcut expression"));
    }

    match all_consuming(delimited(multispace0, |i| or_expr(i, 0), multispace0))(input) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(PointcutParseError::from_verbose(input, &e))
        }
        Err(nom::Err::Incomplete(_)) => {
            Err(PointcutParseError::at(input, "", "more input"))
        }
    }
}

/// Parse a standalone type pattern (e.g. for configuration validation)
pub fn parse_type_pattern(input: &str) -> Result<TypePattern, PointcutParseError> {
    match all_consuming(delimited(multispace0, type_pattern, multispace0))(input) {
        Ok((_, pattern)) => Ok(pattern),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(PointcutParseError::from_verbose(input, &e))
        }
        Err(nom::Err::Incomplete(_)) => Err(PointcutParseError::at(input, "", "more input")),
    }
}

// ============================================================================
// Boolean structure
// ============================================================================

fn operator<'a>(op: &'static str) -> impl FnMut(&'a str) -> Res<'a, &'a str> {
    delimited(multispace0, tag(op), multispace0)
}

fn or_expr(input: &str, depth: usize) -> Res<'_, PointcutExpr> {
    let (input, first) = and_expr(input, depth)?;
    let (input, rest) = many0(preceded(
        operator("||"),
        cut(context("expression after '||'", |i| and_expr(i, depth))),
    ))(input)?;
    Ok((input, rest.into_iter().fold(first, PointcutExpr::or)))
}

fn and_expr(input: &str, depth: usize) -> Res<'_, PointcutExpr> {
    let (input, first) = unary(input, depth)?;
    let (input, rest) = many0(preceded(
        operator("&&"),
        cut(context("expression after '&&'", |i| unary(i, depth))),
    ))(input)?;
    Ok((input, rest.into_iter().fold(first, PointcutExpr::and)))
}

fn unary(input: &str, depth: usize) -> Res<'_, PointcutExpr> {
    let (input, _) = multispace0(input)?;
    if depth >= MAX_NESTING {
        return Err(failure(input, "nesting within the depth limit"));
    }
    alt((
        map(
            preceded(
                terminated(char('!'), multispace0),
                cut(context("expression after '!'", |i| unary(i, depth + 1))),
            ),
            PointcutExpr::negate,
        ),
        |i| primary(i, depth),
    ))(input)
}

fn primary(input: &str, depth: usize) -> Res<'_, PointcutExpr> {
    context("pointcut", alt((|i| parenthesized(i, depth), leaf)))(input)
}

fn parenthesized(input: &str, depth: usize) -> Res<'_, PointcutExpr> {
    let (input, _) = char('(')(input)?;
    let (input, expr) = cut(|i| or_expr(i, depth + 1))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = cut(context("')'", char(')')))(input)?;
    Ok((input, expr))
}

// ============================================================================
// Designators
// ============================================================================

fn leaf(input: &str) -> Res<'_, PointcutExpr> {
    let start = input;
    let (input, word) = recognize(pair(opt(char('@')), identifier))(input)?;

    match word {
        "execution" => designator_args(input, map(execution_body, PointcutExpr::Execution)),
        "within" => designator_args(input, map(type_pattern, PointcutExpr::Within)),
        "@within" => designator_args(input, map(qualified_name, PointcutExpr::AnnotatedType)),
        "@annotation" => {
            designator_args(input, map(qualified_name, PointcutExpr::AnnotatedMethod))
        }
        "target" => designator_args(input, map(qualified_name, PointcutExpr::TargetType)),
        "this" => designator_args(input, map(qualified_name, PointcutExpr::ThisType)),
        "args" => designator_args(input, map(param_list, PointcutExpr::Args)),
        w if w.starts_with('@') => Err(failure(start, "designator '@within' or '@annotation'")),
        name => {
            // Named pointcuts may be written method-style: `serviceLayer()`
            let (input, _) = opt(preceded(
                multispace0,
                pair(char('('), preceded(multispace0, char(')'))),
            ))(input)?;
            Ok((input, PointcutExpr::Ref(name.to_string())))
        }
    }
}

fn designator_args<'a, O, F>(input: &'a str, inner: F) -> Res<'a, O>
where
    F: FnMut(&'a str) -> Res<'a, O>,
{
    let (input, _) = multispace0(input)?;
    let (input, _) = cut(context("'('", char('(')))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, out) = cut(inner)(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = cut(context("')'", char(')')))(input)?;
    Ok((input, out))
}

/// `[modifiers] retPat qualifiedMethodPat(params)`
fn execution_body(input: &str) -> Res<'_, ExecutionPattern> {
    let (input, _) = many0(terminated(modifier, multispace1))(input)?;
    let (input, return_type) = context("return type pattern", type_pattern)(input)?;
    let (input, _) =
        context("whitespace after return type", multispace1::<_, VerboseError<&str>>)(input)?;
    let (input, (declaring_type, method)) = qualified_method(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = context("'(' before parameter list", char('('))(input)?;
    let (input, params) = param_list(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = context("')' after parameter list", char(')'))(input)?;

    Ok((
        input,
        ExecutionPattern {
            return_type,
            declaring_type,
            method,
            params,
        },
    ))
}

fn modifier(input: &str) -> Res<'_, &str> {
    alt((
        tag("public"),
        tag("protected"),
        tag("private"),
        tag("static"),
        tag("final"),
    ))(input)
}

/// Declaring-type segments followed by the method-name segment
fn qualified_method(input: &str) -> Res<'_, (TypePattern, NamePattern)> {
    let start = input;
    let (input, raw) = context("method pattern", pattern_text)(input)?;
    let mut pattern = TypePattern::parse(raw).map_err(|msg| failure(start, msg))?;

    let method = match pattern.segments.pop() {
        Some(Segment::Name(name)) => NamePattern::new(name),
        _ => return Err(failure(start, "method name pattern")),
    };

    let declaring = if pattern.segments.is_empty() {
        TypePattern::any()
    } else {
        pattern
    };

    Ok((input, (declaring, method)))
}

// ============================================================================
// Patterns
// ============================================================================

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_pattern_char(c: char) -> bool {
    is_word_char(c) || c == '*' || c == '[' || c == ']'
}

fn pattern_text(input: &str) -> Res<'_, &str> {
    take_while1(|c: char| is_pattern_char(c) || c == '.')(input)
}

fn type_pattern(input: &str) -> Res<'_, TypePattern> {
    let start = input;
    let (input, raw) = context("type pattern", pattern_text)(input)?;
    let pattern = TypePattern::parse(raw).map_err(|msg| failure(start, msg))?;
    Ok((input, pattern))
}

/// Dotted name without wildcards (annotation ids, `target`/`this` types)
fn qualified_name(input: &str) -> Res<'_, String> {
    let (input, name) = context(
        "qualified type name",
        recognize(separated_list1(char('.'), take_while1(is_word_char))),
    )(input)?;
    Ok((input, name.to_string()))
}

enum ParamItem {
    AnyDepth,
    Type(TypePattern),
}

fn param_item(input: &str) -> Res<'_, ParamItem> {
    alt((
        map(terminated(tag(".."), not(char('.'))), |_| ParamItem::AnyDepth),
        map(type_pattern, ParamItem::Type),
    ))(input)
}

/// Contents between the parentheses of a parameter list
fn param_list(input: &str) -> Res<'_, ParamPattern> {
    let (mut input, _) = multispace0(input)?;
    if input.starts_with(')') {
        return Ok((input, ParamPattern::none()));
    }

    let mut items = Vec::new();
    loop {
        let at = input;
        let (rest, item) = cut(context("parameter type pattern or '..'", param_item))(input)?;
        items.push((at, item));
        let (rest, _) = multispace0(rest)?;
        match char::<_, VerboseError<&str>>(',')(rest) {
            Ok((rest, _)) => {
                let (rest, _) = multispace0(rest)?;
                input = rest;
            }
            Err(_) => {
                input = rest;
                break;
            }
        }
    }

    let last = items.len() - 1;
    let mut leading_any = false;
    let mut trailing_any = false;
    let mut types = Vec::new();

    for (idx, (at, item)) in items.into_iter().enumerate() {
        match item {
            ParamItem::AnyDepth if idx == 0 => leading_any = true,
            ParamItem::AnyDepth if idx == last => trailing_any = true,
            ParamItem::AnyDepth => {
                return Err(failure(at, "'..' only at the start or end of a parameter list"))
            }
            ParamItem::Type(tp) => types.push(tp),
        }
    }

    Ok((input, ParamPattern::new(leading_any, types, trailing_any)))
}

fn identifier(input: &str) -> Res<'_, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_"), tag("-")))),
    ))(input)
}

fn failure<'a>(at: &'a str, expected: &'static str) -> nom::Err<VerboseError<&'a str>> {
    nom::Err::Failure(VerboseError {
        errors: vec![(at, VerboseErrorKind::Context(expected))],
    })
}

// ============================================================================
// Tests
// ============================================================================
