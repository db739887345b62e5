//! Template parser
//!
//! Parses the substitution subset of Go template syntax into an AST using pest.

use pest::Parser;
use pest::error::{ErrorVariant, InputLocation};
use pest::iterators::Pair;
use pest_derive::Parser;
use thiserror::Error;

use crate::ast::*;

#[derive(Parser)]
#[grammar = "template.pest"]
struct TemplateParser;

/// Go template actions that only make sense with control flow
const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "end", "range", "with", "define", "template", "block", "break", "continue",
];

/// Parser error
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{message}")]
    Syntax { message: String, span: Span },

    #[error("invalid number `{text}`")]
    InvalidNumber { text: String, span: Span },

    #[error("`{keyword}` is not supported: templates only substitute values")]
    UnsupportedAction { keyword: String, span: Span },

    #[error("cannot pipe into {found}: only a function call can receive a piped value")]
    PipeIntoNonFunction { found: String, span: Span },

    #[error("unexpected rule: {0:?}")]
    UnexpectedRule(Rule),
}

impl ParseError {
    /// Location of the error in the template source
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Syntax { span, .. }
            | Self::InvalidNumber { span, .. }
            | Self::UnsupportedAction { span, .. }
            | Self::PipeIntoNonFunction { span, .. } => Some(*span),
            Self::UnexpectedRule(_) => None,
        }
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        let span = match e.location {
            InputLocation::Pos(pos) => Span::new(pos, pos),
            InputLocation::Span((start, end)) => Span::new(start, end),
        };

        let message = match &e.variant {
            ErrorVariant::ParsingError { positives, .. } => {
                let mut expected: Vec<&str> = positives.iter().map(describe_rule).collect();
                expected.dedup();
                if expected.is_empty() {
                    "syntax error".to_string()
                } else {
                    format!("syntax error: expected {}", expected.join(" or "))
                }
            }
            ErrorVariant::CustomError { message } => message.clone(),
        };

        ParseError::Syntax { message, span }
    }
}

fn describe_rule(rule: &Rule) -> &'static str {
    match rule {
        Rule::close => "`}}`",
        Rule::open => "`{{`",
        Rule::EOI => "end of template",
        Rule::pipeline | Rule::command | Rule::call => "an expression",
        Rule::field | Rule::key => "a field name",
        Rule::identifier => "a function name",
        Rule::string | Rule::raw_string | Rule::string_inner | Rule::raw_inner => "a string",
        Rule::int | Rule::float | Rule::exponent => "a number",
        Rule::parenthesized => "`(`",
        Rule::comment_body => "`*/`",
        _ => "a valid token",
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Text or a `{{ … }}` tag before trim markers are applied
enum Piece {
    Text(String),
    Tag {
        trim_left: bool,
        trim_right: bool,
        /// `None` for comments
        action: Option<Action>,
    },
}

impl Piece {
    fn trims_left(&self) -> bool {
        matches!(self, Piece::Tag { trim_left: true, .. })
    }

    fn trims_right(&self) -> bool {
        matches!(self, Piece::Tag { trim_right: true, .. })
    }
}

/// Parse a template string into an AST
pub fn parse(source: &str) -> Result<Template> {
    let mut pairs = TemplateParser::parse(Rule::template, source)?;
    let Some(root) = pairs.next() else {
        return Ok(Template::default());
    };

    let mut pieces = Vec::new();
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::text => pieces.push(Piece::Text(pair.as_str().to_string())),
            Rule::comment => {
                let (trim_left, trim_right) = trim_markers(&pair);
                pieces.push(Piece::Tag {
                    trim_left,
                    trim_right,
                    action: None,
                });
            }
            Rule::action => {
                let (trim_left, trim_right) = trim_markers(&pair);
                let action = parse_action(pair)?;
                pieces.push(Piece::Tag {
                    trim_left,
                    trim_right,
                    action: Some(action),
                });
            }
            Rule::EOI => {}
            other => return Err(ParseError::UnexpectedRule(other)),
        }
    }

    Ok(Template {
        nodes: apply_trim_markers(&pieces),
    })
}

/// Whether a tag opens with `{{-` and closes with `-}}`
fn trim_markers(pair: &Pair<Rule>) -> (bool, bool) {
    let mut trim_left = false;
    let mut trim_right = false;
    for inner in pair.clone().into_inner() {
        match inner.as_rule() {
            Rule::open => trim_left = inner.as_str().ends_with('-'),
            Rule::close => trim_right = inner.as_str().ends_with("-}}"),
            _ => {}
        }
    }
    (trim_left, trim_right)
}

const TRIM_CHARS: &[char] = &[' ', '\t', '\r', '\n'];

fn apply_trim_markers(pieces: &[Piece]) -> Vec<Node> {
    let mut nodes = Vec::new();

    for (i, piece) in pieces.iter().enumerate() {
        match piece {
            Piece::Text(text) => {
                let mut text = text.as_str();
                if i > 0 && pieces[i - 1].trims_right() {
                    text = text.trim_start_matches(TRIM_CHARS);
                }
                if pieces.get(i + 1).is_some_and(Piece::trims_left) {
                    text = text.trim_end_matches(TRIM_CHARS);
                }
                if !text.is_empty() {
                    nodes.push(Node::Text(text.to_string()));
                }
            }
            Piece::Tag {
                action: Some(action),
                ..
            } => nodes.push(Node::Action(action.clone())),
            Piece::Tag { action: None, .. } => {}
        }
    }

    nodes
}

fn parse_action(pair: Pair<Rule>) -> Result<Action> {
    let span = Span::from(pair.as_span());
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::pipeline {
            return Ok(Action {
                pipeline: parse_pipeline(inner)?,
                span,
            });
        }
    }
    Err(ParseError::UnexpectedRule(Rule::action))
}

fn parse_pipeline(pair: Pair<Rule>) -> Result<Pipeline> {
    let span = Span::from(pair.as_span());
    let mut commands = Vec::new();

    for (stage, inner) in pair.into_inner().enumerate() {
        let stage_span = Span::from(inner.as_span());
        let command = parse_command(inner)?;

        if stage > 0
            && let Command::Operand(operand) = &command
        {
            return Err(ParseError::PipeIntoNonFunction {
                found: describe_operand(operand),
                span: stage_span,
            });
        }
        commands.push(command);
    }

    Ok(Pipeline { commands, span })
}

fn parse_command(pair: Pair<Rule>) -> Result<Command> {
    let Some(inner) = pair.into_inner().next() else {
        return Err(ParseError::UnexpectedRule(Rule::command));
    };

    match inner.as_rule() {
        Rule::call => Ok(Command::Call(parse_call(inner)?)),
        _ => Ok(Command::Operand(parse_operand(inner)?)),
    }
}

fn parse_call(pair: Pair<Rule>) -> Result<Call> {
    let span = Span::from(pair.as_span());
    let mut inner = pair.into_inner();

    let Some(name_pair) = inner.next() else {
        return Err(ParseError::UnexpectedRule(Rule::call));
    };
    let name = function_name(&name_pair)?;

    let args = inner.map(parse_operand).collect::<Result<Vec<_>>>()?;

    Ok(Call { name, args, span })
}

/// Identifier used as a function name, rejecting control-flow keywords
fn function_name(pair: &Pair<Rule>) -> Result<String> {
    let name = pair.as_str();
    if CONTROL_KEYWORDS.contains(&name) {
        return Err(ParseError::UnsupportedAction {
            keyword: name.to_string(),
            span: pair.as_span().into(),
        });
    }
    Ok(name.to_string())
}

fn parse_operand(pair: Pair<Rule>) -> Result<Operand> {
    let span = Span::from(pair.as_span());

    match pair.as_rule() {
        Rule::parenthesized => {
            for inner in pair.into_inner() {
                if inner.as_rule() == Rule::pipeline {
                    return Ok(Operand::Pipeline(parse_pipeline(inner)?));
                }
            }
            Err(ParseError::UnexpectedRule(Rule::parenthesized))
        }
        Rule::field => {
            let rooted = pair.as_str().starts_with('$');
            let segments = pair
                .into_inner()
                .filter(|p| p.as_rule() == Rule::key)
                .map(|p| p.as_str().to_string())
                .collect();
            Ok(Operand::Field(FieldPath {
                rooted,
                segments,
                span,
            }))
        }
        Rule::identifier => Ok(Operand::Call(Call {
            name: function_name(&pair)?,
            args: Vec::new(),
            span,
        })),
        Rule::string => {
            let inner = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(Operand::Literal(Literal::String(unescape(inner))))
        }
        Rule::raw_string => {
            let inner = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(Operand::Literal(Literal::String(inner.to_string())))
        }
        Rule::float => {
            let text = pair.as_str();
            let n: f64 = text.parse().map_err(|_| ParseError::InvalidNumber {
                text: text.to_string(),
                span,
            })?;
            Ok(Operand::Literal(Literal::Float(n)))
        }
        Rule::int => {
            let text = pair.as_str();
            let n: i64 = text.parse().map_err(|_| ParseError::InvalidNumber {
                text: text.to_string(),
                span,
            })?;
            Ok(Operand::Literal(Literal::Int(n)))
        }
        Rule::boolean => Ok(Operand::Literal(Literal::Bool(pair.as_str() == "true"))),
        Rule::nil => Ok(Operand::Literal(Literal::Nil)),
        other => Err(ParseError::UnexpectedRule(other)),
    }
}

fn describe_operand(operand: &Operand) -> String {
    match operand {
        Operand::Field(path) => format!("field `{}`", path),
        Operand::Literal(_) => "a literal".to_string(),
        Operand::Call(call) => format!("`{}`", call.name),
        Operand::Pipeline(_) => "a parenthesized pipeline".to_string(),
    }
}

/// Process escape sequences of a double-quoted string
fn unescape(inner: &str) -> String {
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}
