//! AST (Abstract Syntax Tree) for templates
//!
//! Trim markers and comments are resolved by the parser, so a template is
//! just literal text interleaved with pipelines.

use std::fmt;

/// Byte range in the template source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<pest::Span<'_>> for Span {
    fn from(span: pest::Span<'_>) -> Self {
        Self::new(span.start(), span.end())
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        miette::SourceSpan::new(span.start.into(), span.len())
    }
}

/// A parsed template
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pub nodes: Vec<Node>,
}

/// An element of a template
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text, already trimmed by neighbouring markers
    Text(String),
    /// `{{ pipeline }}`
    Action(Action),
}

/// A substitution action
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub pipeline: Pipeline,
    /// Span of the whole `{{ … }}`
    pub span: Span,
}

/// Commands separated by `|`
///
/// The result of each command is passed as the last argument of the next.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
    pub span: Span,
}

/// A pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `name arg…`
    Call(Call),
    /// A single operand, only valid as the first stage
    Operand(Operand),
}

/// A function call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub args: Vec<Operand>,
    pub span: Span,
}

/// Function argument or standalone value
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(FieldPath),
    Literal(Literal),
    /// Bare function name used as an argument: a call without arguments
    Call(Call),
    /// `( pipeline )`
    Pipeline(Pipeline),
}

/// Field access: `.Values.image.tag`, `$.Values.x`, `.` or `$`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPath {
    /// Starts at `$`
    pub rooted: bool,
    pub segments: Vec<String>,
    pub span: Span,
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rooted {
            write!(f, "$")?;
        } else if self.segments.is_empty() {
            return write!(f, ".");
        }
        for segment in &self.segments {
            write!(f, ".{}", segment)?;
        }
        Ok(())
    }
}

/// Literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(rooted: bool, segments: &[&str]) -> FieldPath {
        FieldPath {
            rooted,
            segments: segments.iter().map(|s| s.to_string()).collect(),
            span: Span::default(),
        }
    }

    #[test]
    fn test_field_path_display() {
        assert_eq!(path(false, &["Values", "image", "tag"]).to_string(), ".Values.image.tag");
        assert_eq!(path(true, &["Values"]).to_string(), "$.Values");
        assert_eq!(path(false, &[]).to_string(), ".");
        assert_eq!(path(true, &[]).to_string(), "$");
    }

    #[test]
    fn test_span_to_source_span() {
        let span: miette::SourceSpan = Span::new(4, 10).into();
        assert_eq!(span.offset(), 4);
        assert_eq!(span.len(), 6);
    }
}
