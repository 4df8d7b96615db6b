//! Error types for the factory and the markup parser

use std::time::Duration;

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::parser::lexer::Token;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Errors returned by component creation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FactoryError {
    #[error("no template engine bound to the factory")]
    EngineNotBound,

    #[error("failed to compile '{uri}': {detail}")]
    Compile { uri: String, detail: String },

    #[error("timed out after {waited:?} waiting for '{uri}' to compile")]
    Timeout { uri: String, waited: Duration },

    #[error("template '{uri}' produced no object")]
    ConstructionFailed { uri: String },

    #[error("failed to complete '{uri}': {detail}")]
    CompletionFailed { uri: String, detail: String },

    #[error("'{uri}' produced a {type_name}, which cannot be attached to a visual container")]
    IncompatibleType { uri: String, type_name: String },

    #[error("no container to attach to")]
    NoContainer,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },
}

impl ParseError {
    pub fn span(&self) -> &Span {
        match self {
            ParseError::Syntax { span, .. } => span,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let mut buf = Vec::new();
        match self {
            ParseError::Syntax {
                span,
                message,
                expected,
            } => {
                let expected_str = if expected.is_empty() {
                    String::new()
                } else {
                    format!("\nExpected: {}", expected.join(", "))
                };

                let written = Report::build(ReportKind::Error, filename, span.start)
                    .with_message(message)
                    .with_label(
                        Label::new((filename, span.clone()))
                            .with_message(format!("{}{}", message, expected_str))
                            .with_color(Color::Red),
                    )
                    .finish()
                    .write((filename, Source::from(source)), &mut buf);
                if written.is_err() {
                    return self.to_string();
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl<'a> From<chumsky::error::Rich<'a, Token>> for ParseError {
    fn from(err: chumsky::error::Rich<'a, Token>) -> Self {
        use chumsky::error::{RichPattern, RichReason};

        let message = match err.reason() {
            RichReason::ExpectedFound { found, .. } => {
                let found_str = match found {
                    Some(tok) => format_token(tok),
                    None => "end of input".to_string(),
                };
                format!("Unexpected {}", found_str)
            }
            RichReason::Custom(msg) => msg.to_string(),
        };

        // Format expected tokens nicely
        let expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                RichPattern::Token(tok) => Some(format_token(tok)),
                RichPattern::Label(label) => Some(label.to_string()),
                RichPattern::EndOfInput => Some("end of input".to_string()),
                RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
                RichPattern::Any => Some("any token".to_string()),
                RichPattern::SomethingElse => None,
            })
            .collect();

        ParseError::Syntax {
            span: err.span().into_range(),
            message,
            expected,
        }
    }
}

/// Format a token for human-readable error messages
fn format_token(tok: &Token) -> String {
    match tok {
        Token::Ident(s) => format!("identifier '{}'", s),
        Token::String(s) => format!("string \"{}\"", s),
        Token::Int(n) => format!("number {}", n),
        Token::Float(n) => format!("number {}", n),
        Token::HexColor(c) => format!("color {}", c),
        Token::BraceOpen => "'{'".to_string(),
        Token::BraceClose => "'}'".to_string(),
        Token::BracketOpen => "'['".to_string(),
        Token::BracketClose => "']'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Colon => "':'".to_string(),
        Token::Minus => "'-'".to_string(),
        Token::Item => "keyword 'item'".to_string(),
        Token::Object => "keyword 'object'".to_string(),
        Token::Property => "keyword 'property'".to_string(),
        Token::Required => "keyword 'required'".to_string(),
        Token::True => "keyword 'true'".to_string(),
        Token::False => "keyword 'false'".to_string(),
        Token::Null => "keyword 'null'".to_string(),
        _ => format!("{:?}", tok),
    }
}
