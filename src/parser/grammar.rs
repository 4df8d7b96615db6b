//! Parser implementation using chumsky

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::parser::ast::*;
use crate::parser::lexer::Token;
use crate::value::Value;

/// Parse markup source into a component declaration
pub fn parse(input: &str) -> Result<ComponentDecl, Vec<crate::ParseError>> {
    let len = input.len();

    // Create a logos lexer and convert to token stream
    let token_iter = crate::parser::lexer::lex(input).map(|(tok, span)| (tok, span.into()));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    component_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn expr_parser<'a, I>() -> impl Parser<'a, I, Spanned<Expr>, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    recursive(|expr| {
        // Optional leading minus folded into the literal
        let number = just(Token::Minus)
            .or_not()
            .then(select! {
                Token::Int(n) => Value::Int(n),
                Token::Float(n) => Value::Float(n),
            })
            .map(|(minus, value)| match (minus, value) {
                (Some(_), Value::Int(n)) => Value::Int(-n),
                (Some(_), Value::Float(n)) => Value::Float(-n),
                (_, value) => value,
            });

        let literal = select! {
            Token::String(s) => Value::String(s),
            Token::HexColor(c) => Value::String(c),
            Token::True => Value::Bool(true),
            Token::False => Value::Bool(false),
            Token::Null => Value::Null,
        }
        .or(number)
        .map(Expr::Literal);

        let context_ref = select! {
            Token::Ident(s) => Expr::ContextRef(Identifier::new(s)),
        };

        let list = expr
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketOpen), just(Token::BracketClose))
            .map(Expr::List);

        choice((literal, context_ref, list))
            .map_with(|node, e| Spanned::new(node, span_range(&e.span())))
    })
}

fn component_parser<'a, I>(
) -> impl Parser<'a, I, ComponentDecl, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let identifier = select! {
        Token::Ident(s) => Identifier::new(s),
    }
    .map_with(|id, e| Spanned::new(id, span_range(&e.span())));

    // [required] property name [: init]
    let property = just(Token::Required)
        .or_not()
        .then_ignore(just(Token::Property))
        .then(identifier.clone())
        .then(just(Token::Colon).ignore_then(expr_parser()).or_not())
        .map_with(|((required, name), init), e| {
            Spanned::new(
                PropertyDecl {
                    name,
                    required: required.is_some(),
                    init,
                },
                span_range(&e.span()),
            )
        });

    let kind = select! {
        Token::Item => ComponentKind::Item,
        Token::Object => ComponentKind::Object,
    };

    kind.then(identifier)
        .then(
            property
                .repeated()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::BraceOpen), just(Token::BraceClose)),
        )
        .then_ignore(end())
        .map(|((kind, name), properties)| ComponentDecl {
            kind,
            name,
            properties,
        })
}
