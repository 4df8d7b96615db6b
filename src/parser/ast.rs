//! Abstract Syntax Tree types for the component markup

use crate::value::Value;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// A node with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// Valid identifier (alphanumeric + underscore, starts with letter/_)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

impl Identifier {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether instances of a component can join the visual tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// `item`: attachable to a visual container
    Item,
    /// `object`: a plain non-visual object
    Object,
}

/// Root AST node - one component per source file
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDecl {
    pub kind: ComponentKind,
    pub name: Spanned<Identifier>,
    pub properties: Vec<Spanned<PropertyDecl>>,
}

impl ComponentDecl {
    pub fn property(&self, name: &str) -> Option<&PropertyDecl> {
        self.properties
            .iter()
            .map(|p| &p.node)
            .find(|p| p.name.node.as_str() == name)
    }
}

/// `[required] property name [: init]`
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: Spanned<Identifier>,
    pub required: bool,
    pub init: Option<Spanned<Expr>>,
}

/// Property initializer
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Bare identifier, looked up in the construction context
    ContextRef(Identifier),
    List(Vec<Spanned<Expr>>),
}
