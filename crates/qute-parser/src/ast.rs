//! Node tree for Qute templates.
//!
//! Nodes live in an arena owned by the [`Document`]; children are listed by
//! [`NodeId`] and the parent link is an index back into the same arena, so
//! the tree has no reference cycles. Nodes never copy source text: every
//! name, body and value is a [`Span`] sliced out of the document text on
//! demand.

use qute_lexer::{LineIndex, Position, PositionError, Span};
use serde::Serialize;

use crate::diagnostic::{Diagnostic, ErrorCode, Severity};

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Index of a node in its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The document node.
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// A node of the template tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Node variants. Data-carrying variants hold the spans that make up the
/// construct.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Document,

    /// Template text outside of any construct.
    Text,

    /// `{! ... !}`
    Comment(Comment),

    /// `{| ... |}` or the legacy `{[ ... ]}`
    CData(CData),

    /// `{#name ...} ... {/name}`
    Section(Section),

    /// `{@Type alias}`
    ParameterDeclaration(ParameterDeclaration),

    /// `{item.name}` or the value of a section parameter.
    Expression(Expression),

    /// One parameter of a section start tag.
    Parameter(Parameter),

    /// One part of an expression.
    Part(PartKind),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Document => "Document",
            NodeKind::Text => "Text",
            NodeKind::Comment(_) => "Comment",
            NodeKind::CData(_) => "CDATA",
            NodeKind::Section(_) => "Section",
            NodeKind::ParameterDeclaration(_) => "ParameterDeclaration",
            NodeKind::Expression(_) => "Expression",
            NodeKind::Parameter(_) => "Parameter",
            NodeKind::Part(PartKind::Object) => "ObjectPart",
            NodeKind::Part(PartKind::Property) => "PropertyPart",
            NodeKind::Part(PartKind::Method) => "MethodPart",
            NodeKind::Part(PartKind::Namespace) => "NamespacePart",
            NodeKind::Part(PartKind::String) => "StringPart",
            NodeKind::Part(PartKind::InfixMethod) => "InfixMethodPart",
            NodeKind::Part(PartKind::InfixParameter) => "InfixParameterPart",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub content: Option<Span>,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CData {
    pub content: Option<Span>,
    /// `{[ ... ]}` syntax.
    pub legacy: bool,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Tag name span; empty for `{#}` and `{/}`.
    pub name: Span,
    pub kind: SectionKind,
    /// `None` for an end tag that matched no start tag.
    pub start_tag: Option<Span>,
    pub end_tag: Option<Span>,
    /// `{#else}` and friends: closed by the next block or by the owner.
    pub block: bool,
    pub self_closed: bool,
    /// Still open at the end of the document, or closed by an outer end tag.
    pub unterminated: bool,
}

impl Section {
    /// Sections that are waiting for an end tag.
    pub fn is_open(&self) -> bool {
        self.start_tag.is_some() && self.end_tag.is_none() && !self.self_closed && !self.block
    }
}

/// Well-known section tags. Anything else is a user-defined tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SectionKind {
    If,
    Else,
    Each,
    For,
    Let,
    Set,
    With,
    Include,
    Insert,
    Fragment,
    Switch,
    When,
    Is,
    Case,
    Custom,
}

impl SectionKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "if" => SectionKind::If,
            "else" => SectionKind::Else,
            "each" => SectionKind::Each,
            "for" => SectionKind::For,
            "let" => SectionKind::Let,
            "set" => SectionKind::Set,
            "with" => SectionKind::With,
            "include" => SectionKind::Include,
            "insert" => SectionKind::Insert,
            "fragment" => SectionKind::Fragment,
            "switch" => SectionKind::Switch,
            "when" => SectionKind::When,
            "is" => SectionKind::Is,
            "case" => SectionKind::Case,
            _ => SectionKind::Custom,
        }
    }

    /// Whether parameter values are expressions. `include`, `insert` and
    /// `fragment` take template and fragment ids instead.
    pub fn has_expression_parameters(self) -> bool {
        !matches!(
            self,
            SectionKind::Include | SectionKind::Insert | SectionKind::Fragment
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDeclaration {
    pub class_name: Option<Span>,
    pub alias: Option<Span>,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    /// The text between the braces (or the parameter value).
    pub content: Span,
    /// Scanned with infix notation (`a or b`).
    pub infix: bool,
    /// `true` for `{...}`, `false` for a section parameter value.
    pub braced: bool,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// `name` in `name=value`, or the alias in `{#for item in items}`.
    pub name: Option<Span>,
    pub value: Option<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PartKind {
    Object,
    Property,
    Method,
    Namespace,
    String,
    InfixMethod,
    InfixParameter,
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A parsed template.
///
/// Immutable once returned by the parser. Offsets are byte offsets into
/// [`Document::text`]; `position_at` / `offset_at` convert to and from the
/// line/character positions editors use, counting UTF-16 code units.
#[derive(Debug, Clone)]
pub struct Document {
    uri: String,
    text: String,
    nodes: Vec<Node>,
    diagnostics: Vec<Diagnostic>,
    line_index: LineIndex,
}

impl Document {
    pub(crate) fn new(uri: String, text: String, nodes: Vec<Node>) -> Self {
        let line_index = LineIndex::new(&text);
        Self {
            uri,
            text,
            nodes,
            diagnostics: Vec::new(),
            line_index,
        }
    }

    /// Record a diagnostic against the smallest node covering `span`.
    pub(crate) fn push_diagnostic(
        &mut self,
        code: ErrorCode,
        message: String,
        span: Span,
        severity: Severity,
    ) {
        let node = self.covering_node(span);
        self.diagnostics.push(Diagnostic {
            code,
            message,
            span,
            severity,
            node,
        });
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn root(&self) -> &Node {
        &self.nodes[NodeId::ROOT.0]
    }

    /// Top-level nodes.
    pub fn children(&self) -> &[NodeId] {
        &self.root().children
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Source text in `[start, end)`, clamped to the document.
    pub fn get_text(&self, start: usize, end: usize) -> &str {
        let end = end.min(self.text.len());
        let start = start.min(end);
        self.text.get(start..end).unwrap_or("")
    }

    pub fn span_text(&self, span: Span) -> &str {
        self.get_text(span.start, span.end)
    }

    pub fn node_text(&self, id: NodeId) -> &str {
        self.span_text(self.node(id).span)
    }

    pub fn position_at(&self, offset: usize) -> Result<Position, PositionError> {
        self.line_index.position_at(&self.text, offset)
    }

    pub fn offset_at(&self, position: Position) -> Result<usize, PositionError> {
        self.line_index.offset_at(&self.text, position)
    }

    /// Deepest node containing `offset`.
    ///
    /// A child claims `[start, end)`; an offset in a gap between children
    /// (whitespace in a tag, the dot of an expression) resolves to the
    /// enclosing node. The very end of the document also belongs to the
    /// nodes that end there, so a cursor after an unclosed `{item.` still
    /// lands in the expression. Returns `None` only for offsets past the
    /// end of the document.
    pub fn find_node_at(&self, offset: usize) -> Option<NodeId> {
        if offset > self.text.len() {
            return None;
        }
        let mut current = NodeId::ROOT;
        loop {
            let children = &self.node(current).children;
            let idx = children.partition_point(|c| self.node(*c).span.start <= offset);
            if idx == 0 {
                return Some(current);
            }
            let child = children[idx - 1];
            if !self.claims(child, offset) {
                return Some(current);
            }
            current = child;
        }
    }

    fn claims(&self, id: NodeId, offset: usize) -> bool {
        let span = self.node(id).span;
        if offset < span.end {
            return true;
        }
        offset == span.end && span.end == self.text.len() && !span.is_empty()
    }

    /// Smallest node whose span covers all of `span`.
    pub fn covering_node(&self, span: Span) -> NodeId {
        let mut id = self.find_node_at(span.start).unwrap_or(NodeId::ROOT);
        loop {
            let node_span = self.node(id).span;
            if node_span.start <= span.start && span.end <= node_span.end {
                return id;
            }
            match self.parent(id) {
                Some(parent) => id = parent,
                None => return id,
            }
        }
    }

    /// Preorder traversal, starting with the document node.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            document: self,
            stack: vec![NodeId::ROOT],
        }
    }

    pub fn sections(&self) -> impl Iterator<Item = (NodeId, &Section)> + '_ {
        self.walk().filter_map(|id| match &self.node(id).kind {
            NodeKind::Section(section) => Some((id, section)),
            _ => None,
        })
    }

    pub fn expressions(&self) -> impl Iterator<Item = (NodeId, &Expression)> + '_ {
        self.walk().filter_map(|id| match &self.node(id).kind {
            NodeKind::Expression(expr) => Some((id, expr)),
            _ => None,
        })
    }

    pub fn parameter_declarations(
        &self,
    ) -> impl Iterator<Item = (NodeId, &ParameterDeclaration)> + '_ {
        self.walk().filter_map(|id| match &self.node(id).kind {
            NodeKind::ParameterDeclaration(decl) => Some((id, decl)),
            _ => None,
        })
    }

    /// Tag name of a section node, `None` for other nodes.
    pub fn section_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Section(section) => Some(self.span_text(section.name)),
            _ => None,
        }
    }
}

/// Preorder iterator over node ids. See [`Document::walk`].
pub struct Walk<'a> {
    document: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Walk<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.document.node(id).children.iter().rev().copied());
        Some(id)
    }
}
