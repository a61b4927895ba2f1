//! Node tree builder for Qute templates.
//!
//! Drives the template [`Scanner`] and folds its flat token stream into a
//! [`Document`]. Sections nest through an explicit stack of open section
//! ids; comments, CDATA, expressions and tags are assembled from their
//! opening, body and closing tokens. A construct whose closing token never
//! arrives is closed at the offset where the next construct starts, so the
//! tree always covers the whole template and parsing never fails.
//!
//! Expression bodies and section parameter values are handed to the
//! [`ExprLexer`] and their parts attached under the expression node.

use qute_lexer::{Scanner, Span, Token, TokenKind};
use tracing::{debug, trace};

use crate::ast::{
    CData, Comment, Document, Expression, Node, NodeId, NodeKind, Parameter,
    ParameterDeclaration, PartKind, Section, SectionKind,
};
use crate::config::ParserConfig;
use crate::diagnostic::{ErrorCode, Severity};
use crate::expr_lexer::{self, ExprLexer};

/// Construct whose opening token has been read but not its closing one.
#[derive(Debug, Default)]
enum Open {
    #[default]
    None,
    Comment {
        start: usize,
        content: Option<Span>,
    },
    CData {
        start: usize,
        legacy: bool,
        content: Option<Span>,
    },
    Expression {
        start: usize,
        content: Option<Span>,
    },
    Declaration {
        start: usize,
        words: Vec<Span>,
    },
    StartTag {
        start: usize,
        name: Option<Span>,
        fragments: Vec<Span>,
        malformed: bool,
    },
    EndTag {
        start: usize,
        name: Option<Span>,
    },
}

/// Diagnostic waiting for the finished tree to resolve its node.
struct Report {
    code: ErrorCode,
    message: String,
    span: Span,
    severity: Severity,
}

/// Qute template parser.
///
/// Single use: build one with [`Parser::new`] or go through
/// [`Parser::parse`], which consumes the parser and returns the document.
pub struct Parser<'a> {
    source: &'a str,
    config: &'a ParserConfig,
    nodes: Vec<Node>,
    /// Open sections, innermost last. Blocks sit above their owner.
    stack: Vec<NodeId>,
    open: Open,
    reports: Vec<Report>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, config: &'a ParserConfig) -> Self {
        let root = Node {
            kind: NodeKind::Document,
            span: Span::new(0, source.len()),
            parent: None,
            children: Vec::new(),
        };
        Self {
            source,
            config,
            nodes: vec![root],
            stack: Vec::new(),
            open: Open::None,
            reports: Vec::new(),
        }
    }

    /// Parse a template with the default configuration.
    pub fn parse(source: &str, uri: &str) -> Document {
        Self::parse_with_config(source, uri, &ParserConfig::default())
    }

    pub fn parse_with_config(source: &str, uri: &str, config: &ParserConfig) -> Document {
        debug!(uri, len = source.len(), "parsing template");
        let document = Parser::new(source, config).parse_document(uri);
        debug!(
            uri,
            nodes = document.node_count(),
            diagnostics = document.diagnostics().len(),
            "parsed template"
        );
        document
    }

    /// Consume the template and build the document.
    pub fn parse_document(mut self, uri: &str) -> Document {
        let mut scanner = Scanner::new(self.source);
        loop {
            let token = scanner.scan();
            if let Some(error) = &token.error {
                self.report(ErrorCode::SyntaxError, error.clone(), token.span);
            }
            if token.kind == TokenKind::Eos {
                self.finish();
                break;
            }
            self.process(token);
        }

        let Parser {
            source,
            nodes,
            mut reports,
            ..
        } = self;
        reports.sort_by_key(|r| r.span.start);
        let mut document = Document::new(uri.to_string(), source.to_string(), nodes);
        for r in reports {
            document.push_diagnostic(r.code, r.message, r.span, r.severity);
        }
        document
    }

    fn process(&mut self, token: Token) {
        let span = token.span;
        match token.kind {
            TokenKind::Content => {
                self.flush(span.start);
                self.add_leaf(NodeKind::Text, span);
            }
            TokenKind::Whitespace | TokenKind::Eos => {}

            // Comments and CDATA
            TokenKind::StartComment => {
                self.flush(span.start);
                self.open = Open::Comment {
                    start: span.start,
                    content: None,
                };
            }
            TokenKind::CDATATagOpen | TokenKind::CDATAOldTagOpen => {
                self.flush(span.start);
                self.open = Open::CData {
                    start: span.start,
                    legacy: token.kind == TokenKind::CDATAOldTagOpen,
                    content: None,
                };
            }
            TokenKind::Comment | TokenKind::CDATAContent | TokenKind::CDATAOldContent => {
                if let Open::Comment { content, .. } | Open::CData { content, .. } = &mut self.open
                {
                    *content = Some(span);
                }
            }
            TokenKind::EndComment => {
                if let Open::Comment { start, content } = self.take_open() {
                    let comment = Comment {
                        content,
                        closed: true,
                    };
                    self.add_leaf(NodeKind::Comment(comment), Span::new(start, span.end));
                }
            }
            TokenKind::CDATATagClose | TokenKind::CDATAOldTagClose => {
                if let Open::CData {
                    start,
                    legacy,
                    content,
                } = self.take_open()
                {
                    let cdata = CData {
                        content,
                        legacy,
                        closed: true,
                    };
                    self.add_leaf(NodeKind::CData(cdata), Span::new(start, span.end));
                }
            }

            // Expressions
            TokenKind::StartExpression => {
                self.flush(span.start);
                self.open = Open::Expression {
                    start: span.start,
                    content: None,
                };
            }
            TokenKind::ExpressionContent => {
                if let Open::Expression { content, .. } = &mut self.open {
                    *content = Some(span);
                }
            }
            TokenKind::EndExpression => {
                if let Open::Expression { start, content } = self.take_open() {
                    self.add_braced_expression(Span::new(start, span.end), content, true);
                }
            }

            // Parameter declarations
            TokenKind::StartParameterDeclaration => {
                self.flush(span.start);
                self.open = Open::Declaration {
                    start: span.start,
                    words: Vec::new(),
                };
            }
            TokenKind::ParameterDeclaration => {
                if let Open::Declaration { words, .. } = &mut self.open {
                    words.push(span);
                }
            }
            TokenKind::EndParameterDeclaration => {
                if let Open::Declaration { start, words } = self.take_open() {
                    self.add_declaration(Span::new(start, span.end), &words, true);
                }
            }

            // Section tags
            TokenKind::StartTagOpen => {
                self.flush(span.start);
                self.open = Open::StartTag {
                    start: span.start,
                    name: None,
                    fragments: Vec::new(),
                    malformed: false,
                };
            }
            TokenKind::EndTagOpen => {
                self.flush(span.start);
                self.open = Open::EndTag {
                    start: span.start,
                    name: None,
                };
            }
            TokenKind::StartTag | TokenKind::EndTag => {
                if let Open::StartTag { name, .. } | Open::EndTag { name, .. } = &mut self.open {
                    *name = Some(span);
                }
            }
            TokenKind::ParameterTag => {
                match &mut self.open {
                    Open::StartTag { fragments, .. } => fragments.push(span),
                    // `{/ if}`: the misplaced name still names the section
                    Open::EndTag { name: name @ None, .. } => *name = Some(span),
                    _ => {}
                }
            }
            TokenKind::Unknown => {
                if let Open::StartTag { malformed, .. } = &mut self.open {
                    *malformed = true;
                }
            }
            TokenKind::StartTagClose | TokenKind::StartTagSelfClose => {
                if let Open::StartTag {
                    start,
                    name,
                    fragments,
                    malformed,
                } = self.take_open()
                {
                    let self_closed = token.kind == TokenKind::StartTagSelfClose;
                    let tag = Span::new(start, span.end);
                    self.start_section(tag, name, &fragments, self_closed, malformed);
                }
            }
            TokenKind::EndTagClose => {
                if let Open::EndTag { start, name } = self.take_open() {
                    self.end_section(Span::new(start, span.end), name);
                }
            }
        }
    }

    fn take_open(&mut self) -> Open {
        std::mem::take(&mut self.open)
    }

    /// Close whatever construct is still open, cut off at `at`.
    fn flush(&mut self, at: usize) {
        match self.take_open() {
            Open::None => {}
            Open::Comment { start, content } => {
                self.report(
                    ErrorCode::UnterminatedComment,
                    "Unterminated comment".to_string(),
                    Span::new(start, start + 2),
                );
                let comment = Comment {
                    content,
                    closed: false,
                };
                self.add_leaf(NodeKind::Comment(comment), Span::new(start, at));
            }
            Open::CData {
                start,
                legacy,
                content,
            } => {
                self.report(
                    ErrorCode::UnterminatedCdata,
                    "Unterminated CDATA section".to_string(),
                    Span::new(start, start + 2),
                );
                let cdata = CData {
                    content,
                    legacy,
                    closed: false,
                };
                self.add_leaf(NodeKind::CData(cdata), Span::new(start, at));
            }
            Open::Expression { start, content } => {
                self.add_braced_expression(Span::new(start, at), content, false);
            }
            Open::Declaration { start, words } => {
                self.add_declaration(Span::new(start, at), &words, false);
            }
            Open::StartTag {
                start,
                name,
                fragments,
                malformed,
            } => {
                self.start_section(Span::new(start, at), name, &fragments, false, malformed);
            }
            Open::EndTag { start, name } => {
                self.end_section(Span::new(start, at), name);
            }
        }
    }

    /// End of input: close the open construct and every open section.
    fn finish(&mut self) {
        let end = self.source.len();
        self.flush(end);
        while let Some(id) = self.stack.pop() {
            self.close_unterminated(id, end);
        }
    }

    // =========================================================================
    // Sections
    // =========================================================================

    fn start_section(
        &mut self,
        tag: Span,
        name: Option<Span>,
        fragments: &[Span],
        self_closed: bool,
        malformed: bool,
    ) {
        let Some(name) = name else {
            if !malformed {
                self.report(
                    ErrorCode::NoSectionName,
                    "Section start tag has no name".to_string(),
                    tag,
                );
            }
            let section = Section {
                name: Span::new(tag.start + 2, tag.start + 2),
                kind: SectionKind::Custom,
                start_tag: Some(tag),
                end_tag: None,
                block: false,
                self_closed: true,
                unterminated: false,
            };
            self.add_leaf(NodeKind::Section(section), tag);
            return;
        };

        let source = self.source;
        let name_text = name.text(source);
        let mut parent = self.current_parent();
        let mut block = false;
        if let Some(&top) = self.stack.last() {
            let top_is_block = self.section(top).is_some_and(|s| s.block);
            let owner = if top_is_block {
                self.nodes[top.0].parent.unwrap_or(NodeId::ROOT)
            } else {
                top
            };
            let owner_name = self.section(owner).map(|s| s.name.text(source));
            if owner_name.is_some_and(|owner_name| self.config.is_block_of(owner_name, name_text)) {
                if top_is_block {
                    self.stack.pop();
                    self.set_end(top, tag.start);
                }
                parent = owner;
                block = true;
            }
        }

        let kind = SectionKind::from_name(name_text);
        let section = Section {
            name,
            kind,
            start_tag: Some(tag),
            end_tag: None,
            block,
            self_closed,
            unterminated: false,
        };
        let id = self.add_node(parent, NodeKind::Section(section), tag);
        trace!(name = name_text, block, self_closed, "open section");
        self.add_parameters(id, kind, fragments);
        if !self_closed {
            self.stack.push(id);
        }
    }

    fn end_section(&mut self, tag: Span, name: Option<Span>) {
        let source = self.source;
        let Some(name) = name else {
            // `{/}` closes the innermost section.
            if self.stack.is_empty() {
                self.orphan_end_tag(tag, Span::new(tag.start + 2, tag.start + 2));
            } else {
                self.close_top(tag);
            }
            return;
        };
        let name_text = name.text(source);

        let matched = self.stack.iter().rposition(|&id| {
            self.section(id)
                .is_some_and(|s| !s.block && s.name.text(source) == name_text)
        });
        if let Some(index) = matched {
            while self.stack.len() > index + 1 {
                if let Some(id) = self.stack.pop() {
                    self.close_unterminated(id, tag.start);
                }
            }
            if let Some(id) = self.stack.pop() {
                self.close_with(id, tag);
            }
            return;
        }

        let Some(&top) = self.stack.last() else {
            self.orphan_end_tag(tag, name);
            return;
        };
        let Some(top_section) = self.section(top) else {
            return;
        };
        let top_name = top_section.name.text(source);
        if top_section.block {
            self.report(
                ErrorCode::SectionBlockEndDoesNotMatchStart,
                format!("Section block end tag {{/{name_text}}} does not match the start tag {{#{top_name}}}"),
                tag,
            );
        } else {
            self.report(
                ErrorCode::SectionEndDoesNotMatchStart,
                format!("Section end tag {{/{name_text}}} does not match the start tag {{#{top_name}}}"),
                tag,
            );
        }
        self.close_top(tag);
    }

    /// Close the innermost section with `tag`. A block is closed together
    /// with its owner.
    fn close_top(&mut self, tag: Span) {
        let Some(top) = self.stack.pop() else {
            return;
        };
        if self.section(top).is_some_and(|s| s.block) {
            self.set_end(top, tag.start);
            if let Some(owner) = self.stack.pop() {
                self.close_with(owner, tag);
            }
        } else {
            self.close_with(top, tag);
        }
    }

    fn close_with(&mut self, id: NodeId, tag: Span) {
        trace!(name = self.section(id).map(|s| s.name.text(self.source)), "close section");
        if let NodeKind::Section(section) = &mut self.nodes[id.0].kind {
            section.end_tag = Some(tag);
        }
        self.set_end(id, tag.end);
    }

    /// Close a section that never saw its end tag. Blocks end silently when
    /// their owner does.
    fn close_unterminated(&mut self, id: NodeId, end: usize) {
        self.set_end(id, end);
        let Some(section) = self.section(id) else {
            return;
        };
        if section.block {
            return;
        }
        let name = section.name.text(self.source).to_string();
        let start_tag = section.start_tag.unwrap_or(section.name);
        if let NodeKind::Section(section) = &mut self.nodes[id.0].kind {
            section.unterminated = true;
        }
        self.report(
            ErrorCode::UnterminatedSection,
            format!("Unterminated section {{#{name}}}"),
            start_tag,
        );
    }

    fn orphan_end_tag(&mut self, tag: Span, name: Span) {
        let name_text = name.text(self.source);
        self.report(
            ErrorCode::SectionEndDoesNotMatchStart,
            format!("Section end tag {{/{name_text}}} has no matching start tag"),
            tag,
        );
        let section = Section {
            name,
            kind: SectionKind::from_name(name_text),
            start_tag: None,
            end_tag: Some(tag),
            block: false,
            self_closed: false,
            unterminated: false,
        };
        self.add_leaf(NodeKind::Section(section), tag);
    }

    fn section(&self, id: NodeId) -> Option<&Section> {
        match &self.nodes[id.0].kind {
            NodeKind::Section(section) => Some(section),
            _ => None,
        }
    }

    fn set_end(&mut self, id: NodeId, end: usize) {
        let span = &mut self.nodes[id.0].span;
        span.end = end.max(span.start);
    }

    // =========================================================================
    // Section parameters
    // =========================================================================

    fn add_parameters(&mut self, section: NodeId, kind: SectionKind, fragments: &[Span]) {
        let source = self.source;
        let Some((first, rest)) = fragments.split_first() else {
            return;
        };

        if !kind.has_expression_parameters() {
            for &fragment in fragments {
                self.add_node(section, plain_parameter(None, Some(fragment)), fragment);
            }
            return;
        }

        match kind {
            SectionKind::If => self.add_condition(section, fragments),
            SectionKind::Else if first.text(source) == "if" => self.add_condition(section, rest),
            SectionKind::For if fragments.len() >= 3 && fragments[1].text(source) == "in" => {
                // {#for item in items}
                self.add_node(section, plain_parameter(Some(*first), None), *first);
                let iterable = Span::new(fragments[2].start, fragments[fragments.len() - 1].end);
                self.add_value_parameter(section, iterable, None, iterable);
            }
            _ => {
                for &fragment in fragments {
                    match split_assignment(fragment.text(source)) {
                        Some(eq) => {
                            let name = Span::new(fragment.start, fragment.start + eq);
                            let value = Span::new(fragment.start + eq + 1, fragment.end);
                            self.add_value_parameter(section, fragment, Some(name), value);
                        }
                        None => self.add_value_parameter(section, fragment, None, fragment),
                    }
                }
            }
        }
    }

    /// `{#if a && b}`: every fragment forms one infix condition.
    fn add_condition(&mut self, section: NodeId, fragments: &[Span]) {
        let (Some(first), Some(last)) = (fragments.first(), fragments.last()) else {
            return;
        };
        let span = Span::new(first.start, last.end);
        let parameter = self.add_node(section, plain_parameter(None, Some(span)), span);
        let infix = self.config.infix_expressions;
        self.add_expression(parameter, span, span, infix, false, true);
    }

    fn add_value_parameter(&mut self, section: NodeId, span: Span, name: Option<Span>, value: Span) {
        let value = (!value.is_empty()).then_some(value);
        let parameter = self.add_node(section, plain_parameter(name, value), span);
        if let Some(value) = value {
            self.add_expression(parameter, value, value, false, false, true);
        }
    }

    // =========================================================================
    // Leaves
    // =========================================================================

    fn add_declaration(&mut self, span: Span, words: &[Span], closed: bool) {
        let class_name = words.first().copied();
        let alias = words.get(1).copied();
        match (class_name, alias) {
            (None, _) => self.report(
                ErrorCode::SyntaxError,
                "Parameter declaration has no type".to_string(),
                span,
            ),
            (Some(class_name), None) => self.report_with(
                ErrorCode::MissingParameterAlias,
                format!(
                    "Parameter declaration {{@{}}} has no alias",
                    class_name.text(self.source)
                ),
                class_name,
                Severity::Warning,
            ),
            _ => {}
        }
        let decl = ParameterDeclaration {
            class_name,
            alias,
            closed,
        };
        self.add_leaf(NodeKind::ParameterDeclaration(decl), span);
    }

    fn add_braced_expression(&mut self, span: Span, content: Option<Span>, closed: bool) {
        let content = content.unwrap_or(Span::new(span.start + 1, span.start + 1));
        let parent = self.current_parent();
        let infix = self.config.infix_expressions;
        self.add_expression(parent, span, content, infix, true, closed);
    }

    fn add_expression(
        &mut self,
        parent: NodeId,
        span: Span,
        content: Span,
        infix: bool,
        braced: bool,
        closed: bool,
    ) {
        let expression = Expression {
            content,
            infix,
            braced,
            closed,
        };
        let id = self.add_node(parent, NodeKind::Expression(expression), span);
        self.add_parts(id, content, infix);
    }

    /// Run the expression lexer over `content` and attach one part node per
    /// part token. A quoted string becomes a single part.
    fn add_parts(&mut self, expression: NodeId, content: Span, infix: bool) {
        let mut string_start = None;
        for token in ExprLexer::tokenize(self.source, content, infix) {
            if let Some(error) = token.error {
                self.report(ErrorCode::SyntaxError, error, token.span);
            }
            let part = match token.kind {
                expr_lexer::TokenKind::ObjectPart => Some((PartKind::Object, token.span)),
                expr_lexer::TokenKind::PropertyPart => Some((PartKind::Property, token.span)),
                expr_lexer::TokenKind::MethodPart => Some((PartKind::Method, token.span)),
                expr_lexer::TokenKind::NamespacePart => Some((PartKind::Namespace, token.span)),
                expr_lexer::TokenKind::InfixMethodPart => {
                    Some((PartKind::InfixMethod, token.span))
                }
                expr_lexer::TokenKind::InfixParameter => {
                    Some((PartKind::InfixParameter, token.span))
                }
                expr_lexer::TokenKind::StartString => {
                    string_start = Some(token.span.start);
                    None
                }
                expr_lexer::TokenKind::EndString => string_start
                    .take()
                    .map(|start| (PartKind::String, Span::new(start, token.span.end))),
                expr_lexer::TokenKind::Eos => string_start
                    .take()
                    .map(|start| (PartKind::String, Span::new(start, token.span.start))),
                _ => None,
            };
            if let Some((kind, span)) = part {
                self.add_node(expression, NodeKind::Part(kind), span);
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn current_parent(&self) -> NodeId {
        self.stack.last().copied().unwrap_or(NodeId::ROOT)
    }

    fn add_leaf(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let parent = self.current_parent();
        self.add_node(parent, kind, span)
    }

    fn add_node(&mut self, parent: NodeId, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            span,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn report(&mut self, code: ErrorCode, message: String, span: Span) {
        self.report_with(code, message, span, Severity::Error);
    }

    fn report_with(&mut self, code: ErrorCode, message: String, span: Span, severity: Severity) {
        self.reports.push(Report {
            code,
            message,
            span,
            severity,
        });
    }
}

fn plain_parameter(name: Option<Span>, value: Option<Span>) -> NodeKind {
    NodeKind::Parameter(Parameter { name, value })
}

/// Byte offset of the `=` in `name=value`, ignoring quoted text. A leading
/// `=` does not count.
fn split_assignment(text: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '=' && i > 0 => return Some(i),
            None => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Document {
        Parser::parse(source, "test.html")
    }

    fn kinds(doc: &Document, ids: &[NodeId]) -> Vec<&'static str> {
        ids.iter().map(|id| doc.node(*id).kind.name()).collect()
    }

    fn section(doc: &Document, id: NodeId) -> &Section {
        match &doc.node(id).kind {
            NodeKind::Section(section) => section,
            other => panic!("expected section, got {other:?}"),
        }
    }

    fn codes(doc: &Document) -> Vec<ErrorCode> {
        doc.diagnostics().iter().map(|d| d.code).collect()
    }

    // =========================================================================
    // Basics
    // =========================================================================

    #[test]
    fn test_empty_template() {
        let doc = parse("");
        assert!(doc.children().is_empty());
        assert!(doc.diagnostics().is_empty());
        assert_eq!(doc.root().span, Span::new(0, 0));
    }

    #[test]
    fn test_plain_text() {
        let doc = parse("Hello world");
        assert_eq!(kinds(&doc, doc.children()), vec!["Text"]);
        assert_eq!(doc.node_text(doc.children()[0]), "Hello world");
    }

    #[test]
    fn test_text_and_expression() {
        let doc = parse("Hello {name}!");
        assert_eq!(
            kinds(&doc, doc.children()),
            vec!["Text", "Expression", "Text"]
        );
        let expr = doc.children()[1];
        assert_eq!(doc.node_text(expr), "{name}");
        match &doc.node(expr).kind {
            NodeKind::Expression(e) => {
                assert_eq!(doc.span_text(e.content), "name");
                assert!(e.braced);
                assert!(e.closed);
            }
            other => panic!("expected expression, got {other:?}"),
        }
    }

    #[test]
    fn test_literal_brace_is_text() {
        let doc = parse("a { b");
        assert_eq!(kinds(&doc, doc.children()), vec!["Text"]);
        assert!(doc.diagnostics().is_empty());
    }

    // =========================================================================
    // Comments and CDATA
    // =========================================================================

    #[test]
    fn test_comment() {
        let doc = parse("{! {#if} !}");
        assert_eq!(kinds(&doc, doc.children()), vec!["Comment"]);
        assert!(doc.diagnostics().is_empty());
        match &doc.node(doc.children()[0]).kind {
            NodeKind::Comment(c) => {
                assert!(c.closed);
                assert_eq!(c.content.map(|s| doc.span_text(s)), Some(" {#if} "));
            }
            other => panic!("expected comment, got {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_comment() {
        let doc = parse("a{! never");
        assert_eq!(kinds(&doc, doc.children()), vec!["Text", "Comment"]);
        assert_eq!(codes(&doc), vec![ErrorCode::UnterminatedComment]);
        assert_eq!(doc.node(doc.children()[1]).span, Span::new(1, 9));
    }

    #[test]
    fn test_cdata_forms() {
        let doc = parse("{|{x}|}{[{y}]}");
        assert_eq!(kinds(&doc, doc.children()), vec!["CDATA", "CDATA"]);
        match &doc.node(doc.children()[1]).kind {
            NodeKind::CData(c) => assert!(c.legacy),
            other => panic!("expected cdata, got {other:?}"),
        }
        assert!(doc.diagnostics().is_empty());
    }

    #[test]
    fn test_unterminated_cdata() {
        let doc = parse("{| open");
        assert_eq!(codes(&doc), vec![ErrorCode::UnterminatedCdata]);
    }

    #[test]
    fn test_unterminated_legacy_cdata() {
        let doc = parse("a{[ open");
        assert_eq!(codes(&doc), vec![ErrorCode::UnterminatedCdata]);
        let cdata = doc.children()[1];
        assert_eq!(doc.node(cdata).span, Span::new(1, 8));
        match &doc.node(cdata).kind {
            NodeKind::CData(c) => {
                assert!(c.legacy);
                assert!(!c.closed);
            }
            other => panic!("expected cdata, got {other:?}"),
        }
        assert_eq!(doc.diagnostics()[0].span, Span::new(1, 3));
    }

    // =========================================================================
    // Sections
    // =========================================================================

    #[test]
    fn test_section_nesting() {
        let doc = parse("{#each items}{it.name}{/each}");
        assert_eq!(kinds(&doc, doc.children()), vec!["Section"]);
        let each = doc.children()[0];
        let s = section(&doc, each);
        assert_eq!(doc.span_text(s.name), "each");
        assert_eq!(s.kind, SectionKind::Each);
        assert_eq!(s.end_tag.map(|t| doc.span_text(t)), Some("{/each}"));
        assert_eq!(doc.node(each).span, Span::new(0, 29));
        assert_eq!(
            kinds(&doc, &doc.node(each).children),
            vec!["Parameter", "Expression"]
        );
        assert!(doc.diagnostics().is_empty());
    }

    #[test]
    fn test_self_closing_section() {
        let doc = parse("{#include base /}after");
        assert_eq!(kinds(&doc, doc.children()), vec!["Section", "Text"]);
        let s = section(&doc, doc.children()[0]);
        assert!(s.self_closed);
        assert!(doc.diagnostics().is_empty());
    }

    #[test]
    fn test_else_block_is_child_of_if() {
        let doc = parse("{#if a}x{#else}y{/if}");
        let if_id = doc.children()[0];
        assert_eq!(
            kinds(&doc, &doc.node(if_id).children),
            vec!["Parameter", "Text", "Section"]
        );
        let else_id = doc.node(if_id).children[2];
        let else_section = section(&doc, else_id);
        assert!(else_section.block);
        assert_eq!(doc.node_text(else_id), "{#else}y");
        assert_eq!(doc.node(if_id).span, Span::new(0, 21));
        assert!(doc.diagnostics().is_empty());
    }

    #[test]
    fn test_else_if_chain() {
        let doc = parse("{#if a}1{#else if b}2{#else}3{/if}");
        let if_id = doc.children()[0];
        let blocks: Vec<NodeId> = doc.node(if_id).children[2..].to_vec();
        assert_eq!(kinds(&doc, &blocks), vec!["Section", "Section"]);
        assert_eq!(doc.node_text(blocks[0]), "{#else if b}2");
        assert!(doc.diagnostics().is_empty());
    }

    #[test]
    fn test_switch_case_blocks() {
        let doc = parse("{#switch x}{#case 1}a{#case 2}b{/switch}");
        let switch = doc.children()[0];
        let names: Vec<&str> = doc.node(switch).children[1..]
            .iter()
            .filter_map(|id| doc.section_name(*id))
            .collect();
        assert_eq!(names, vec!["case", "case"]);
        assert!(doc.diagnostics().is_empty());
    }

    #[test]
    fn test_unterminated_section() {
        let doc = parse("{#each items}{it}");
        assert_eq!(codes(&doc), vec![ErrorCode::UnterminatedSection]);
        let each = doc.children()[0];
        assert!(section(&doc, each).unterminated);
        assert_eq!(doc.node(each).span, Span::new(0, 17));
        assert_eq!(doc.diagnostics()[0].node, each);
    }

    #[test]
    fn test_outer_end_tag_closes_inner_sections() {
        let doc = parse("{#if a}{#let x=1}{/if}");
        assert_eq!(codes(&doc), vec![ErrorCode::UnterminatedSection]);
        let if_id = doc.children()[0];
        let let_id = doc.node(if_id).children[1];
        assert_eq!(doc.section_name(let_id), Some("let"));
        assert!(section(&doc, let_id).unterminated);
        assert_eq!(doc.node(let_id).span.end, 17);
        assert_eq!(section(&doc, if_id).end_tag, Some(Span::new(17, 22)));
    }

    #[test]
    fn test_mismatched_end_tag() {
        let doc = parse("{#if a}x{/each}");
        assert_eq!(codes(&doc), vec![ErrorCode::SectionEndDoesNotMatchStart]);
        let if_id = doc.children()[0];
        assert_eq!(doc.node(if_id).span, Span::new(0, 15));
    }

    #[test]
    fn test_mismatched_block_end_tag() {
        let doc = parse("{#if a}x{#else}y{/elsa}");
        assert_eq!(
            codes(&doc),
            vec![ErrorCode::SectionBlockEndDoesNotMatchStart]
        );
        let if_id = doc.children()[0];
        assert_eq!(doc.node(if_id).span.end, 23);
    }

    #[test]
    fn test_empty_end_tag_closes_top() {
        let doc = parse("{#let a=1}x{/}");
        assert!(doc.diagnostics().is_empty());
        let s = section(&doc, doc.children()[0]);
        assert_eq!(s.end_tag, Some(Span::new(11, 14)));
    }

    #[test]
    fn test_orphan_end_tag() {
        let doc = parse("x{/if}");
        assert_eq!(codes(&doc), vec![ErrorCode::SectionEndDoesNotMatchStart]);
        let orphan = doc.children()[1];
        let s = section(&doc, orphan);
        assert_eq!(s.start_tag, None);
        assert!(!s.is_open());
    }

    #[test]
    fn test_orphan_empty_end_tag() {
        let doc = parse("x{/}");
        assert_eq!(codes(&doc), vec![ErrorCode::SectionEndDoesNotMatchStart]);
        let orphan = doc.children()[1];
        let s = section(&doc, orphan);
        assert_eq!(s.start_tag, None);
        assert_eq!(s.end_tag, Some(Span::new(1, 4)));
        assert!(s.name.is_empty());
        assert_eq!(doc.diagnostics()[0].node, orphan);
    }

    #[test]
    fn test_end_tag_with_space_before_name() {
        let doc = parse("{#each items}a{/ if}b");
        assert_eq!(
            codes(&doc),
            vec![
                ErrorCode::SectionEndDoesNotMatchStart,
                ErrorCode::SyntaxError
            ]
        );
        let each = doc.children()[0];
        assert_eq!(doc.node(each).span, Span::new(0, 20));
        assert_eq!(kinds(&doc, doc.children()), vec!["Section", "Text"]);
    }

    #[test]
    fn test_end_tag_with_space_before_matching_name() {
        let doc = parse("{#each items}a{/ each}b");
        assert_eq!(codes(&doc), vec![ErrorCode::SyntaxError]);
        let each = doc.children()[0];
        assert_eq!(section(&doc, each).end_tag, Some(Span::new(14, 22)));
    }

    #[test]
    fn test_section_without_name() {
        let doc = parse("{#}text");
        assert_eq!(codes(&doc), vec![ErrorCode::NoSectionName]);
        assert_eq!(kinds(&doc, doc.children()), vec!["Section", "Text"]);
    }

    #[test]
    fn test_start_tag_cut_off_by_expression() {
        let doc = parse("{#if a {x}");
        let if_id = doc.children()[0];
        assert_eq!(doc.section_name(if_id), Some("if"));
        // the expression nests inside the still-open section
        assert_eq!(
            kinds(&doc, &doc.node(if_id).children),
            vec!["Parameter", "Expression"]
        );
        assert!(codes(&doc).contains(&ErrorCode::UnterminatedSection));
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    #[test]
    fn test_if_condition_is_one_infix_expression() {
        let doc = parse("{#if user.active && count > 0}{/if}");
        let if_id = doc.children()[0];
        let param = doc.node(if_id).children[0];
        assert_eq!(doc.node_text(param), "user.active && count > 0");
        let expr = doc.node(param).children[0];
        match &doc.node(expr).kind {
            NodeKind::Expression(e) => {
                assert!(e.infix);
                assert!(!e.braced);
            }
            other => panic!("expected expression, got {other:?}"),
        }
    }

    #[test]
    fn test_for_alias_and_iterable() {
        let doc = parse("{#for item in items}{/for}");
        let for_id = doc.children()[0];
        let params = &doc.node(for_id).children;
        assert_eq!(params.len(), 2);
        match &doc.node(params[0]).kind {
            NodeKind::Parameter(p) => {
                assert_eq!(p.name.map(|s| doc.span_text(s)), Some("item"));
                assert_eq!(p.value, None);
            }
            other => panic!("expected parameter, got {other:?}"),
        }
        assert_eq!(doc.node_text(params[1]), "items");
        assert_eq!(kinds(&doc, &doc.node(params[1]).children), vec!["Expression"]);
    }

    #[test]
    fn test_named_parameters() {
        let doc = parse("{#let name=item.name label=\"a=b\"}{/let}");
        let let_id = doc.children()[0];
        let params = &doc.node(let_id).children;
        assert_eq!(params.len(), 2);
        match &doc.node(params[1]).kind {
            NodeKind::Parameter(p) => {
                assert_eq!(p.name.map(|s| doc.span_text(s)), Some("label"));
                assert_eq!(p.value.map(|s| doc.span_text(s)), Some("\"a=b\""));
            }
            other => panic!("expected parameter, got {other:?}"),
        }
    }

    #[test]
    fn test_include_parameters_are_not_expressions() {
        let doc = parse("{#include base /}");
        let include = doc.children()[0];
        let param = doc.node(include).children[0];
        assert!(doc.node(param).children.is_empty());
    }

    #[test]
    fn test_split_assignment() {
        assert_eq!(split_assignment("a=b"), Some(1));
        assert_eq!(split_assignment("'x=y'"), None);
        assert_eq!(split_assignment("=b"), None);
        assert_eq!(split_assignment("plain"), None);
    }

    // =========================================================================
    // Expression parts
    // =========================================================================

    #[test]
    fn test_expression_parts() {
        let doc = parse("{item.name}");
        let expr = doc.children()[0];
        assert_eq!(
            kinds(&doc, &doc.node(expr).children),
            vec!["ObjectPart", "PropertyPart"]
        );
    }

    #[test]
    fn test_namespace_and_method_parts() {
        let doc = parse("{inject:bean.call(x)}");
        let expr = doc.children()[0];
        let parts = kinds(&doc, &doc.node(expr).children);
        assert_eq!(parts[0], "NamespacePart");
        assert!(parts.contains(&"MethodPart"));
    }

    #[test]
    fn test_infix_parts() {
        let doc = parse("{name or 'N/A'}");
        let expr = doc.children()[0];
        assert_eq!(
            kinds(&doc, &doc.node(expr).children),
            vec!["ObjectPart", "InfixMethodPart", "StringPart"]
        );
    }

    #[test]
    fn test_trailing_dot_is_syntax_error() {
        let doc = parse("{items.}");
        assert_eq!(codes(&doc), vec![ErrorCode::SyntaxError]);
        assert_eq!(doc.diagnostics()[0].span, Span::new(6, 7));
        let expr = doc.children()[0];
        assert_eq!(doc.diagnostics()[0].node, expr);
    }

    #[test]
    fn test_infix_disabled_by_config() {
        let config = ParserConfig::default().with_infix_expressions(false);
        let doc = Parser::parse_with_config("{a b}", "test.html", &config);
        assert_eq!(codes(&doc), vec![ErrorCode::SyntaxError]);
    }

    // =========================================================================
    // Parameter declarations
    // =========================================================================

    #[test]
    fn test_parameter_declaration() {
        let doc = parse("{@java.util.List<String> items}");
        match &doc.node(doc.children()[0]).kind {
            NodeKind::ParameterDeclaration(d) => {
                assert_eq!(
                    d.class_name.map(|s| doc.span_text(s)),
                    Some("java.util.List<String>")
                );
                assert_eq!(d.alias.map(|s| doc.span_text(s)), Some("items"));
                assert!(d.closed);
            }
            other => panic!("expected declaration, got {other:?}"),
        }
        assert!(doc.diagnostics().is_empty());
    }

    #[test]
    fn test_parameter_declaration_without_alias() {
        let doc = parse("{@Item}");
        assert_eq!(codes(&doc), vec![ErrorCode::MissingParameterAlias]);
        assert!(!doc.diagnostics()[0].is_error());
    }
}
