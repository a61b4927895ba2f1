//! Whole-template properties of the parser.
//!
//! Every check runs over a corpus of well-formed and broken templates, the
//! kind an editor sees while the user is typing.

use pretty_assertions::assert_eq;
use qute_parser::{parse, Document, ErrorCode, NodeId, NodeKind};

const CORPUS: &[&str] = &[
    "",
    "plain text",
    "Hello {name}!",
    "{#if true}OK{#else}OK{/if}",
    "{#each items}\n\t\n{#each items}\n\t\n{/each}\n",
    "{items.}",
    "{! {#if} !}",
    "a { b",
    "{",
    "{#",
    "{/",
    "{#}",
    "{/}",
    "{#if",
    "{#if a {x}",
    "{#if a}x{#else}y{/elsa}",
    "{#if a}x{/each}",
    "x{/if}",
    "{#let a=1 b='x y'}{a}{/let}",
    "{#for item in items}{item.name}{#else}none{/for}",
    "{#switch x}{#case 1}a{#case 2}b{/switch}",
    "{#include base /}",
    "{@java.util.List<String> items}",
    "{@Item",
    "{! never closed",
    "{| never closed",
    "{[ legacy ]}",
    "{item.call(a.b('x)'), c)}",
    "{item.call(",
    "{'unterminated",
    "{inject:bean.name or 'N/A'}",
    "{a\r\nb}\r\n{#if x}\r\n{/if}",
    "ünïcödé {näme} ✓",
];

fn check_node(doc: &Document, id: NodeId) {
    let node = doc.node(id);
    assert!(
        node.span.start <= node.span.end,
        "inverted span {:?} in {:?}",
        node.span,
        doc.text()
    );
    let mut previous_end = node.span.start;
    for &child in &node.children {
        let span = doc.node(child).span;
        assert_eq!(doc.parent(child), Some(id));
        assert!(
            span.start >= previous_end,
            "child {:?} overlaps its sibling in {:?}",
            span,
            doc.text()
        );
        assert!(
            span.end <= node.span.end,
            "child {:?} escapes parent {:?} in {:?}",
            span,
            node.span,
            doc.text()
        );
        previous_end = span.end;
        check_node(doc, child);
    }
}

// =========================================================================
// Structural invariants
// =========================================================================

#[test]
fn test_tree_invariants() {
    for source in CORPUS {
        let doc = parse(source, "corpus.html");
        assert_eq!(doc.root().span.start, 0);
        assert_eq!(doc.root().span.end, source.len());
        check_node(&doc, NodeId::ROOT);
    }
}

#[test]
fn test_idempotence() {
    for source in CORPUS {
        let first = parse(source, "corpus.html");
        let second = parse(source, "corpus.html");
        assert_eq!(first.node_count(), second.node_count());
        for (a, b) in first.walk().zip(second.walk()) {
            assert_eq!(first.node(a), second.node(b));
        }
        assert_eq!(first.diagnostics(), second.diagnostics());
    }
}

#[test]
fn test_every_offset_resolves() {
    for source in CORPUS {
        let doc = parse(source, "corpus.html");
        for offset in 0..=source.len() {
            assert!(
                doc.find_node_at(offset).is_some(),
                "offset {offset} of {source:?} has no node"
            );
        }
        assert_eq!(doc.find_node_at(source.len() + 1), None);
    }
}

#[test]
fn test_top_level_round_trip() {
    for source in CORPUS {
        let doc = parse(source, "corpus.html");
        let rebuilt: String = doc
            .children()
            .iter()
            .map(|id| doc.node_text(*id))
            .collect();
        assert_eq!(&rebuilt, source);
    }
}

#[test]
fn test_diagnostics_point_at_covering_nodes() {
    for source in CORPUS {
        let doc = parse(source, "corpus.html");
        for diagnostic in doc.diagnostics() {
            let span = doc.node(diagnostic.node).span;
            assert!(span.start <= diagnostic.span.start);
            assert!(diagnostic.span.end <= span.end.max(diagnostic.span.start));
        }
    }
}

// =========================================================================
// Named scenarios
// =========================================================================

#[test]
fn test_balanced_if_else() {
    let doc = parse("{#if true}OK{#else}OK{/if}", "t.html");
    assert!(doc.diagnostics().is_empty());
    assert_eq!(doc.children().len(), 1);
    let if_id = doc.children()[0];
    assert_eq!(doc.section_name(if_id), Some("if"));
    let blocks: Vec<&str> = doc
        .node(if_id)
        .children
        .iter()
        .filter_map(|id| doc.section_name(*id))
        .collect();
    assert_eq!(blocks, vec!["else"]);
}

#[test]
fn test_unterminated_each() {
    let doc = parse("{#each items}\n\t\n{#each items}\n\t\n{/each}\n", "t.html");
    let codes: Vec<ErrorCode> = doc.diagnostics().iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::UnterminatedSection]);
    let diagnostic = &doc.diagnostics()[0];
    assert_eq!(diagnostic.span.start, 0);
    assert_eq!(doc.span_text(diagnostic.span), "{#each items}");
    assert_eq!(diagnostic.node, doc.children()[0]);
}

#[test]
fn test_trailing_dot() {
    let doc = parse("{items.}", "t.html");
    assert_eq!(doc.diagnostics().len(), 1);
    let diagnostic = &doc.diagnostics()[0];
    assert_eq!(diagnostic.code, ErrorCode::SyntaxError);
    assert_eq!(diagnostic.message, "Unexpected '.' token");
    assert_eq!(diagnostic.span.start, 6);
}

#[test]
fn test_comment_opacity() {
    let doc = parse("{! {#if} !}", "t.html");
    assert_eq!(doc.children().len(), 1);
    let comment = doc.children()[0];
    assert!(matches!(doc.node(comment).kind, NodeKind::Comment(_)));
    assert!(doc.node_text(comment).contains("{#if}"));
    assert_eq!(doc.sections().count(), 0);
}

#[test]
fn test_literal_brace() {
    let doc = parse("a { b", "t.html");
    assert_eq!(doc.children().len(), 1);
    let text = doc.children()[0];
    assert!(matches!(doc.node(text).kind, NodeKind::Text));
    assert_eq!(doc.node_text(text), "a { b");
}

#[test]
fn test_mismatched_block_end() {
    let doc = parse("{#if a}x{#else}y{/elsa}", "t.html");
    let codes: Vec<ErrorCode> = doc.diagnostics().iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::SectionBlockEndDoesNotMatchStart]);
}

#[test]
fn test_section_without_name() {
    let doc = parse("{#}", "t.html");
    let codes: Vec<ErrorCode> = doc.diagnostics().iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::NoSectionName]);
}
