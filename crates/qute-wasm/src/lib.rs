//! WASM bindings for the Qute parser.
//!
//! Exposes `parse()`, `nodeAt()` and `version()` to JavaScript via
//! wasm-bindgen. Results are plain JS objects.

use qute_parser::{Diagnostic, Document};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Summary of a parse handed to JavaScript.
#[derive(Debug, Serialize)]
pub struct ParseSummary {
    pub diagnostics: Vec<DiagnosticView>,
    /// Number of top-level nodes.
    pub children: usize,
}

/// A diagnostic with its start and end as editor positions.
#[derive(Debug, Serialize)]
pub struct DiagnosticView {
    pub code: String,
    pub message: String,
    pub severity: String,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub character: usize,
}

impl DiagnosticView {
    fn new(doc: &Document, d: &Diagnostic) -> Self {
        let position = doc.position_at(d.span.start).unwrap_or_default();
        Self {
            code: d.code.to_string(),
            message: d.message.clone(),
            severity: if d.is_error() { "error" } else { "warning" }.to_string(),
            start: d.span.start,
            end: d.span.end,
            line: position.line,
            character: position.character,
        }
    }
}

/// Parse a template and summarize the result.
pub fn summarize(source: &str) -> ParseSummary {
    let doc = qute_parser::parse(source, "inline.html");
    ParseSummary {
        diagnostics: doc
            .diagnostics()
            .iter()
            .map(|d| DiagnosticView::new(&doc, d))
            .collect(),
        children: doc.children().len(),
    }
}

/// Kind name and span of the deepest node at `offset`.
pub fn node_at(source: &str, offset: usize) -> Option<(&'static str, usize, usize)> {
    let doc = qute_parser::parse(source, "inline.html");
    let id = doc.find_node_at(offset)?;
    let node = doc.node(id);
    Some((node.kind.name(), node.span.start, node.span.end))
}

/// Parse a Qute template.
///
/// Returns `{ diagnostics: [...], children: number }`.
#[wasm_bindgen]
pub fn parse(source: &str) -> Result<JsValue, JsError> {
    serde_wasm_bindgen::to_value(&summarize(source)).map_err(|e| JsError::new(&e.to_string()))
}

/// Node at a byte offset as `{ kind, start, end }`, or `null` past the end.
#[wasm_bindgen(js_name = nodeAt)]
pub fn node_at_js(source: &str, offset: usize) -> Result<JsValue, JsError> {
    let Some((kind, start, end)) = node_at(source, offset) else {
        return Ok(JsValue::NULL);
    };

    let js_obj = js_sys::Object::new();
    js_sys::Reflect::set(&js_obj, &"kind".into(), &kind.into())
        .map_err(|_| JsError::new("Failed to set kind property"))?;
    js_sys::Reflect::set(&js_obj, &"start".into(), &(start as u32).into())
        .map_err(|_| JsError::new("Failed to set start property"))?;
    js_sys::Reflect::set(&js_obj, &"end".into(), &(end as u32).into())
        .map_err(|_| JsError::new("Failed to set end property"))?;

    Ok(js_obj.into())
}

/// Get the parser version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
