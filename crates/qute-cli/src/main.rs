use clap::{Parser, Subcommand};
use log::{debug, info};
use qute_lexer::{Position, Scanner};
use qute_parser::{Document, NodeId, ParserConfig};
use serde_json::json;
use std::path::Path;

#[derive(Parser)]
#[command(name = "qute")]
#[command(about = "Qute template checker and inspector")]
#[command(version)]
struct Cli {
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Scan `{...}` expressions without infix notation
    #[arg(long, global = true)]
    no_infix: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report the diagnostics of a template
    Check {
        /// Template file
        path: String,
    },

    /// Dump the template tokens
    Tokens {
        /// Template file
        path: String,
    },

    /// Dump the node tree
    Tree {
        /// Template file
        path: String,
    },

    /// Show the node at an offset or a 1-based `line:column`
    NodeAt {
        /// Template file
        path: String,
        /// Byte offset or `line:column`
        at: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ParserConfig::default().with_infix_expressions(!cli.no_infix);
    let code = match &cli.command {
        Command::Check { path } => cmd_check(path, &config, cli.json),
        Command::Tokens { path } => cmd_tokens(path, cli.json),
        Command::Tree { path } => cmd_tree(path, &config, cli.json),
        Command::NodeAt { path, at } => cmd_node_at(path, at, &config, cli.json),
    };
    std::process::exit(code);
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn read_source(path: &str) -> String {
    let p = Path::new(path);
    if !p.exists() {
        eprintln!("Error: file not found: {path}");
        std::process::exit(1);
    }
    match std::fs::read_to_string(p) {
        Ok(source) => {
            debug!("read {} bytes from {path}", source.len());
            source
        }
        Err(e) => {
            eprintln!("Error reading {path}: {e}");
            std::process::exit(1);
        }
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("Error encoding JSON: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_check(path: &str, config: &ParserConfig, json: bool) -> i32 {
    let source = read_source(path);
    let doc = qute_parser::Parser::parse_with_config(&source, path, config);
    let errors = doc.diagnostics().iter().filter(|d| d.is_error()).count();
    info!("{path}: {} diagnostics", doc.diagnostics().len());

    if json {
        let diagnostics: Vec<serde_json::Value> = doc
            .diagnostics()
            .iter()
            .map(|d| {
                json!({
                    "code": d.code,
                    "message": d.message,
                    "severity": d.severity,
                    "span": d.span,
                    "start": doc.position_at(d.span.start).ok(),
                    "end": doc.position_at(d.span.end).ok(),
                })
            })
            .collect();
        print_json(&json!({ "uri": path, "diagnostics": diagnostics }));
    } else {
        for d in doc.diagnostics() {
            let at = doc
                .position_at(d.span.start)
                .map(|p| p.to_string())
                .unwrap_or_else(|_| d.span.start.to_string());
            let severity = if d.is_error() { "error" } else { "warning" };
            eprintln!("{path}:{at}: {severity}[{}]: {}", d.code, d.message);
        }
        if doc.diagnostics().is_empty() {
            eprintln!("OK: {path}");
        }
    }

    if errors > 0 {
        1
    } else {
        0
    }
}

fn cmd_tokens(path: &str, json: bool) -> i32 {
    let source = read_source(path);
    let tokens = Scanner::tokenize(&source);

    if json {
        match serde_json::to_value(&tokens) {
            Ok(value) => print_json(&value),
            Err(e) => {
                eprintln!("Error encoding JSON: {e}");
                return 1;
            }
        }
    } else {
        for token in &tokens {
            let text = token.span.text(&source);
            match &token.error {
                Some(error) => println!(
                    "{:>5}..{:<5} {:?} {text:?} ! {error}",
                    token.span.start, token.span.end, token.kind
                ),
                None => println!(
                    "{:>5}..{:<5} {:?} {text:?}",
                    token.span.start, token.span.end, token.kind
                ),
            }
        }
    }
    0
}

fn cmd_tree(path: &str, config: &ParserConfig, json: bool) -> i32 {
    let source = read_source(path);
    let doc = qute_parser::Parser::parse_with_config(&source, path, config);

    if json {
        print_json(&node_json(&doc, NodeId::ROOT));
    } else {
        let mut out = String::new();
        write_tree(&doc, NodeId::ROOT, 0, &mut out);
        print!("{out}");
    }
    0
}

fn cmd_node_at(path: &str, at: &str, config: &ParserConfig, json: bool) -> i32 {
    let source = read_source(path);
    let doc = qute_parser::Parser::parse_with_config(&source, path, config);

    let offset = match resolve_offset(&doc, at) {
        Ok(offset) => offset,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };
    let Some(id) = doc.find_node_at(offset) else {
        eprintln!("Error: offset {offset} is outside of {path}");
        return 1;
    };

    // innermost first
    let mut chain = vec![id];
    let mut current = id;
    while let Some(parent) = doc.parent(current) {
        chain.push(parent);
        current = parent;
    }

    if json {
        let chain: Vec<serde_json::Value> = chain
            .iter()
            .map(|id| {
                let node = doc.node(*id);
                json!({ "kind": node.kind.name(), "span": node.span })
            })
            .collect();
        print_json(&json!({ "offset": offset, "nodes": chain }));
    } else {
        for id in chain {
            println!("{}", describe(&doc, id));
        }
    }
    0
}

/// Accepts a byte offset or a 1-based `line:column`.
fn resolve_offset(doc: &Document, at: &str) -> Result<usize, String> {
    if let Some((line, column)) = at.split_once(':') {
        let line: usize = line.parse().map_err(|_| format!("invalid line: {line}"))?;
        let column: usize = column
            .parse()
            .map_err(|_| format!("invalid column: {column}"))?;
        let position = Position::new(line.saturating_sub(1), column.saturating_sub(1));
        return doc.offset_at(position).map_err(|e| e.to_string());
    }
    at.parse().map_err(|_| format!("invalid offset: {at}"))
}

fn describe(doc: &Document, id: NodeId) -> String {
    let node = doc.node(id);
    let mut text: String = doc.node_text(id).chars().take(40).collect();
    text = text.replace('\n', "\\n").replace('\r', "\\r");
    match doc.section_name(id) {
        Some(name) => format!(
            "{} #{name} [{}..{}] {text:?}",
            node.kind.name(),
            node.span.start,
            node.span.end
        ),
        None => format!(
            "{} [{}..{}] {text:?}",
            node.kind.name(),
            node.span.start,
            node.span.end
        ),
    }
}

fn write_tree(doc: &Document, id: NodeId, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&describe(doc, id));
    out.push('\n');
    for child in &doc.node(id).children {
        write_tree(doc, *child, depth + 1, out);
    }
}

fn node_json(doc: &Document, id: NodeId) -> serde_json::Value {
    let node = doc.node(id);
    let children: Vec<serde_json::Value> =
        node.children.iter().map(|c| node_json(doc, *c)).collect();
    let mut value = json!({
        "kind": node.kind.name(),
        "span": node.span,
        "children": children,
    });
    if let Some(name) = doc.section_name(id) {
        value["name"] = json!(name);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_resolve_offset() {
        let doc = qute_parser::parse("ab\n{x}", "t.html");
        assert_eq!(resolve_offset(&doc, "4"), Ok(4));
        assert_eq!(resolve_offset(&doc, "2:2"), Ok(4));
        assert!(resolve_offset(&doc, "x").is_err());
        assert!(resolve_offset(&doc, "9:1").is_err());
    }

    #[test]
    fn test_write_tree() {
        let doc = qute_parser::parse("a{b}", "t.html");
        let mut out = String::new();
        write_tree(&doc, NodeId::ROOT, 0, &mut out);
        assert_eq!(
            out,
            "Document [0..4] \"a{b}\"\n  Text [0..1] \"a\"\n  Expression [1..4] \"{b}\"\n    ObjectPart [2..3] \"b\"\n"
        );
    }

    #[test]
    fn test_node_json_names_sections() {
        let doc = qute_parser::parse("{#if x}{/if}", "t.html");
        let value = node_json(&doc, NodeId::ROOT);
        assert_eq!(value["children"][0]["name"], json!("if"));
        assert_eq!(value["children"][0]["kind"], json!("Section"));
    }
}
