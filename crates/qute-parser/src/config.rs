//! Parser configuration.

use std::collections::BTreeMap;

/// Knobs for [`crate::Parser`].
///
/// The defaults match the built-in Qute sections. Tooling for a project
/// with custom sections that take blocks registers them with
/// [`ParserConfig::with_blocks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Scan `{...}` expressions with infix notation (`{name or 'N/A'}`).
    pub infix_expressions: bool,
    /// Section name -> names of the block tags it accepts.
    pub block_tags: BTreeMap<String, Vec<String>>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            infix_expressions: true,
            block_tags: BTreeMap::new(),
        }
        .with_blocks("if", &["else"])
        .with_blocks("each", &["else"])
        .with_blocks("for", &["else"])
        .with_blocks("switch", &["case", "is", "else"])
        .with_blocks("when", &["case", "is", "else"])
    }
}

impl ParserConfig {
    /// Register (or replace) the block tags of a section.
    pub fn with_blocks(mut self, section: &str, blocks: &[&str]) -> Self {
        self.block_tags.insert(
            section.to_string(),
            blocks.iter().map(|b| b.to_string()).collect(),
        );
        self
    }

    pub fn with_infix_expressions(mut self, infix: bool) -> Self {
        self.infix_expressions = infix;
        self
    }

    /// Whether `{#block}` opens a block of section `owner`.
    pub fn is_block_of(&self, owner: &str, block: &str) -> bool {
        self.block_tags
            .get(owner)
            .is_some_and(|blocks| blocks.iter().any(|b| b == block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_blocks() {
        let config = ParserConfig::default();
        assert!(config.is_block_of("if", "else"));
        assert!(config.is_block_of("switch", "case"));
        assert!(!config.is_block_of("let", "else"));
        assert!(!config.is_block_of("if", "case"));
        assert!(config.infix_expressions);
    }

    #[test]
    fn test_custom_blocks() {
        let config = ParserConfig::default().with_blocks("myLoop", &["empty"]);
        assert!(config.is_block_of("myLoop", "empty"));
    }
}
