//! Language registry
//!
//! Grammars register under their name, their aliases and their file extensions. Lookups
//! are case-insensitive; a later registration replaces an earlier one for every key it
//! claims.

use super::{BraceGrammar, PythonGrammar, RubyGrammar};
use crate::grammar::config::ParseOptions;
use crate::grammar::error::{GrammarError, Result};
use crate::grammar::parsing::{LanguageGrammar, TokenParser};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Grammars keyed by language name and by file extension.
#[derive(Clone, Default)]
pub struct LanguageRegistry {
    grammars: Vec<Arc<dyn LanguageGrammar>>,
    names: HashMap<String, usize>,
    extensions: HashMap<String, usize>,
}

fn key(name: &str) -> String {
    name.trim().trim_start_matches('.').to_lowercase()
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in grammar.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(BraceGrammar::generic());
        registry.register(BraceGrammar::rust());
        registry.register(BraceGrammar::javascript());
        registry.register(PythonGrammar::new());
        registry.register(RubyGrammar::new());
        registry
    }

    pub fn register<G: LanguageGrammar + 'static>(&mut self, grammar: G) {
        self.register_arc(Arc::new(grammar));
    }

    pub fn register_arc(&mut self, grammar: Arc<dyn LanguageGrammar>) {
        let slot = self.grammars.len();
        self.names.insert(key(grammar.name()), slot);
        for alias in grammar.aliases() {
            self.names.insert(key(alias), slot);
        }
        for extension in grammar.extensions() {
            self.extensions.insert(key(extension), slot);
        }
        debug!(language = grammar.name(), "registered grammar");
        self.grammars.push(grammar);
    }

    /// Grammar registered under `name` or one of its aliases.
    pub fn get(&self, name: &str) -> Option<Arc<dyn LanguageGrammar>> {
        self.names
            .get(&key(name))
            .map(|&slot| Arc::clone(&self.grammars[slot]))
    }

    pub fn has(&self, name: &str) -> bool {
        self.names.contains_key(&key(name))
    }

    /// Grammar for a file extension, with or without the leading dot.
    pub fn for_extension(&self, extension: &str) -> Option<Arc<dyn LanguageGrammar>> {
        self.extensions
            .get(&key(extension))
            .map(|&slot| Arc::clone(&self.grammars[slot]))
    }

    pub fn for_path(&self, path: &Path) -> Option<Arc<dyn LanguageGrammar>> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.for_extension(ext))
    }

    /// Canonical names of the grammars still reachable by name, sorted.
    pub fn languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .grammars
            .iter()
            .enumerate()
            .filter(|(slot, g)| self.names.get(&key(g.name())) == Some(slot))
            .map(|(_, g)| g.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Like `get`, failing with `UnknownLanguage`.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn LanguageGrammar>> {
        self.get(name)
            .ok_or_else(|| GrammarError::UnknownLanguage(name.to_string()))
    }

    pub fn parser(&self, name: &str) -> Result<TokenParser> {
        TokenParser::new(self.resolve(name)?)
    }

    pub fn parser_with_options(&self, name: &str, options: ParseOptions) -> Result<TokenParser> {
        TokenParser::with_options(self.resolve(name)?, options)
    }
}

impl std::fmt::Debug for LanguageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageRegistry")
            .field("languages", &self.languages())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parsing::ParseSession;

    struct Toy;

    impl LanguageGrammar for Toy {
        fn name(&self) -> &str {
            "toy"
        }

        fn aliases(&self) -> &[&str] {
            &["python"]
        }

        fn extensions(&self) -> &[&str] {
            &["toy"]
        }

        fn keywords(&self) -> &[&str] {
            &[]
        }

        fn build(&self, _session: &mut ParseSession<'_>) {}
    }

    #[test]
    fn test_defaults() {
        let registry = LanguageRegistry::with_defaults();
        assert_eq!(
            registry.languages(),
            vec!["brace", "javascript", "python", "ruby", "rust"]
        );
        assert_eq!(registry.get("TypeScript").unwrap().name(), "javascript");
        assert_eq!(registry.get("cpp").unwrap().name(), "brace");
        assert!(registry.has("rb"));
    }

    #[test]
    fn test_extension_lookup() {
        let registry = LanguageRegistry::with_defaults();
        assert_eq!(registry.for_extension(".RS").unwrap().name(), "rust");
        assert_eq!(registry.for_extension("tsx").unwrap().name(), "javascript");
        assert_eq!(
            registry.for_path(Path::new("src/app/main.py")).unwrap().name(),
            "python"
        );
        assert!(registry.for_path(Path::new("Makefile")).is_none());
        assert!(registry.for_extension("cob").is_none());
    }

    #[test]
    fn test_unknown_language() {
        let registry = LanguageRegistry::with_defaults();
        let err = registry.parser("cobol").unwrap_err();
        assert!(matches!(err, GrammarError::UnknownLanguage(name) if name == "cobol"));
    }

    #[test]
    fn test_later_registration_wins() {
        let mut registry = LanguageRegistry::with_defaults();
        registry.register(Toy);
        assert_eq!(registry.get("python").unwrap().name(), "toy");
        assert_eq!(registry.get("py").unwrap().name(), "python");
        assert_eq!(
            registry.languages(),
            vec!["brace", "javascript", "ruby", "rust", "toy"]
        );
    }

    #[test]
    fn test_parser_from_registry() {
        let registry = LanguageRegistry::with_defaults();
        let parser = registry.parser("python").unwrap();
        assert_eq!(parser.language(), "python");
        let outline = parser.parse("def f():\n    pass\n");
        assert_eq!(outline.len(), 1);
    }
}
