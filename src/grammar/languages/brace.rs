//! Brace-delimited languages: the C, Rust and JavaScript families
//!
//!     One `BraceGrammar` serves all three; a `BraceDialect` picks the literal rules, because a
//!     single quote means a char literal in C, a char literal or a lifetime in Rust and a string
//!     in JavaScript.
//!
//!     The builder makes one forward pass over the tokens. At each token it tries to read a
//!     declaration header. A header that ends in `{` has its body matched with the brace
//!     matcher, becomes the enclosing element for everything inside, and the pass continues
//!     at the opening brace, so nested declarations are found on the way through the body.
//!     Headers without a body (`fn f();`, `use a::b;`, `const X = 1;`) are skipped whole.
//!
//! Declarations recognized
//!
//!     - `fn` / `func` / `function`: functions, with `parameters` and `return_type` metadata
//!     - `class` / `struct` / `interface` / `trait` / `enum` / `union`
//!     - `impl [Trait for] Type` (name is the type, `trait` metadata)
//!     - `mod` / `module` / `namespace` / `package`
//!     - `use` / `import` / `using` and `#include`
//!     - `const` / `static` (constants) and `let` / `var` outside functions (variables);
//!       a binding initialized with a function or arrow function is a function
//!     - `type X = ...` and `typedef`
//!     - C/Java/JavaScript declarations without a keyword (`int main(void) {`, `render() {`)
//!       at file or class level

use crate::grammar::ast::{CodeElement, ElementType};
use crate::grammar::blocks::{last_significant_line, match_braces, match_delimited};
use crate::grammar::config::ParseOptions;
use crate::grammar::error::Result;
use crate::grammar::lexing::{RuleFlags, TokenRule};
use crate::grammar::parsing::cursor::{
    compact_text, is_blank, previous_significant, skip_angle_group, split_top_level,
};
use crate::grammar::parsing::{LanguageGrammar, ParseSession, TokenCursor};
use crate::grammar::token::{Metadata, Token, TokenKind};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BraceDialect {
    /// C, C++, Java, Go, C#: `'x'` is a char literal, `#` starts a preprocessor line.
    C,
    /// `'x'` is a char literal, `'a` a lifetime, `#[...]` an attribute.
    Rust,
    /// `'...'` and `` `...` `` are strings, `@name` a decorator.
    JavaScript,
}

impl BraceDialect {
    /// Whether declarations may start without a keyword (`int main() {`).
    fn typed_declarations(self) -> bool {
        !matches!(self, BraceDialect::Rust)
    }
}

pub struct BraceGrammar {
    name: &'static str,
    aliases: &'static [&'static str],
    extensions: &'static [&'static str],
    dialect: BraceDialect,
}

const KEYWORDS: &[&str] = &[
    "fn", "func", "function", "class", "struct", "interface", "trait", "enum", "union", "impl",
    "mod", "module", "namespace", "package", "use", "import", "using", "const", "static", "let",
    "var", "type", "typedef", "pub", "export", "default", "public", "private", "protected",
    "internal", "async", "unsafe", "extern", "abstract", "final", "virtual", "override", "void",
    "return", "if", "else", "for", "while", "do", "loop", "match", "switch", "case", "break",
    "continue", "new", "try", "catch", "finally", "throw", "throws", "where", "mut", "in",
    "extends", "implements", "from", "as", "delete", "typeof", "instanceof", "yield", "await",
];

const OPERATORS: &[(&str, TokenKind)] = &[
    ("->", TokenKind::Arrow),
    ("=>", TokenKind::FatArrow),
    ("=", TokenKind::Equals),
    (":", TokenKind::Colon),
    ("::", TokenKind::Operator),
    ("==", TokenKind::Operator),
    ("===", TokenKind::Operator),
    ("!=", TokenKind::Operator),
    ("!==", TokenKind::Operator),
    ("<=", TokenKind::Operator),
    (">=", TokenKind::Operator),
    ("&&", TokenKind::Operator),
    ("||", TokenKind::Operator),
    ("??", TokenKind::Operator),
    ("?.", TokenKind::Operator),
    ("+=", TokenKind::Operator),
    ("-=", TokenKind::Operator),
    ("*=", TokenKind::Operator),
    ("/=", TokenKind::Operator),
    ("%=", TokenKind::Operator),
    ("&=", TokenKind::Operator),
    ("|=", TokenKind::Operator),
    ("^=", TokenKind::Operator),
    ("<<=", TokenKind::Operator),
    (">>=", TokenKind::Operator),
    ("<<", TokenKind::Operator),
    (">>", TokenKind::Operator),
    ("++", TokenKind::Operator),
    ("--", TokenKind::Operator),
    ("**", TokenKind::Operator),
    ("...", TokenKind::Operator),
    ("..=", TokenKind::Operator),
    ("..", TokenKind::Operator),
    (":=", TokenKind::Operator),
    ("<-", TokenKind::Operator),
    ("+", TokenKind::Operator),
    ("-", TokenKind::Operator),
    ("*", TokenKind::Operator),
    ("/", TokenKind::Operator),
    ("%", TokenKind::Operator),
    ("<", TokenKind::Operator),
    (">", TokenKind::Operator),
    ("!", TokenKind::Operator),
    ("&", TokenKind::Operator),
    ("|", TokenKind::Operator),
    ("^", TokenKind::Operator),
    ("~", TokenKind::Operator),
    ("?", TokenKind::Operator),
];

/// Keywords that may precede a declaration and end up in its metadata.
const MODIFIERS: &[&str] = &[
    "pub", "export", "default", "public", "private", "protected", "internal", "static", "async",
    "unsafe", "extern", "abstract", "final", "virtual", "override", "const",
];

const VISIBILITY: &[&str] = &["pub", "export", "public", "private", "protected", "internal"];

/// Keywords that start a new declaration; a header scan never runs past one.
const DECLARATION_KEYWORDS: &[&str] = &[
    "fn", "func", "function", "class", "struct", "interface", "trait", "enum", "impl", "mod",
    "module", "namespace",
];

/// Keywords allowed in the prefix of a keyword-less declaration.
const TYPE_KEYWORDS: &[&str] = &["void", "unsafe", "extern"];

impl BraceGrammar {
    /// C-like languages without a grammar of their own.
    pub fn generic() -> Self {
        Self {
            name: "brace",
            aliases: &["c", "cpp", "java", "go", "csharp"],
            extensions: &["c", "h", "cpp", "hpp", "cc", "java", "go", "cs"],
            dialect: BraceDialect::C,
        }
    }

    pub fn rust() -> Self {
        Self {
            name: "rust",
            aliases: &[],
            extensions: &["rs"],
            dialect: BraceDialect::Rust,
        }
    }

    pub fn javascript() -> Self {
        Self {
            name: "javascript",
            aliases: &["typescript", "js", "ts"],
            extensions: &["js", "jsx", "ts", "tsx", "mjs", "cjs"],
            dialect: BraceDialect::JavaScript,
        }
    }

    pub fn dialect(&self) -> BraceDialect {
        self.dialect
    }
}

fn rule(pattern: &str, kind: TokenKind) -> Result<TokenRule> {
    TokenRule::new(pattern, kind)
}

fn flag(metadata: &mut Metadata, key: &str) {
    metadata.insert(key.to_string(), Value::Bool(true));
}

fn text(metadata: &mut Metadata, key: &str, value: impl Into<String>) {
    let value = value.into();
    if !value.is_empty() {
        metadata.insert(key.to_string(), Value::String(value));
    }
}

fn parameters(metadata: &mut Metadata, tokens: &[Token], range: std::ops::Range<usize>) {
    metadata.insert(
        "parameters".to_string(),
        Value::String(compact_text(&tokens[range])),
    );
}

fn unquote(literal: &str) -> &str {
    literal
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '<' | '>'))
        .trim()
}

impl LanguageGrammar for BraceGrammar {
    fn name(&self) -> &str {
        self.name
    }

    fn aliases(&self) -> &[&str] {
        self.aliases
    }

    fn extensions(&self) -> &[&str] {
        self.extensions
    }

    fn keywords(&self) -> &[&str] {
        KEYWORDS
    }

    fn operators(&self) -> &[(&str, TokenKind)] {
        OPERATORS
    }

    fn token_rules(&self, _options: &ParseOptions) -> Result<Vec<TokenRule>> {
        let mut rules = vec![
            rule(r"//[^\r\n]*", TokenKind::Comment)?,
            rule(r"/\*(?s:.*?)(?:\*/|\z)", TokenKind::Comment)?,
        ];
        match self.dialect {
            BraceDialect::C => {
                rules.push(
                    rule(
                        r"#[ \t]*(?P<directive>[A-Za-z_]\w*)(?P<rest>(?:\\\r?\n|[^\r\n])*)",
                        TokenKind::Preprocessor,
                    )?
                    .transform(|caps| {
                        let mut metadata = Metadata::new();
                        let directive = caps.name("directive").map_or("", |m| m.as_str());
                        let rest = caps.name("rest").map_or("", |m| m.as_str().trim());
                        text(&mut metadata, "directive", directive);
                        text(&mut metadata, "argument", rest);
                        metadata
                    }),
                );
                rules.push(rule(r#""(?:[^"\\]|\\(?s:.))*""#, TokenKind::String)?);
                rules.push(rule(r"'(?:[^'\\\r\n]|\\.)*'", TokenKind::String)?);
                rules.push(rule(r"`[^`]*`", TokenKind::String)?);
                rules.push(rule(r"@[A-Za-z_][\w.]*", TokenKind::Attribute)?);
            }
            BraceDialect::Rust => {
                rules.push(rule(r##"b?r#"(?s:.*?)"#"##, TokenKind::String)?);
                rules.push(rule(r###"b?r##"(?s:.*?)"##"###, TokenKind::String)?);
                rules.push(rule(r#"b?r"[^"]*""#, TokenKind::String)?);
                rules.push(rule(r#"b?"(?:[^"\\]|\\(?s:.))*""#, TokenKind::String)?);
                rules.push(
                    rule(
                        r"b?'(?:[^'\\\r\n]|\\(?:x[0-9a-fA-F]{2}|u\{[0-9a-fA-F_]{1,6}\}|.))'",
                        TokenKind::String,
                    )?
                    .transform(|_| {
                        let mut metadata = Metadata::new();
                        flag(&mut metadata, "char");
                        metadata
                    }),
                );
                rules.push(
                    TokenRule::with_flags(
                        r"'[A-Za-z_][A-Za-z0-9_]*",
                        TokenKind::Identifier,
                        RuleFlags::NONE,
                    )?
                    .transform(|_| {
                        let mut metadata = Metadata::new();
                        flag(&mut metadata, "lifetime");
                        metadata
                    }),
                );
                rules.push(rule(
                    r"#!?\[(?:[^\[\]]|\[(?:[^\[\]]|\[[^\[\]]*\])*\])*\]",
                    TokenKind::Attribute,
                )?);
            }
            BraceDialect::JavaScript => {
                rules.push(rule(r#""(?:[^"\\\r\n]|\\(?s:.))*""#, TokenKind::String)?);
                rules.push(rule(r"'(?:[^'\\\r\n]|\\(?s:.))*'", TokenKind::String)?);
                rules.push(rule(r"`(?:[^`\\]|\\(?s:.))*`", TokenKind::String)?);
                rules.push(rule(r"@[A-Za-z_][\w.]*", TokenKind::Attribute)?);
                rules.push(rule(r"#[A-Za-z_]\w*", TokenKind::Identifier)?);
            }
        }
        Ok(rules)
    }

    fn build(&self, session: &mut ParseSession<'_>) {
        let tokens = session.tokens();
        let mut index = 0;
        while index < tokens.len() {
            session.close_bodies(index);
            session.state.observe(&tokens[index]);
            index = match self.declaration_at(session, index) {
                Some(next) => next.max(index + 1),
                None => index + 1,
            };
        }
    }
}

/// Modifiers and attributes written before a declaration keyword.
#[derive(Debug, Default)]
struct Prelude {
    /// First token of the declaration, modifiers included.
    start: usize,
    modifiers: Vec<String>,
    attributes: Vec<String>,
    /// C++ `template <...>` header.
    template: Option<String>,
}

impl Prelude {
    fn read(tokens: &[Token], keyword: usize) -> Self {
        let mut prelude = Prelude {
            start: keyword,
            ..Prelude::default()
        };
        let mut at = keyword;
        while let Some(p) = tokens[..at].iter().rposition(|t| !t.is_trivia()) {
            let token = &tokens[p];
            match token.kind {
                TokenKind::Keyword if MODIFIERS.contains(&token.text.as_str()) => {
                    prelude.modifiers.push(token.text.clone());
                    prelude.start = p;
                }
                TokenKind::String if previous_keyword(tokens, p) == Some("extern") => {}
                TokenKind::CloseParen => {
                    let Some(open) = tokens[..p].iter().rposition(|t| t.kind == TokenKind::OpenParen)
                    else {
                        break;
                    };
                    let Some(pub_at) = previous_significant(tokens, open)
                        .filter(|&i| tokens[i].is_keyword(&["pub"]))
                    else {
                        break;
                    };
                    prelude.modifiers.push(compact_text(&tokens[pub_at..=p]));
                    prelude.start = pub_at;
                    at = pub_at;
                    continue;
                }
                TokenKind::Attribute => prelude.attributes.push(token.text.clone()),
                TokenKind::Operator if matches!(token.text.as_str(), ">" | ">>") => {
                    let Some(template) = template_header(tokens, p) else {
                        break;
                    };
                    prelude.template = Some(compact_text(&tokens[template..=p]));
                    prelude.start = template;
                    at = template;
                    continue;
                }
                TokenKind::Newline => {
                    let before = previous_significant(tokens, p);
                    if !before.is_some_and(|i| {
                        tokens[i].kind == TokenKind::Attribute || template_header(tokens, i).is_some()
                    }) {
                        break;
                    }
                }
                _ => break,
            }
            at = p;
        }
        prelude.modifiers.reverse();
        prelude.attributes.reverse();
        prelude
    }

    fn has(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    fn apply(&self, metadata: &mut Metadata) {
        if let Some(visibility) = self
            .modifiers
            .iter()
            .find(|m| VISIBILITY.iter().any(|v| m.starts_with(v)))
        {
            text(metadata, "visibility", visibility.clone());
        }
        if self.has("async") {
            flag(metadata, "is_async");
        }
        if self.has("static") {
            flag(metadata, "is_static");
        }
        if let Some(template) = &self.template {
            text(metadata, "template", template.clone());
        }
        if !self.attributes.is_empty() {
            metadata.insert(
                "attributes".to_string(),
                Value::from(self.attributes.clone()),
            );
        }
    }
}

/// Index of `template` when `tokens[close]` ends a `template <...>` header.
fn template_header(tokens: &[Token], close: usize) -> Option<usize> {
    if !matches!(tokens[close].text.as_str(), ">" | ">>") {
        return None;
    }
    let mut depth = 0isize;
    for index in (0..=close).rev() {
        let token = &tokens[index];
        match token.text.as_str() {
            ">" => depth += 1,
            ">>" => depth += 2,
            "<" => depth -= 1,
            _ if matches!(
                token.kind,
                TokenKind::OpenBrace | TokenKind::CloseBrace | TokenKind::Semicolon
            ) =>
            {
                return None
            }
            _ => {}
        }
        if depth <= 0 {
            return previous_significant(tokens, index)
                .filter(|&i| is_template_keyword(&tokens[i]));
        }
    }
    None
}

fn is_template_keyword(token: &Token) -> bool {
    token.kind == TokenKind::Identifier && token.text == "template"
}

fn previous_keyword(tokens: &[Token], index: usize) -> Option<&str> {
    previous_significant(tokens, index)
        .map(|i| &tokens[i])
        .filter(|t| t.kind == TokenKind::Keyword)
        .map(|t| t.text.as_str())
}

/// `obj.name`, `Type::name` and `obj?.name` are uses, not declarations.
fn is_member_access(tokens: &[Token], index: usize) -> bool {
    previous_significant(tokens, index).is_some_and(|i| {
        let t = &tokens[i];
        t.kind == TokenKind::Dot || (t.kind == TokenKind::Operator && matches!(t.text.as_str(), "::" | "?."))
    })
}

/// Whether a statement can begin at `index`: after `;`, a brace, an attribute, or a line
/// break that does not continue an expression.
fn at_statement_start(tokens: &[Token], index: usize) -> bool {
    let mut saw_newline = false;
    for token in tokens[..index].iter().rev() {
        match token.kind {
            TokenKind::Whitespace | TokenKind::Comment => {}
            TokenKind::Newline => saw_newline = true,
            TokenKind::Semicolon
            | TokenKind::OpenBrace
            | TokenKind::CloseBrace
            | TokenKind::Attribute
            | TokenKind::Preprocessor => return true,
            TokenKind::Operator
            | TokenKind::Equals
            | TokenKind::Comma
            | TokenKind::Dot
            | TokenKind::OpenParen
            | TokenKind::OpenBracket
            | TokenKind::Arrow
            | TokenKind::FatArrow => return false,
            _ => return saw_newline,
        }
    }
    true
}

/// Inside an expression, where a type keyword is a value (`x = class {}`, `sizeof(struct s)`).
fn in_expression(tokens: &[Token], index: usize) -> bool {
    previous_significant(tokens, index).is_some_and(|i| {
        matches!(
            tokens[i].kind,
            TokenKind::Dot
                | TokenKind::Equals
                | TokenKind::Operator
                | TokenKind::Arrow
                | TokenKind::FatArrow
                | TokenKind::OpenParen
                | TokenKind::OpenBracket
                | TokenKind::Comma
        )
    })
}

/// Index of the `{` or `;` ending a declaration header that starts at `from`. `None` when
/// the header runs into a `}`, another declaration or the end of input.
///
/// Once `->` or `:` has started a type tail, declaration keywords are part of the type
/// (`-> impl Iterator<Item = u32>`, `-> fn() -> u8`) unless one begins a new statement.
fn header_end(tokens: &[Token], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_tail = false;
    for (index, token) in tokens.iter().enumerate().skip(from) {
        match token.kind {
            TokenKind::OpenParen | TokenKind::OpenBracket => depth += 1,
            TokenKind::CloseParen | TokenKind::CloseBracket => depth = depth.saturating_sub(1),
            TokenKind::OpenBrace | TokenKind::Semicolon if depth == 0 => return Some(index),
            TokenKind::CloseBrace | TokenKind::FatArrow if depth == 0 => return None,
            TokenKind::Arrow | TokenKind::Colon if depth == 0 => in_tail = true,
            TokenKind::Keyword
                if depth == 0
                    && token.is_keyword(DECLARATION_KEYWORDS)
                    && (!in_tail || at_statement_start(tokens, index)) =>
            {
                return None
            }
            _ => {}
        }
    }
    None
}

fn continues_expression(token: &Token) -> bool {
    matches!(
        token.kind,
        TokenKind::Operator
            | TokenKind::Equals
            | TokenKind::Comma
            | TokenKind::Dot
            | TokenKind::Arrow
            | TokenKind::FatArrow
            | TokenKind::Colon
    )
}

/// Index of the token ending the statement that starts at `from`: a `;` or a line break at
/// depth zero after a complete expression, an unbalanced closer, or the token count.
fn statement_end(tokens: &[Token], from: usize) -> usize {
    let mut depth = 0usize;
    let mut last: Option<&Token> = None;
    for (index, token) in tokens.iter().enumerate().skip(from) {
        match token.kind {
            TokenKind::OpenParen | TokenKind::OpenBracket | TokenKind::OpenBrace => depth += 1,
            TokenKind::CloseParen | TokenKind::CloseBracket | TokenKind::CloseBrace => {
                if depth == 0 {
                    return index;
                }
                depth -= 1;
            }
            TokenKind::Semicolon if depth == 0 => return index,
            TokenKind::Newline if depth == 0 && last.is_some_and(|t| !continues_expression(t)) => {
                return index
            }
            _ => {}
        }
        if !is_blank(token) {
            last = Some(token);
        }
    }
    tokens.len()
}

/// Last line of the statement `tokens[start..end]`, its `;` included.
fn statement_last_line(tokens: &[Token], start: usize, end: usize) -> usize {
    let through = if tokens.get(end).is_some_and(|t| t.kind == TokenKind::Semicolon) {
        end + 1
    } else {
        end
    };
    last_significant_line(tokens, start, through).unwrap_or(tokens[start].line)
}

/// The token naming one parameter: the identifier before a `:` type annotation, else the
/// last identifier before a default value.
fn parameter_name(tokens: &[Token], piece: std::ops::Range<usize>) -> Option<&Token> {
    let piece = &tokens[piece];
    let cut = piece
        .iter()
        .position(|t| matches!(t.kind, TokenKind::Colon | TokenKind::Equals))
        .unwrap_or(piece.len());
    piece[..cut]
        .iter()
        .rev()
        .find(|t| t.kind == TokenKind::Identifier && !t.metadata.contains_key("lifetime"))
}

/// Whether `tokens[from..]` reads `[*&]* name (`: a function declared after its return type.
fn names_a_function(tokens: &[Token], from: usize) -> bool {
    let mut cursor = TokenCursor::at(tokens, from);
    while let Some((at, _)) = cursor
        .peek_significant()
        .filter(|(_, t)| t.kind == TokenKind::Operator && matches!(t.text.as_str(), "*" | "&"))
    {
        cursor.seek(at + 1);
    }
    cursor.eat_identifier().is_some()
        && cursor
            .peek_significant()
            .is_some_and(|(_, t)| t.kind == TokenKind::OpenParen)
}

/// Where a new body starts and ends.
struct Body {
    open: usize,
    after: usize,
}

impl BraceGrammar {
    fn declaration_at(&self, session: &mut ParseSession<'_>, index: usize) -> Option<usize> {
        let tokens = session.tokens();
        let token = &tokens[index];
        match token.kind {
            TokenKind::Preprocessor => return self.preprocessor(session, index),
            TokenKind::Identifier => return self.typed_declaration(session, index),
            TokenKind::Keyword => {}
            _ => return None,
        }
        if is_member_access(tokens, index) {
            return None;
        }
        match token.text.as_str() {
            "fn" | "func" | "function" => self.callable(session, index),
            "class" => self.type_declaration(session, index, ElementType::Class),
            "struct" | "union" => self.type_declaration(session, index, ElementType::Struct),
            "interface" => self.type_declaration(session, index, ElementType::Interface),
            "trait" => self.type_declaration(session, index, ElementType::Trait),
            "enum" => self.type_declaration(session, index, ElementType::Enum),
            "impl" => self.impl_block(session, index),
            "mod" | "module" | "namespace" | "package" => self.module(session, index),
            "use" | "import" | "using" => self.import(session, index),
            "const" | "static" | "let" | "var" => self
                .binding(session, index)
                .or_else(|| self.typed_declaration(session, index)),
            "type" => self.type_alias(session, index),
            "typedef" => self.typedef(session, index),
            word if MODIFIERS.contains(&word) || TYPE_KEYWORDS.contains(&word) => {
                self.typed_declaration(session, index)
            }
            _ => None,
        }
    }

    /// Add the element, record its symbol, and open its body if it has one. Returns the
    /// index the scan continues from.
    fn emit(
        &self,
        session: &mut ParseSession<'_>,
        element: CodeElement,
        name_token: Option<&Token>,
        body: Option<Body>,
        resume: usize,
    ) -> usize {
        let symbol_type = element.element_type.as_str();
        let name = element.name.clone();
        let id = session.add_element(element);
        if let Some(token) = name_token {
            session.declare(&name, symbol_type, token, Metadata::new());
        }
        match body {
            Some(body) => {
                session.open_body(id, body.open, body.after);
                body.open
            }
            None => resume,
        }
    }

    /// Body starting at `open`, or `None` when `open` is not a brace.
    fn body_at(&self, session: &ParseSession<'_>, open: usize) -> Option<(Body, usize)> {
        let tokens = session.tokens();
        if tokens.get(open)?.kind != TokenKind::OpenBrace {
            return None;
        }
        let block = match_braces(tokens, open);
        let end_line = if block.closed {
            block.end_line(tokens).unwrap_or(tokens[open].line)
        } else {
            session.last_line()
        };
        Some((
            Body {
                open,
                after: block.after,
            },
            end_line,
        ))
    }

    fn declare_parameters(&self, session: &mut ParseSession<'_>, params: std::ops::Range<usize>) {
        let tokens = session.tokens();
        for piece in split_top_level(tokens, params, TokenKind::Comma) {
            if let Some(name) = parameter_name(tokens, piece) {
                session.declare(&name.text, "parameter", name, Metadata::new());
            }
        }
    }

    fn callable(&self, session: &mut ParseSession<'_>, index: usize) -> Option<usize> {
        let tokens = session.tokens();
        let prelude = Prelude::read(tokens, index);
        let mut metadata = Metadata::new();
        let mut cursor = TokenCursor::at(tokens, index + 1);

        if cursor
            .peek_significant()
            .is_some_and(|(_, t)| t.text == "*")
        {
            cursor.skip_inline_trivia().advance();
            flag(&mut metadata, "is_generator");
        }
        if tokens[index].text == "func" {
            if let Some((open, _)) = cursor
                .peek_significant()
                .filter(|(_, t)| t.kind == TokenKind::OpenParen)
            {
                let receiver = match_delimited(tokens, open, TokenKind::OpenParen, TokenKind::CloseParen);
                text(&mut metadata, "receiver", compact_text(&tokens[receiver.range()]));
                cursor.seek(receiver.after);
            }
        }

        let name_token = cursor.eat_identifier();
        let name = match name_token {
            Some(token) => token.text.clone(),
            None if prelude.has("default") => "default".to_string(),
            None => return None,
        };

        cursor.skip_inline_trivia();
        let after_generics = skip_angle_group(tokens, cursor.pos());
        if after_generics > cursor.pos() {
            text(&mut metadata, "generics", compact_text(&tokens[cursor.pos()..after_generics]));
            cursor.seek(after_generics);
        }
        if self.dialect == BraceDialect::C {
            if let Some((open, _)) = cursor
                .peek_significant()
                .filter(|(_, t)| t.kind == TokenKind::OpenBracket)
            {
                let generics =
                    match_delimited(tokens, open, TokenKind::OpenBracket, TokenKind::CloseBracket);
                text(&mut metadata, "generics", compact_text(&tokens[open..generics.after]));
                cursor.seek(generics.after);
            }
        }

        let (open, _) = cursor
            .peek_significant()
            .filter(|(_, t)| t.kind == TokenKind::OpenParen)?;
        let params = match_delimited(tokens, open, TokenKind::OpenParen, TokenKind::CloseParen);
        parameters(&mut metadata, tokens, params.range());
        prelude.apply(&mut metadata);

        let start_line = tokens[prelude.start].line;
        let end = if params.closed {
            header_end(tokens, params.after)
        } else {
            None
        };

        if let Some(end) = end {
            let tail_end = tokens[params.after..end]
                .iter()
                .position(|t| t.is_keyword(&["where"]))
                .map_or(end, |i| params.after + i);
            let tail = compact_text(&tokens[params.after..tail_end]);
            let return_type = tail.trim_start_matches("->").trim_start_matches(':').trim();
            text(&mut metadata, "return_type", return_type);
        }

        let (body, end_line, resume) = match end.and_then(|e| self.body_at(session, e)) {
            Some((body, end_line)) => (Some(body), end_line, 0),
            None => {
                let stop = end.map_or(params.after, |e| e + 1);
                let line = last_significant_line(tokens, index, stop).unwrap_or(start_line);
                (None, line, stop)
            }
        };

        let mut element = CodeElement::new(ElementType::Function, name, start_line, end_line);
        element.metadata = metadata;
        let has_body = body.is_some();
        let next = self.emit(session, element, name_token, body, resume);
        if has_body {
            self.declare_parameters(session, params.range());
        }
        Some(next)
    }

    fn type_declaration(
        &self,
        session: &mut ParseSession<'_>,
        index: usize,
        element_type: ElementType,
    ) -> Option<usize> {
        let tokens = session.tokens();
        let prelude = Prelude::read(tokens, index);
        if in_expression(tokens, prelude.start) {
            return None;
        }
        let mut cursor = TokenCursor::at(tokens, index + 1);
        // C++ `enum class X`
        if element_type == ElementType::Enum {
            cursor.eat_keyword("class");
            cursor.eat_keyword("struct");
        }
        let name_token = cursor.eat_identifier();
        if name_token.is_some() && names_a_function(tokens, cursor.pos()) {
            // C `struct P make(int x) {` returns a tagged type
            return self.typed_declaration(session, index);
        }
        self.type_body(session, prelude, name_token, element_type, cursor.pos())
    }

    /// Shared tail of every type declaration: generics, bases and body (or `;`).
    fn type_body(
        &self,
        session: &mut ParseSession<'_>,
        prelude: Prelude,
        name_token: Option<&Token>,
        element_type: ElementType,
        from: usize,
    ) -> Option<usize> {
        let tokens = session.tokens();
        let mut metadata = Metadata::new();
        let mut cursor = TokenCursor::at(tokens, from);
        cursor.skip_inline_trivia();
        let after_generics = skip_angle_group(tokens, cursor.pos());
        if after_generics > cursor.pos() {
            text(&mut metadata, "generics", compact_text(&tokens[cursor.pos()..after_generics]));
        }

        let end = header_end(tokens, after_generics)?;
        let header = &tokens[after_generics..end];
        if header.iter().any(|t| t.kind == TokenKind::Equals) {
            return None;
        }
        if tokens[end].kind == TokenKind::Semicolon {
            let mut depth = 0usize;
            for token in header {
                match token.kind {
                    TokenKind::OpenParen | TokenKind::OpenBracket => depth += 1,
                    TokenKind::CloseParen | TokenKind::CloseBracket => {
                        depth = depth.saturating_sub(1)
                    }
                    TokenKind::Identifier if depth == 0 => return None,
                    _ => {}
                }
            }
        }
        if name_token.is_none() && tokens[end].kind != TokenKind::OpenBrace {
            return None;
        }

        let bases = compact_text(header);
        let bases = bases.trim_start_matches(':').trim();
        if !bases.starts_with("where") && !bases.starts_with('(') {
            text(&mut metadata, "bases", bases);
        }
        prelude.apply(&mut metadata);

        let name = match name_token {
            Some(token) => token.text.clone(),
            None if prelude.has("default") => "default".to_string(),
            None => String::new(),
        };
        let start_line = tokens[prelude.start].line;
        let (body, end_line) = match self.body_at(session, end) {
            Some((body, end_line)) => (Some(body), end_line),
            None => (None, tokens[end].line),
        };
        let mut element = CodeElement::new(element_type, name, start_line, end_line);
        element.metadata = metadata;
        Some(self.emit(session, element, name_token, body, end + 1))
    }

    fn impl_block(&self, session: &mut ParseSession<'_>, index: usize) -> Option<usize> {
        let tokens = session.tokens();
        if in_expression(tokens, index)
            || previous_significant(tokens, index).is_some_and(|i| tokens[i].kind == TokenKind::Colon)
        {
            return None;
        }
        let prelude = Prelude::read(tokens, index);
        let mut cursor = TokenCursor::at(tokens, index + 1);
        cursor.skip_inline_trivia();
        let from = skip_angle_group(tokens, cursor.pos());
        let end = header_end(tokens, from).filter(|&e| tokens[e].kind == TokenKind::OpenBrace)?;

        let cut = (from..end)
            .find(|&i| tokens[i].is_keyword(&["where"]))
            .unwrap_or(end);
        let mut depth = 0isize;
        let mut for_at = None;
        for i in from..cut {
            match tokens[i].text.as_str() {
                "<" => depth += 1,
                ">" => depth -= 1,
                ">>" => depth -= 2,
                "for" if depth == 0 && tokens[i].kind == TokenKind::Keyword => {
                    for_at = Some(i);
                    break;
                }
                _ => {}
            }
        }

        let mut metadata = Metadata::new();
        let name = match for_at {
            Some(f) => {
                text(&mut metadata, "trait", compact_text(&tokens[from..f]));
                compact_text(&tokens[f + 1..cut])
            }
            None => compact_text(&tokens[from..cut]),
        };
        prelude.apply(&mut metadata);

        let (body, end_line) = self.body_at(session, end)?;
        let start_line = tokens[prelude.start].line;
        let mut element = CodeElement::new(ElementType::Impl, name, start_line, end_line);
        element.metadata = metadata;
        Some(self.emit(session, element, None, Some(body), end + 1))
    }

    fn module(&self, session: &mut ParseSession<'_>, index: usize) -> Option<usize> {
        let tokens = session.tokens();
        let prelude = Prelude::read(tokens, index);
        if !at_statement_start(tokens, prelude.start) {
            return None;
        }
        let mut cursor = TokenCursor::at(tokens, index + 1);
        cursor.skip_inline_trivia();
        let name_start = cursor.pos();
        while let Some(token) = cursor.current() {
            let part_of_name = match token.kind {
                TokenKind::Identifier | TokenKind::Dot | TokenKind::String => true,
                TokenKind::Operator => token.text == "::",
                _ => false,
            };
            if !part_of_name {
                break;
            }
            cursor.advance();
        }
        let name_end = cursor.pos();
        let name_token = tokens.get(name_start).filter(|_| name_end > name_start);
        let name = compact_text(&tokens[name_start..name_end]);
        let name = unquote(&name).to_string();

        let mut metadata = Metadata::new();
        prelude.apply(&mut metadata);
        let start_line = tokens[prelude.start].line;

        if tokens[index].text == "package" {
            name_token?;
            let end = statement_end(tokens, name_start);
            let end_line = statement_last_line(tokens, index, end);
            let mut element = CodeElement::new(ElementType::Module, name, start_line, end_line);
            element.metadata = metadata;
            return Some(self.emit(session, element, name_token, None, end + 1));
        }

        let element_type = if tokens[index].text == "namespace" {
            ElementType::Namespace
        } else {
            ElementType::Module
        };
        let end = header_end(tokens, name_end)?;
        if name_token.is_none() && tokens[end].kind != TokenKind::OpenBrace {
            return None;
        }
        let (body, end_line) = match self.body_at(session, end) {
            Some((body, end_line)) => (Some(body), end_line),
            None => (None, tokens[end].line),
        };
        let mut element = CodeElement::new(element_type, name, start_line, end_line);
        element.metadata = metadata;
        Some(self.emit(session, element, name_token, body, end + 1))
    }

    fn import(&self, session: &mut ParseSession<'_>, index: usize) -> Option<usize> {
        let tokens = session.tokens();
        let prelude = Prelude::read(tokens, index);
        if !at_statement_start(tokens, prelude.start) || session.in_callable() {
            return None;
        }
        let cursor = TokenCursor::at(tokens, index + 1);
        let (next, next_token) = cursor.peek_significant()?;
        if next_token.kind == TokenKind::OpenParen {
            // Go groups one import per line; elsewhere `import(...)` is a call.
            if tokens[index].text != "import" || self.dialect != BraceDialect::C {
                return None;
            }
            let group = match_delimited(tokens, next, TokenKind::OpenParen, TokenKind::CloseParen);
            let mut resume = group.after;
            for &i in &group.members {
                let token = &tokens[i];
                if token.kind != TokenKind::String {
                    continue;
                }
                let element = CodeElement::new(
                    ElementType::Import,
                    unquote(&token.text),
                    token.line,
                    token.line,
                );
                resume = self.emit(session, element, Some(token), None, group.after);
            }
            return Some(resume);
        }

        let end = statement_end(tokens, index + 1);
        let statement = &tokens[index + 1..end];
        let name = match statement.iter().rev().find(|t| t.kind == TokenKind::String) {
            Some(source) => unquote(&source.text).to_string(),
            None => {
                let path = compact_text(statement);
                path.strip_prefix("static ").unwrap_or(&path).to_string()
            }
        };
        if name.is_empty() {
            return None;
        }
        let mut metadata = Metadata::new();
        text(&mut metadata, "statement", compact_text(&tokens[index..end]));
        prelude.apply(&mut metadata);
        let start_line = tokens[prelude.start].line;
        let end_line = statement_last_line(tokens, index, end);
        let mut element = CodeElement::new(ElementType::Import, name, start_line, end_line);
        element.metadata = metadata;
        Some(self.emit(session, element, tokens.get(next), None, end + 1))
    }

    fn preprocessor(&self, session: &mut ParseSession<'_>, index: usize) -> Option<usize> {
        let tokens = session.tokens();
        let token = &tokens[index];
        let directive = token.metadata.get("directive").and_then(Value::as_str)?;
        let argument = token
            .metadata
            .get("argument")
            .and_then(Value::as_str)
            .unwrap_or("");
        let (element_type, name) = match directive {
            "include" | "import" => (ElementType::Import, unquote(argument).to_string()),
            "define" => {
                let name: String = argument
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                (ElementType::Constant, name)
            }
            _ => return None,
        };
        if name.is_empty() {
            return None;
        }
        let mut element =
            CodeElement::new(element_type, name, token.line, token.end_line());
        text(&mut element.metadata, "directive", directive);
        Some(self.emit(session, element, Some(token), None, index + 1))
    }

    /// `const` / `static` / `let` / `var` outside function bodies.
    fn binding(&self, session: &mut ParseSession<'_>, index: usize) -> Option<usize> {
        let tokens = session.tokens();
        let keyword = tokens[index].text.as_str();
        let prelude = Prelude::read(tokens, index);
        if !at_statement_start(tokens, prelude.start) || session.in_callable() {
            return None;
        }
        let file_level = session.enclosing().map_or(true, |id| {
            matches!(
                session.outline[id].element_type,
                ElementType::Module | ElementType::Namespace
            )
        });
        if matches!(keyword, "let" | "var") && !file_level {
            return None;
        }

        let mut cursor = TokenCursor::at(tokens, index + 1);
        cursor.eat_keyword("mut");
        let (first, first_token) = cursor.peek_significant()?;
        match first_token.kind {
            TokenKind::Keyword => return None,
            TokenKind::OpenParen if keyword == "var" || keyword == "const" => {
                return self.binding_group(session, index, first);
            }
            _ => {}
        }
        if keyword == "static" {
            // Rust `static NAME: T`; elsewhere `static` is a modifier.
            let colon = TokenCursor::at(tokens, first + 1).peek_significant();
            if first_token.kind != TokenKind::Identifier
                || !colon.is_some_and(|(_, t)| t.kind == TokenKind::Colon)
            {
                return None;
            }
        }

        let mut depth = 0usize;
        let mut name_token: Option<&Token> = None;
        let mut pattern_end = first;
        let mut equals = None;
        let mut colon = None;
        for (i, token) in tokens.iter().enumerate().skip(first) {
            match token.kind {
                TokenKind::OpenParen if depth == 0 => return None,
                TokenKind::OpenBrace | TokenKind::OpenBracket | TokenKind::OpenParen => depth += 1,
                TokenKind::CloseBrace | TokenKind::CloseBracket | TokenKind::CloseParen => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                TokenKind::Equals if depth == 0 => {
                    equals = Some(i);
                    break;
                }
                TokenKind::Colon if depth == 0 => {
                    colon = Some(i);
                    break;
                }
                TokenKind::Semicolon | TokenKind::Newline if depth == 0 => break,
                TokenKind::Identifier if depth == 0 => name_token = Some(token),
                _ => {}
            }
            pattern_end = i + 1;
        }
        let name = match name_token {
            Some(token) => token.text.clone(),
            None => compact_text(&tokens[first..pattern_end]),
        };
        if name.is_empty() {
            return None;
        }

        let end = statement_end(tokens, index + 1);
        let equals = equals.or_else(|| {
            let from = colon?;
            (from..end).find(|&i| tokens[i].kind == TokenKind::Equals)
        });
        let mut metadata = Metadata::new();
        if let Some(colon) = colon {
            let type_end = equals.unwrap_or(end);
            text(&mut metadata, "type", compact_text(&tokens[colon + 1..type_end]));
        }
        prelude.apply(&mut metadata);
        let start_line = tokens[prelude.start].line;

        if let Some(equals) = equals {
            if let Some(next) =
                self.function_value(session, &prelude, &name, name_token, equals, start_line)
            {
                return Some(next);
            }
        }

        let element_type = match keyword {
            "const" | "static" => ElementType::Constant,
            _ => ElementType::Variable,
        };
        let end_line = statement_last_line(tokens, index, end);
        let mut element = CodeElement::new(element_type, name, start_line, end_line);
        element.metadata = metadata;
        Some(self.emit(session, element, name_token, None, end + 1))
    }

    /// Go's `const ( ... )` / `var ( ... )`: one element per line naming something.
    fn binding_group(
        &self,
        session: &mut ParseSession<'_>,
        index: usize,
        open: usize,
    ) -> Option<usize> {
        let tokens = session.tokens();
        let element_type = if tokens[index].text == "const" {
            ElementType::Constant
        } else {
            ElementType::Variable
        };
        let group = match_delimited(tokens, open, TokenKind::OpenParen, TokenKind::CloseParen);
        for line in split_top_level(tokens, group.range(), TokenKind::Newline) {
            let Some(name) = tokens[line.clone()]
                .iter()
                .find(|t| !t.is_trivia())
                .filter(|t| t.kind == TokenKind::Identifier)
            else {
                continue;
            };
            let end_line = last_significant_line(tokens, line.start, line.end).unwrap_or(name.line);
            let element = CodeElement::new(element_type, name.text.clone(), name.line, end_line);
            self.emit(session, element, Some(name), None, group.after);
        }
        Some(group.after)
    }

    /// `name = function (...) {`, `name = (...) => {`, `name = x => expr`.
    fn function_value(
        &self,
        session: &mut ParseSession<'_>,
        prelude: &Prelude,
        name: &str,
        name_token: Option<&Token>,
        equals: usize,
        start_line: usize,
    ) -> Option<usize> {
        let tokens = session.tokens();
        let mut metadata = Metadata::new();
        let mut cursor = TokenCursor::at(tokens, equals + 1);
        cursor.skip_trivia();
        if cursor.eat_keyword("async") {
            flag(&mut metadata, "is_async");
        }

        let (params, body_from) = if cursor.eat_keyword("function") {
            if cursor.peek_significant().is_some_and(|(_, t)| t.text == "*") {
                cursor.skip_inline_trivia().advance();
            }
            cursor.eat_identifier();
            let (open, _) = cursor
                .peek_significant()
                .filter(|(_, t)| t.kind == TokenKind::OpenParen)?;
            let params = match_delimited(tokens, open, TokenKind::OpenParen, TokenKind::CloseParen);
            let body_from = header_end(tokens, params.after)?;
            (params.range(), body_from)
        } else {
            let (first, first_token) = cursor.peek_significant()?;
            let (params, after) = match first_token.kind {
                TokenKind::OpenParen => {
                    let block =
                        match_delimited(tokens, first, TokenKind::OpenParen, TokenKind::CloseParen);
                    (block.range(), block.after)
                }
                TokenKind::Identifier => (first..first + 1, first + 1),
                _ => return None,
            };
            let arrow = TokenCursor::at(tokens, after).find_at_depth(
                &[TokenKind::FatArrow],
                &[
                    TokenKind::Semicolon,
                    TokenKind::Newline,
                    TokenKind::OpenBrace,
                    TokenKind::Equals,
                ],
            )?;
            let (body_from, _) = TokenCursor::at(tokens, arrow + 1).peek_past_newlines()?;
            (params, body_from)
        };

        parameters(&mut metadata, tokens, params.clone());
        prelude.apply(&mut metadata);

        let (body, end_line, resume) = match self.body_at(session, body_from) {
            Some((body, end_line)) => (Some(body), end_line, 0),
            None => {
                let end = statement_end(tokens, body_from);
                (None, statement_last_line(tokens, body_from, end), end + 1)
            }
        };
        let mut element = CodeElement::new(ElementType::Function, name, start_line, end_line);
        element.metadata = metadata;
        let has_body = body.is_some();
        let next = self.emit(session, element, name_token, body, resume);
        if has_body {
            self.declare_parameters(session, params);
        }
        Some(next)
    }

    fn type_alias(&self, session: &mut ParseSession<'_>, index: usize) -> Option<usize> {
        let tokens = session.tokens();
        let prelude = Prelude::read(tokens, index);
        if !at_statement_start(tokens, prelude.start) || session.in_callable() {
            return None;
        }
        let mut cursor = TokenCursor::at(tokens, index + 1);
        let name_token = cursor.eat_identifier()?;
        cursor.skip_inline_trivia();
        let after_generics = skip_angle_group(tokens, cursor.pos());
        cursor.seek(after_generics);

        if let Some((kind_at, kind)) = cursor.peek_significant() {
            let element_type = match kind.text.as_str() {
                "struct" if kind.kind == TokenKind::Keyword => Some(ElementType::Struct),
                "interface" if kind.kind == TokenKind::Keyword => Some(ElementType::Interface),
                _ => None,
            };
            if let Some(element_type) = element_type {
                return self.type_body(session, prelude, Some(name_token), element_type, kind_at + 1);
            }
        }

        let end = statement_end(tokens, index + 1);
        let mut metadata = Metadata::new();
        let definition_from = (cursor.pos()..end)
            .find(|&i| tokens[i].kind == TokenKind::Equals)
            .map_or(cursor.pos(), |i| i + 1);
        text(
            &mut metadata,
            "definition",
            compact_text(&tokens[definition_from.min(end)..end]),
        );
        prelude.apply(&mut metadata);
        let start_line = tokens[prelude.start].line;
        let end_line = statement_last_line(tokens, index, end);
        let mut element = CodeElement::new(
            ElementType::TypeDefinition,
            name_token.text.clone(),
            start_line,
            end_line,
        );
        element.metadata = metadata;
        Some(self.emit(session, element, Some(name_token), None, end + 1))
    }

    /// C `typedef`. The scan continues inside the statement so a struct defined in it is
    /// found too; repair nests it by range.
    fn typedef(&self, session: &mut ParseSession<'_>, index: usize) -> Option<usize> {
        let tokens = session.tokens();
        if !at_statement_start(tokens, index) || session.in_callable() {
            return None;
        }
        let end = statement_end(tokens, index + 1);
        let mut depth = 0usize;
        let mut name_token = None;
        for token in &tokens[index + 1..end] {
            match token.kind {
                TokenKind::OpenBrace | TokenKind::OpenParen | TokenKind::OpenBracket => depth += 1,
                TokenKind::CloseBrace | TokenKind::CloseParen | TokenKind::CloseBracket => {
                    depth = depth.saturating_sub(1)
                }
                TokenKind::Identifier if depth == 0 => name_token = Some(token),
                _ => {}
            }
        }
        let name_token = name_token.or_else(|| {
            tokens[index + 1..end]
                .iter()
                .rev()
                .find(|t| t.kind == TokenKind::Identifier)
        })?;
        let end_line = statement_last_line(tokens, index, end);
        let element = CodeElement::new(
            ElementType::TypeDefinition,
            name_token.text.clone(),
            tokens[index].line,
            end_line,
        );
        Some(self.emit(session, element, Some(name_token), None, index + 1))
    }

    /// Declarations without a keyword: `int main(void) {`, `public void run() {`,
    /// `render() {` in a class body.
    fn typed_declaration(&self, session: &mut ParseSession<'_>, index: usize) -> Option<usize> {
        if !self.dialect.typed_declarations() || session.in_callable() {
            return None;
        }
        let tokens = session.tokens();
        if is_template_keyword(&tokens[index])
            || !at_statement_start(tokens, Prelude::read(tokens, index).start)
        {
            return None;
        }
        let in_class = session
            .enclosing()
            .is_some_and(|id| session.outline[id].element_type.has_methods());

        let mut name_at: Option<usize> = None;
        let mut is_async = false;
        let mut is_static = false;
        let mut type_words: Vec<usize> = Vec::new();
        let mut at = index;
        let open = loop {
            let token = tokens.get(at)?;
            match token.kind {
                TokenKind::Whitespace | TokenKind::Comment | TokenKind::Newline => {}
                TokenKind::Identifier => {
                    if let Some(previous) = name_at.replace(at) {
                        type_words.push(previous);
                    }
                }
                TokenKind::Keyword
                    if MODIFIERS.contains(&token.text.as_str())
                        || TYPE_KEYWORDS.contains(&token.text.as_str()) =>
                {
                    is_async |= token.text == "async";
                    is_static |= token.text == "static";
                    if TYPE_KEYWORDS.contains(&token.text.as_str()) {
                        type_words.push(at);
                    }
                    name_at = None;
                }
                TokenKind::Keyword if token.is_keyword(&["struct", "enum", "union"]) => {
                    type_words.push(at);
                    name_at = None;
                }
                TokenKind::Operator if token.text == "<" => {
                    if let Some(previous) = name_at.take() {
                        type_words.push(previous);
                    }
                    let after = skip_angle_group(tokens, at);
                    type_words.extend(at..after);
                    at = after;
                    continue;
                }
                TokenKind::Operator if matches!(token.text.as_str(), "*" | "&" | "&&" | "::" | "~" | "?") => {
                    if let Some(previous) = name_at.take() {
                        type_words.push(previous);
                    }
                    type_words.push(at);
                }
                TokenKind::OpenBracket | TokenKind::CloseBracket | TokenKind::Dot => {
                    if let Some(previous) = name_at.take() {
                        type_words.push(previous);
                    }
                    type_words.push(at);
                }
                TokenKind::OpenParen => break at,
                _ => return None,
            }
            at += 1;
        };
        let name_at = name_at?;
        let prefix_is_empty = type_words.is_empty() && !is_async && !is_static
            && !tokens[index..name_at].iter().any(|t| t.kind == TokenKind::Keyword);
        if prefix_is_empty && !in_class {
            return None;
        }

        let params = match_delimited(tokens, open, TokenKind::OpenParen, TokenKind::CloseParen);
        if !params.closed {
            return None;
        }
        let mut newlines = 0;
        let mut at = params.after;
        let body_open = loop {
            let token = tokens.get(at)?;
            match token.kind {
                TokenKind::Whitespace | TokenKind::Comment => {}
                TokenKind::Newline => {
                    newlines += 1;
                    if newlines > 1 {
                        return None;
                    }
                }
                TokenKind::OpenBrace => break at,
                TokenKind::OpenParen if newlines == 0 => {
                    at = match_delimited(tokens, at, TokenKind::OpenParen, TokenKind::CloseParen).after;
                    continue;
                }
                TokenKind::Keyword | TokenKind::Identifier | TokenKind::Colon | TokenKind::Arrow
                | TokenKind::Dot | TokenKind::Comma | TokenKind::OpenBracket
                | TokenKind::CloseBracket => {}
                TokenKind::Operator
                    if matches!(token.text.as_str(), "<" | ">" | ">>" | "*" | "&" | "?" | "|" | "::") => {}
                _ => return None,
            }
            at += 1;
        };

        let mut metadata = Metadata::new();
        parameters(&mut metadata, tokens, params.range());
        // C++ `V() : x(0) {` starts a member initializer list, not a return type
        let tail_end = match self.dialect {
            BraceDialect::C => (params.after..body_open)
                .find(|&i| tokens[i].kind == TokenKind::Colon)
                .unwrap_or(body_open),
            _ => body_open,
        };
        let tail = compact_text(&tokens[params.after..tail_end]);
        let tail = tail.trim_start_matches(':').trim_start_matches("->").trim();
        let return_type = match (type_words.first(), type_words.last()) {
            (Some(&first), Some(&last)) => compact_text(&tokens[first..=last]),
            _ => tail.to_string(),
        };
        text(&mut metadata, "return_type", return_type);
        let mut prelude = Prelude::read(tokens, index);
        for token in &tokens[index..name_at] {
            if token.kind == TokenKind::Keyword && VISIBILITY.contains(&token.text.as_str()) {
                prelude.modifiers.push(token.text.clone());
            }
        }
        prelude.apply(&mut metadata);
        if is_async {
            flag(&mut metadata, "is_async");
        }
        if is_static {
            flag(&mut metadata, "is_static");
        }

        let (body, end_line) = self.body_at(session, body_open)?;
        let name_token = &tokens[name_at];
        let mut element = CodeElement::new(
            ElementType::Function,
            name_token.text.clone(),
            tokens[prelude.start].line,
            end_line,
        );
        element.metadata = metadata;
        let next = self.emit(session, element, Some(name_token), Some(body), 0);
        self.declare_parameters(session, params.range());
        Some(next)
    }
}
