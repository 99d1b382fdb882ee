//! Import statement rewriting for page-declaration files.
//!
//! Page-declaration files are evaluated only to read their config values, so
//! their imports must not be resolved. Each static import declaration is
//! replaced by `const` bindings holding an import string
//! (`import:<path>:<exportName>`) that later stages turn back into real
//! imports. Everything else in the code is kept byte for byte.

/// Prefix shared by all import strings.
pub const IMPORT_STRING_PREFIX: &str = "import:";

/// Replace every static import declaration of `code` by import strings.
pub fn rewrite_imports(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut copied_up_to = 0;

    for declaration in find_import_declarations(code) {
        out.push_str(&code[copied_up_to..declaration.start]);
        out.push_str(&declaration.render());
        copied_up_to = declaration.end;
    }
    out.push_str(&code[copied_up_to..]);
    out
}

/// Build the import string for `export_name` of `import_path`.
pub fn import_string(import_path: &str, export_name: &str) -> String {
    format!("{IMPORT_STRING_PREFIX}{import_path}:{export_name}")
}

/// Split an import string into `(import_path, export_name)`.
///
/// The path may itself contain colons (`node:fs`), the export name may not.
pub fn parse_import_string(value: &str) -> Option<(&str, &str)> {
    let (import_path, export_name) = value.strip_prefix(IMPORT_STRING_PREFIX)?.rsplit_once(':')?;
    if import_path.is_empty() || export_name.is_empty() {
        return None;
    }
    Some((import_path, export_name))
}

#[derive(Debug, PartialEq, Eq)]
struct Binding {
    export_name: String,
    local_name: String,
}

#[derive(Debug)]
struct ImportDeclaration {
    start: usize,
    end: usize,
    import_path: String,
    bindings: Vec<Binding>,
}

impl ImportDeclaration {
    fn render(&self) -> String {
        self.bindings
            .iter()
            .map(|binding| {
                format!(
                    "const {} = {};",
                    binding.local_name,
                    js_string_literal(&import_string(&self.import_path, &binding.export_name))
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn js_string_literal(value: &str) -> String {
    let mut literal = String::with_capacity(value.len() + 2);
    literal.push('"');
    for c in value.chars() {
        match c {
            '\\' => literal.push_str("\\\\"),
            '"' => literal.push_str("\\\""),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\u{2028}' => literal.push_str("\\u2028"),
            '\u{2029}' => literal.push_str("\\u2029"),
            c => literal.push(c),
        }
    }
    literal.push('"');
    literal
}

/// What the scanner saw last, used to tell regex literals from division and
/// member access from keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prev<'a> {
    Start,
    Punct(u8),
    Word(&'a str),
    Value,
}

const KEYWORDS_BEFORE_EXPRESSION: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

impl Prev<'_> {
    fn allows_regex(self) -> bool {
        match self {
            Prev::Start | Prev::Punct(_) => true,
            Prev::Word(word) => KEYWORDS_BEFORE_EXPRESSION.contains(&word),
            Prev::Value => false,
        }
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_ident_char(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

enum TemplateStop {
    /// Closing backtick consumed.
    Closed(usize),
    /// `${` consumed.
    Substitution(usize),
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
}

fn find_import_declarations(src: &str) -> Vec<ImportDeclaration> {
    Scanner {
        src,
        bytes: src.as_bytes(),
    }
    .scan()
}

impl<'a> Scanner<'a> {
    fn at(&self, pos: usize) -> Option<u8> {
        self.bytes.get(pos).copied()
    }

    fn scan(&self) -> Vec<ImportDeclaration> {
        let mut found = Vec::new();
        let mut pos = 0;
        let mut depth = 0usize;
        // Depths at which a template substitution `${` was opened.
        let mut templates: Vec<usize> = Vec::new();
        let mut prev = Prev::Start;

        if self.src.starts_with("#!") {
            pos = self.skip_line(pos);
        }

        while let Some(b) = self.at(pos) {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c => pos += 1,
                b'/' if self.at(pos + 1) == Some(b'/') => pos = self.skip_line(pos),
                b'/' if self.at(pos + 1) == Some(b'*') => pos = self.skip_block_comment(pos),
                b'/' if prev.allows_regex() => {
                    pos = self.skip_regex(pos);
                    prev = Prev::Value;
                }
                b'\'' | b'"' => {
                    pos = self.skip_string(pos);
                    prev = Prev::Value;
                }
                b'`' => match self.scan_template(pos + 1) {
                    TemplateStop::Closed(next) => {
                        pos = next;
                        prev = Prev::Value;
                    }
                    TemplateStop::Substitution(next) => {
                        templates.push(depth);
                        depth += 1;
                        pos = next;
                        prev = Prev::Punct(b'{');
                    }
                },
                b'{' | b'(' | b'[' => {
                    depth += 1;
                    pos += 1;
                    prev = Prev::Punct(b);
                }
                b'}' if depth > 0 && templates.last() == Some(&(depth - 1)) => {
                    templates.pop();
                    depth -= 1;
                    match self.scan_template(pos + 1) {
                        TemplateStop::Closed(next) => {
                            pos = next;
                            prev = Prev::Value;
                        }
                        TemplateStop::Substitution(next) => {
                            templates.push(depth);
                            depth += 1;
                            pos = next;
                            prev = Prev::Punct(b'{');
                        }
                    }
                }
                b'}' => {
                    depth = depth.saturating_sub(1);
                    pos += 1;
                    prev = Prev::Punct(b);
                }
                b')' | b']' => {
                    depth = depth.saturating_sub(1);
                    pos += 1;
                    prev = Prev::Value;
                }
                b'0'..=b'9' => {
                    pos = self.skip_number(pos);
                    prev = Prev::Value;
                }
                b if is_ident_start(b) => {
                    let end = self.ident_end(pos);
                    let word = &self.src[pos..end];
                    if word == "import" && depth == 0 && prev != Prev::Punct(b'.') {
                        if let Some(declaration) = self.parse_declaration(pos, end) {
                            pos = declaration.end;
                            prev = Prev::Punct(b';');
                            found.push(declaration);
                            continue;
                        }
                    }
                    pos = end;
                    prev = Prev::Word(word);
                }
                _ => {
                    pos += 1;
                    prev = Prev::Punct(b);
                }
            }
        }

        found
    }

    fn skip_line(&self, mut pos: usize) -> usize {
        while let Some(b) = self.at(pos) {
            if b == b'\n' {
                break;
            }
            pos += 1;
        }
        pos
    }

    fn skip_block_comment(&self, pos: usize) -> usize {
        match self.src[pos + 2..].find("*/") {
            Some(offset) => pos + 2 + offset + 2,
            None => self.bytes.len(),
        }
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&self, mut pos: usize) -> usize {
        loop {
            match self.at(pos) {
                Some(b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c) => pos += 1,
                Some(b'/') if self.at(pos + 1) == Some(b'/') => pos = self.skip_line(pos),
                Some(b'/') if self.at(pos + 1) == Some(b'*') => pos = self.skip_block_comment(pos),
                _ => return pos,
            }
        }
    }

    fn skip_string(&self, pos: usize) -> usize {
        let quote = self.bytes[pos];
        let mut pos = pos + 1;
        while let Some(b) = self.at(pos) {
            match b {
                b'\\' => pos += 2,
                b'\n' => return pos,
                _ if b == quote => return pos + 1,
                _ => pos += 1,
            }
        }
        pos.min(self.bytes.len())
    }

    fn scan_template(&self, mut pos: usize) -> TemplateStop {
        while let Some(b) = self.at(pos) {
            match b {
                b'\\' => pos += 2,
                b'`' => return TemplateStop::Closed(pos + 1),
                b'$' if self.at(pos + 1) == Some(b'{') => return TemplateStop::Substitution(pos + 2),
                _ => pos += 1,
            }
        }
        TemplateStop::Closed(self.bytes.len())
    }

    fn skip_regex(&self, pos: usize) -> usize {
        let mut pos = pos + 1;
        let mut in_class = false;
        while let Some(b) = self.at(pos) {
            match b {
                b'\\' => pos += 2,
                b'\n' => return pos,
                b'[' => {
                    in_class = true;
                    pos += 1;
                }
                b']' => {
                    in_class = false;
                    pos += 1;
                }
                b'/' if !in_class => {
                    return self.ident_end(pos + 1);
                }
                _ => pos += 1,
            }
        }
        pos.min(self.bytes.len())
    }

    fn skip_number(&self, mut pos: usize) -> usize {
        while let Some(b) = self.at(pos) {
            if is_ident_char(b) || b == b'.' {
                pos += 1;
            } else {
                break;
            }
        }
        pos
    }

    fn ident_end(&self, mut pos: usize) -> usize {
        while self.at(pos).is_some_and(is_ident_char) {
            pos += 1;
        }
        pos
    }

    fn read_ident(&self, pos: usize) -> Option<(&'a str, usize)> {
        if !self.at(pos).is_some_and(is_ident_start) {
            return None;
        }
        let end = self.ident_end(pos);
        Some((&self.src[pos..end], end))
    }

    fn read_string(&self, pos: usize) -> Option<(&'a str, usize)> {
        let quote = self.at(pos).filter(|b| *b == b'\'' || *b == b'"')?;
        let end = self.skip_string(pos);
        if end < pos + 2 || self.bytes[end - 1] != quote {
            return None;
        }
        Some((&self.src[pos + 1..end - 1], end))
    }

    fn expect_word(&self, pos: usize, expected: &str) -> Option<usize> {
        let (word, end) = self.read_ident(pos)?;
        (word == expected).then_some(end)
    }

    /// Parse an import declaration whose `import` keyword spans `start..keyword_end`.
    ///
    /// Returns `None` for `import(...)`, `import.meta` and anything that is
    /// not a well-formed static declaration.
    fn parse_declaration(&self, start: usize, keyword_end: usize) -> Option<ImportDeclaration> {
        let mut pos = self.skip_trivia(keyword_end);
        let mut bindings = Vec::new();

        if let Some((import_path, end)) = self.read_string(pos) {
            return Some(ImportDeclaration {
                start,
                end: self.declaration_end(end),
                import_path: import_path.to_string(),
                bindings,
            });
        }

        if let Some((default_name, end)) = self.read_ident(pos) {
            bindings.push(Binding {
                export_name: "default".to_string(),
                local_name: default_name.to_string(),
            });
            pos = self.skip_trivia(end);
            if self.at(pos) == Some(b',') {
                pos = self.skip_trivia(pos + 1);
            }
        }

        match self.at(pos) {
            Some(b'*') => {
                pos = self.skip_trivia(pos + 1);
                pos = self.skip_trivia(self.expect_word(pos, "as")?);
                let (local_name, end) = self.read_ident(pos)?;
                bindings.push(Binding {
                    export_name: "*".to_string(),
                    local_name: local_name.to_string(),
                });
                pos = self.skip_trivia(end);
            }
            Some(b'{') => {
                pos = self.parse_named_imports(pos + 1, &mut bindings)?;
                pos = self.skip_trivia(pos);
            }
            _ => {}
        }

        if bindings.is_empty() {
            return None;
        }

        pos = self.skip_trivia(self.expect_word(pos, "from")?);
        let (import_path, end) = self.read_string(pos)?;

        Some(ImportDeclaration {
            start,
            end: self.declaration_end(end),
            import_path: import_path.to_string(),
            bindings,
        })
    }

    /// Parse `a, b as c, "x y" as d }` and return the position after `}`.
    fn parse_named_imports(&self, mut pos: usize, bindings: &mut Vec<Binding>) -> Option<usize> {
        loop {
            pos = self.skip_trivia(pos);
            if self.at(pos) == Some(b'}') {
                return Some(pos + 1);
            }

            let (export_name, is_string, end) = match self.read_string(pos) {
                Some((name, end)) => (name, true, end),
                None => {
                    let (name, end) = self.read_ident(pos)?;
                    (name, false, end)
                }
            };
            pos = self.skip_trivia(end);

            let local_name = match self.expect_word(pos, "as") {
                Some(after_as) => {
                    let (local, end) = self.read_ident(self.skip_trivia(after_as))?;
                    pos = self.skip_trivia(end);
                    local
                }
                None if is_string => return None,
                None => export_name,
            };
            bindings.push(Binding {
                export_name: export_name.to_string(),
                local_name: local_name.to_string(),
            });

            match self.at(pos) {
                Some(b',') => pos += 1,
                Some(b'}') => return Some(pos + 1),
                _ => return None,
            }
        }
    }

    /// Consume import attributes and the terminating semicolon, if any.
    fn declaration_end(&self, after_source: usize) -> usize {
        let mut pos = self.skip_trivia(after_source);

        let attributes = self
            .expect_word(pos, "with")
            .or_else(|| self.expect_word(pos, "assert"));
        if let Some(after_keyword) = attributes {
            let open = self.skip_trivia(after_keyword);
            if self.at(open) == Some(b'{') {
                match self.src[open..].find('}') {
                    Some(offset) => pos = self.skip_trivia(open + offset + 1),
                    None => return after_source,
                }
            }
        }

        if self.at(pos) == Some(b';') {
            pos + 1
        } else if attributes.is_some() {
            pos
        } else {
            after_source
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_import() {
        let code = "import Layout from \"./Layout\";\nexport default { Layout };\n";
        assert_eq!(
            rewrite_imports(code),
            "const Layout = \"import:./Layout:default\";\nexport default { Layout };\n"
        );
    }

    #[test]
    fn test_named_and_renamed_imports() {
        let code = "import { onRenderClient, title as pageTitle } from './renderer';";
        assert_eq!(
            rewrite_imports(code),
            "const onRenderClient = \"import:./renderer:onRenderClient\"; const pageTitle = \"import:./renderer:title\";"
        );
    }

    #[test]
    fn test_namespace_with_default() {
        assert_eq!(
            rewrite_imports("import React, * as all from \"react\"\nfoo()"),
            "const React = \"import:react:default\"; const all = \"import:react:*\";\nfoo()"
        );
    }

    #[test]
    fn test_multiline_import() {
        let code = "import {\n  a,\n  b as c,\n} from \"./x\";\nexport { a, c };";
        assert_eq!(
            rewrite_imports(code),
            "const a = \"import:./x:a\"; const c = \"import:./x:b\";\nexport { a, c };"
        );
    }

    #[test]
    fn test_side_effect_import_is_removed() {
        assert_eq!(
            rewrite_imports("import './style.css';\nexport const x = 1;"),
            "\nexport const x = 1;"
        );
    }

    #[test]
    fn test_dynamic_import_and_meta_untouched() {
        let code = "const m = import('./lazy');\nconst u = import.meta.url;\n";
        assert_eq!(rewrite_imports(code), code);
    }

    #[test]
    fn test_strings_comments_and_templates_untouched() {
        let code = concat!(
            "// import a from 'a'\n",
            "/* import b from 'b' */\n",
            "const s = \"import c from 'c'\";\n",
            "const t = `${x} import d from 'd' ${`import e from 'e'`}`;\n",
            "const r = /import f from 'f'/g;\n",
        );
        assert_eq!(rewrite_imports(code), code);
    }

    #[test]
    fn test_nested_import_word_untouched() {
        let code = "const o = { import: 1 };\nfoo.import;\n";
        assert_eq!(rewrite_imports(code), code);
    }

    #[test]
    fn test_import_attributes_consumed() {
        let code = "import data from \"./data.json\" with { type: \"json\" };\nexport default data;";
        assert_eq!(
            rewrite_imports(code),
            "const data = \"import:./data.json:default\";\nexport default data;"
        );
    }

    #[test]
    fn test_import_after_template_substitution() {
        let code = "const a = `${b}`;\nimport c from \"./c\";\n";
        assert_eq!(
            rewrite_imports(code),
            "const a = `${b}`;\nconst c = \"import:./c:default\";\n"
        );
    }

    #[test]
    fn test_string_export_name() {
        let code = "import { \"my-name\" as myName } from \"./m\";";
        assert_eq!(rewrite_imports(code), "const myName = \"import:./m:my-name\";");
    }

    #[test]
    fn test_inline_source_map_preserved() {
        let code = "import x from \"./x\";\nexport default x;\n//# sourceMappingURL=data:application/json;base64,AAAA\n";
        let rewritten = rewrite_imports(code);
        assert!(rewritten.ends_with("//# sourceMappingURL=data:application/json;base64,AAAA\n"));
    }

    #[test]
    fn test_parse_import_string() {
        assert_eq!(parse_import_string("import:./renderer:onRenderClient"), Some(("./renderer", "onRenderClient")));
        assert_eq!(parse_import_string("import:node:fs:readFile"), Some(("node:fs", "readFile")));
        assert_eq!(parse_import_string("./renderer:x"), None);
        assert_eq!(parse_import_string("import:nocolon"), None);
    }

    #[test]
    fn test_import_string_round_trips_through_parse() {
        let value = import_string("@org/ui/Layout", "default");
        assert_eq!(parse_import_string(&value), Some(("@org/ui/Layout", "default")));
    }
}
