//! Error-tolerant recursive-descent parser
//!
//! Every loop either consumes a token or stops, so parsing terminates on
//! any input. Constructs that are not understood become `Unknown` nodes and
//! an error is recorded.

use super::lexer::{tokenize, Token, TokenKind};
use super::span::Span;
use super::tree::{Name, NodeId, SyntaxKind, SyntaxTree, TreeBuilder};
use super::ParseError;

/// Result of parsing: always a tree, plus whatever went wrong on the way
pub struct Parsed {
    pub tree: SyntaxTree,
    pub errors: Vec<ParseError>,
}

/// Parse TypeScript/JavaScript source text
pub fn parse(source: &str) -> Parsed {
    let (tokens, lex_errors) = tokenize(source);
    let mut parser = Parser::new(source, tokens);
    parser.errors.extend(lex_errors);
    let root = parser.parse_source_file();
    let Parser {
        builder, errors, ..
    } = parser;
    Parsed {
        tree: builder.finish(source.to_string(), root),
        errors,
    }
}

const ASSIGNMENT_OPERATORS: &[&str] = &[
    "=", "+=", "-=", "*=", "/=", "%=", "**=", "<<=", ">>=", ">>>=", "&=", "|=", "^=", "&&=",
    "||=", "??=",
];

const MEMBER_MODIFIERS: &[&str] = &[
    "public", "private", "protected", "readonly", "static", "abstract", "override", "declare",
    "async", "accessor",
];

const ACCESSIBILITY_MODIFIERS: &[&str] = &["public", "private", "protected", "readonly", "override"];

/// Tokens that end an `as` type inside an expression
const AS_TYPE_STOPS: &[&str] = &[
    ")", "]", "}", ",", ";", "=", "==", "===", "!=", "!==", "&&", "||", "??", "?", ":", "=>",
];

/// Statement and expression nesting beyond this is skipped, not parsed
const MAX_NESTING_DEPTH: usize = 256;

/// Lookahead bound when deciding whether `<` opens type arguments
const MAX_TYPE_ARGUMENT_TOKENS: usize = 64;

/// Tokens after which a type continues onto the next line
const TYPE_CONTINUATIONS: &[&str] = &[
    "|", "&", "=>", ",", ":", "<", ".", "?", "extends", "keyof", "typeof", "=", "(", "[", "{",
];

fn binary_precedence(op: &str) -> Option<u8> {
    let prec = match op {
        "??" => 1,
        "||" => 2,
        "&&" => 3,
        "|" => 4,
        "^" => 5,
        "&" => 6,
        "==" | "!=" | "===" | "!==" => 7,
        "<" | ">" | "<=" | ">=" | "instanceof" | "in" | "as" | "satisfies" => 8,
        "<<" | ">>" | ">>>" => 9,
        "+" | "-" => 10,
        "*" | "/" | "%" => 11,
        "**" => 12,
        _ => return None,
    };
    Some(prec)
}

struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    builder: TreeBuilder,
    errors: Vec<ParseError>,
    depth: usize,
}

impl<'src> Parser<'src> {
    fn new(source: &'src str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            builder: TreeBuilder::default(),
            errors: Vec::new(),
            depth: 0,
        }
    }

    // ── Token cursor ─────────────────────────────────────────────────────

    fn current(&self) -> Token {
        self.nth(0)
    }

    fn nth(&self, n: usize) -> Token {
        let last = self.tokens.len() - 1;
        self.tokens[(self.pos + n).min(last)]
    }

    fn token_text(&self, token: Token) -> &'src str {
        &self.source[token.span.start..token.span.end]
    }

    fn text(&self) -> &'src str {
        self.token_text(self.current())
    }

    fn nth_text(&self, n: usize) -> &'src str {
        self.token_text(self.nth(n))
    }

    fn is_eof(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    /// Current token is the punctuator `p`
    fn at(&self, p: &str) -> bool {
        let token = self.current();
        token.kind == TokenKind::Punct && self.token_text(token) == p
    }

    fn nth_at(&self, n: usize, p: &str) -> bool {
        let token = self.nth(n);
        token.kind == TokenKind::Punct && self.token_text(token) == p
    }

    /// Current token is the word `w`
    fn at_word(&self, w: &str) -> bool {
        let token = self.current();
        token.kind == TokenKind::Word && self.token_text(token) == w
    }

    fn nth_is_word(&self, n: usize) -> bool {
        self.nth(n).kind == TokenKind::Word
    }

    fn bump(&mut self) -> Token {
        let token = self.current();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, p: &str) -> bool {
        if self.at(p) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, p: &str) {
        if !self.eat(p) {
            self.error_here(format!("'{}'", p));
        }
    }

    fn error_here(&mut self, expected: String) {
        let token = self.current();
        let found = match token.kind {
            TokenKind::Eof => "end of file".to_string(),
            _ => self.token_text(token).to_string(),
        };
        self.errors.push(ParseError::Expected {
            expected,
            found,
            span: token.span,
        });
    }

    /// End offset of the last consumed token
    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn start(&self) -> usize {
        self.current().span.start
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.prev_end().max(start))
    }

    fn consume_semicolon(&mut self) {
        self.eat(";");
    }

    fn node(&mut self, kind: SyntaxKind, start: usize, children: Vec<NodeId>) -> NodeId {
        let span = self.span_from(start);
        self.builder.alloc(kind, span, children)
    }

    fn named(
        &mut self,
        kind: SyntaxKind,
        start: usize,
        name: Option<Name>,
        children: Vec<NodeId>,
    ) -> NodeId {
        let id = self.node(kind, start, children);
        if let Some(name) = name {
            self.builder.set_name(id, name);
        }
        id
    }

    fn annotate(&mut self, id: NodeId, type_annotation: Option<String>) {
        if let Some(text) = type_annotation {
            self.builder.set_type_annotation(id, text);
        }
    }

    /// Consume a word token as a name
    fn take_name(&mut self) -> Name {
        let token = self.bump();
        Name::new(self.token_text(token), token.span)
    }

    // ── Skipping ─────────────────────────────────────────────────────────

    /// At an opening bracket: consume through its matching close
    fn skip_balanced(&mut self) {
        let mut depth = 0usize;
        loop {
            if self.is_eof() {
                return;
            }
            match self.text() {
                "(" | "[" | "{" if self.current().kind == TokenKind::Punct => depth += 1,
                ")" | "]" | "}" if self.current().kind == TokenKind::Punct => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.bump();
                        return;
                    }
                }
                _ => {}
            }
            self.bump();
        }
    }

    /// Run `parse` one nesting level deeper. Past the limit the rest of the
    /// enclosing bracket is skipped and becomes a single `Unknown` node.
    fn nested(&mut self, parse: impl FnOnce(&mut Self) -> NodeId) -> NodeId {
        if self.depth >= MAX_NESTING_DEPTH {
            return self.skip_too_deep();
        }
        self.depth += 1;
        let id = parse(self);
        self.depth -= 1;
        id
    }

    fn skip_too_deep(&mut self) -> NodeId {
        let start = self.start();
        self.errors.push(ParseError::TooDeep {
            limit: MAX_NESTING_DEPTH,
            span: self.current().span,
        });
        let mut depth = 0usize;
        while !self.is_eof() {
            let token = self.current();
            match token.kind {
                TokenKind::Punct => match self.text() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => {
                        if depth == 0 {
                            break;
                        }
                        depth -= 1;
                    }
                    _ => {}
                },
                TokenKind::TemplateHead => depth += 1,
                TokenKind::TemplateMiddle if depth == 0 => break,
                TokenKind::TemplateTail => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.bump();
        }
        self.node(SyntaxKind::Unknown, start, vec![])
    }

    /// At `<`: consume a type argument/parameter list through its `>`
    fn skip_angle_brackets(&mut self) {
        let mut depth = 0i32;
        loop {
            if self.is_eof() {
                return;
            }
            match self.text() {
                "<" => depth += 1,
                ">" => depth -= 1,
                ">>" => depth -= 2,
                ">>>" => depth -= 3,
                "(" | "[" | "{" => {
                    self.skip_balanced();
                    continue;
                }
                ";" | ")" | "]" | "}" => return,
                _ => {}
            }
            self.bump();
            if depth <= 0 {
                return;
            }
        }
    }

    /// Consume a type expression and return its source text.
    ///
    /// Stops before any of `stops` at bracket depth zero, before an
    /// unmatched closing bracket, or at a line break that cannot continue
    /// the type.
    fn parse_type(&mut self, stops: &[&str]) -> Option<String> {
        let start = self.start();
        let begin = self.pos;
        let mut depth = 0i32;
        loop {
            if self.is_eof() {
                break;
            }
            let token = self.current();
            let text = self.text();
            let is_punct = token.kind == TokenKind::Punct;

            if depth == 0 {
                if is_punct && stops.contains(&text) {
                    // An object type literal may open a return type
                    if !(text == "{" && self.pos == begin) {
                        break;
                    }
                }
                if stops.contains(&text) && token.kind == TokenKind::Word {
                    break;
                }
                if self.pos > begin && token.newline_before {
                    let prev = self.token_text(self.tokens[self.pos - 1]);
                    let continues = TYPE_CONTINUATIONS.contains(&prev)
                        || matches!(text, "|" | "&" | "=>" | "." | "?" | "extends" | "[");
                    if !continues {
                        break;
                    }
                }
            }

            if is_punct {
                match text {
                    "(" | "[" | "{" | "<" => depth += 1,
                    ")" | "]" | "}" | ">" => {
                        if depth == 0 {
                            break;
                        }
                        depth -= 1;
                    }
                    ">>" | ">>>" => {
                        let n = text.len() as i32;
                        if depth < n {
                            break;
                        }
                        depth -= n;
                    }
                    _ => {}
                }
            }
            self.bump();
        }
        if self.pos == begin {
            return None;
        }
        let text = self.source[start..self.prev_end()].trim().to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Optional `: Type` annotation
    fn parse_annotation(&mut self, stops: &[&str]) -> Option<String> {
        if self.eat(":") {
            self.parse_type(stops)
        } else {
            None
        }
    }

    // ── Statements ───────────────────────────────────────────────────────

    fn parse_source_file(&mut self) -> NodeId {
        let mut statements = Vec::new();
        while !self.is_eof() {
            let before = self.pos;
            statements.push(self.parse_statement());
            if self.pos == before {
                self.error_here("statement".to_string());
                self.bump();
            }
        }
        let span = Span::new(0, self.source.len());
        self.builder.alloc(SyntaxKind::SourceFile, span, statements)
    }

    fn parse_statement(&mut self) -> NodeId {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> NodeId {
        let start = self.start();
        let token = self.current();

        if token.kind == TokenKind::Punct {
            match self.text() {
                "{" => return self.parse_block(),
                ";" => {
                    self.bump();
                    return self.node(SyntaxKind::EmptyStatement, start, vec![]);
                }
                "@" => return self.parse_decorated_statement(),
                _ => {}
            }
        }

        if token.kind == TokenKind::Word {
            let next_is_word = self.nth_is_word(1);
            match self.text() {
                "import" if !self.nth_at(1, "(") && !self.nth_at(1, ".") => {
                    return self.parse_import();
                }
                "export" => return self.parse_export(),
                "declare" if next_is_word => {
                    self.bump();
                    return self.parse_statement();
                }
                "namespace" | "module"
                    if !self.nth(1).newline_before
                        && matches!(self.nth(1).kind, TokenKind::Word | TokenKind::String) =>
                {
                    return self.parse_namespace();
                }
                "const" if self.nth_text(1) == "enum" => {
                    self.bump();
                    return self.parse_enum();
                }
                "enum" if next_is_word => return self.parse_enum(),
                "const" | "let" | "var" if next_is_word || self.nth_at(1, "{") || self.nth_at(1, "[") => {
                    let stmt = self.parse_variable_statement();
                    self.consume_semicolon();
                    return stmt;
                }
                "function" => return self.parse_function(SyntaxKind::FunctionDeclaration),
                "async" if self.nth_text(1) == "function" && !self.nth(1).newline_before => {
                    self.bump();
                    return self.parse_function(SyntaxKind::FunctionDeclaration);
                }
                "class" => return self.parse_class(Vec::new()),
                "abstract" if self.nth_text(1) == "class" => {
                    self.bump();
                    return self.parse_class(Vec::new());
                }
                "interface" if next_is_word => return self.parse_interface(),
                "type" if next_is_word && !self.nth(1).newline_before => {
                    return self.parse_type_alias();
                }
                "return" => return self.parse_return(),
                "if" => return self.parse_if(),
                "for" => return self.parse_for(),
                "while" => return self.parse_while(),
                "do" => return self.parse_do_while(),
                "switch" => return self.parse_switch(),
                "try" => return self.parse_try(),
                "throw" => {
                    self.bump();
                    let expr = self.parse_expression();
                    self.consume_semicolon();
                    return self.node(SyntaxKind::ThrowStatement, start, vec![expr]);
                }
                "break" | "continue" | "debugger" => {
                    self.bump();
                    if self.current().kind == TokenKind::Word && !self.current().newline_before {
                        self.bump();
                    }
                    self.consume_semicolon();
                    return self.node(SyntaxKind::JumpStatement, start, vec![]);
                }
                _ if self.nth_at(1, ":") => {
                    // Labeled statement
                    self.bump();
                    self.bump();
                    return self.parse_statement();
                }
                _ => {}
            }
        }

        let expr = self.parse_expression();
        self.consume_semicolon();
        self.node(SyntaxKind::ExpressionStatement, start, vec![expr])
    }

    fn parse_block(&mut self) -> NodeId {
        let start = self.start();
        self.expect("{");
        let statements = self.parse_statements_until_brace();
        self.expect("}");
        self.node(SyntaxKind::Block, start, statements)
    }

    fn parse_statements_until_brace(&mut self) -> Vec<NodeId> {
        let mut statements = Vec::new();
        while !self.at("}") && !self.is_eof() {
            let before = self.pos;
            statements.push(self.parse_statement());
            if self.pos == before {
                self.error_here("statement".to_string());
                self.bump();
            }
        }
        statements
    }

    fn parse_import(&mut self) -> NodeId {
        let start = self.start();
        self.bump();
        self.skip_module_clause();
        self.node(SyntaxKind::ImportDeclaration, start, vec![])
    }

    /// Skip the rest of an import/export clause up to its module specifier
    /// or terminating semicolon
    fn skip_module_clause(&mut self) {
        let begin = self.pos;
        while !self.is_eof() {
            if self.at(";") {
                self.bump();
                return;
            }
            if self.pos > begin && self.current().newline_before {
                let prev = self.token_text(self.tokens[self.pos - 1]);
                if prev == "}" && !self.at_word("from") {
                    return;
                }
            }
            let token = self.current();
            if token.kind == TokenKind::String {
                let prev = if self.pos == 0 {
                    ""
                } else {
                    self.token_text(self.tokens[self.pos - 1])
                };
                self.bump();
                if prev == "from" || prev == "import" || prev == "export" {
                    self.consume_semicolon();
                    return;
                }
                continue;
            }
            if self.at("{") {
                self.skip_balanced();
                continue;
            }
            self.bump();
        }
    }

    fn parse_export(&mut self) -> NodeId {
        let start = self.start();
        self.bump();
        if self.at("{") || self.at("*") || self.at_word("type") && self.nth_at(1, "{") {
            self.skip_module_clause();
            return self.node(SyntaxKind::ImportDeclaration, start, vec![]);
        }
        if self.at("=") {
            self.bump();
            let expr = self.parse_expression();
            self.consume_semicolon();
            return self.node(SyntaxKind::ExpressionStatement, start, vec![expr]);
        }
        self.eat_word("default");
        self.parse_statement()
    }

    fn eat_word(&mut self, w: &str) -> bool {
        if self.at_word(w) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn parse_namespace(&mut self) -> NodeId {
        self.bump();
        while !self.at("{") && !self.at(";") && !self.is_eof() {
            self.bump();
        }
        if self.at("{") {
            self.parse_block()
        } else {
            let start = self.start();
            self.consume_semicolon();
            self.node(SyntaxKind::TypeDeclaration, start, vec![])
        }
    }

    fn parse_enum(&mut self) -> NodeId {
        let start = self.start();
        self.bump();
        let name = if self.current().kind == TokenKind::Word {
            Some(self.take_name())
        } else {
            None
        };
        if self.at("{") {
            self.skip_balanced();
        }
        self.named(SyntaxKind::TypeDeclaration, start, name, vec![])
    }

    fn parse_interface(&mut self) -> NodeId {
        let start = self.start();
        self.bump();
        let name = self.take_name();
        while !self.at("{") && !self.is_eof() {
            if self.at("<") {
                self.skip_angle_brackets();
            } else {
                self.bump();
            }
        }
        self.skip_balanced();
        self.named(SyntaxKind::TypeDeclaration, start, Some(name), vec![])
    }

    fn parse_type_alias(&mut self) -> NodeId {
        let start = self.start();
        self.bump();
        let name = self.take_name();
        if self.at("<") {
            self.skip_angle_brackets();
        }
        self.expect("=");
        let ty = self.parse_type(&[";"]);
        self.consume_semicolon();
        let id = self.named(SyntaxKind::TypeDeclaration, start, Some(name), vec![]);
        self.annotate(id, ty);
        id
    }

    fn parse_variable_statement(&mut self) -> NodeId {
        let start = self.start();
        self.bump();
        let mut declarations = Vec::new();
        loop {
            let decl_start = self.start();
            let name = if self.current().kind == TokenKind::Word {
                Some(self.take_name())
            } else if self.at("{") || self.at("[") {
                // Destructuring pattern
                self.skip_balanced();
                None
            } else {
                self.error_here("variable name".to_string());
                None
            };
            self.eat("!");
            let ty = self.parse_annotation(&["=", ",", ";", ")", "}", "of", "in"]);
            let mut children = Vec::new();
            if self.eat("=") {
                children.push(self.parse_assignment());
            }
            let decl = self.named(SyntaxKind::VariableDeclaration, decl_start, name, children);
            self.annotate(decl, ty);
            declarations.push(decl);
            if !self.eat(",") {
                break;
            }
        }
        self.node(SyntaxKind::VariableStatement, start, declarations)
    }

    fn parse_return(&mut self) -> NodeId {
        let start = self.start();
        self.bump();
        let mut children = Vec::new();
        if !self.at(";") && !self.at("}") && !self.is_eof() && !self.current().newline_before {
            children.push(self.parse_expression());
        }
        self.consume_semicolon();
        self.node(SyntaxKind::ReturnStatement, start, children)
    }

    fn parse_paren_expression(&mut self) -> NodeId {
        self.expect("(");
        let expr = self.parse_expression();
        self.expect(")");
        expr
    }

    fn parse_if(&mut self) -> NodeId {
        let start = self.start();
        self.bump();
        let mut children = vec![self.parse_paren_expression()];
        children.push(self.parse_statement());
        if self.eat_word("else") {
            children.push(self.parse_statement());
        }
        self.node(SyntaxKind::IfStatement, start, children)
    }

    fn parse_for(&mut self) -> NodeId {
        let start = self.start();
        self.bump();
        self.eat_word("await");
        self.expect("(");
        let mut children = Vec::new();
        while !self.at(")") && !self.is_eof() {
            let before = self.pos;
            if self.at(";") || self.at_word("of") || self.at_word("in") {
                self.bump();
            } else if self.at_word("const") || self.at_word("let") || self.at_word("var") {
                children.push(self.parse_variable_statement());
            } else {
                children.push(self.parse_expression());
            }
            if self.pos == before {
                break;
            }
        }
        self.expect(")");
        children.push(self.parse_statement());
        self.node(SyntaxKind::LoopStatement, start, children)
    }

    fn parse_while(&mut self) -> NodeId {
        let start = self.start();
        self.bump();
        let condition = self.parse_paren_expression();
        let body = self.parse_statement();
        self.node(SyntaxKind::LoopStatement, start, vec![condition, body])
    }

    fn parse_do_while(&mut self) -> NodeId {
        let start = self.start();
        self.bump();
        let body = self.parse_statement();
        let mut children = vec![body];
        if self.eat_word("while") {
            children.push(self.parse_paren_expression());
        }
        self.consume_semicolon();
        self.node(SyntaxKind::LoopStatement, start, children)
    }

    fn parse_switch(&mut self) -> NodeId {
        let start = self.start();
        self.bump();
        let mut children = vec![self.parse_paren_expression()];
        self.expect("{");
        while !self.at("}") && !self.is_eof() {
            let clause_start = self.start();
            let mut clause = Vec::new();
            if self.eat_word("case") {
                clause.push(self.parse_expression());
            } else if !self.eat_word("default") {
                self.error_here("'case' or 'default'".to_string());
                self.bump();
                continue;
            }
            self.expect(":");
            while !self.at("}") && !self.at_word("case") && !self.at_word("default") && !self.is_eof()
            {
                let before = self.pos;
                clause.push(self.parse_statement());
                if self.pos == before {
                    self.bump();
                }
            }
            children.push(self.node(SyntaxKind::CaseClause, clause_start, clause));
        }
        self.expect("}");
        self.node(SyntaxKind::SwitchStatement, start, children)
    }

    fn parse_try(&mut self) -> NodeId {
        let start = self.start();
        self.bump();
        let mut children = vec![self.parse_block()];
        if self.at_word("catch") {
            let catch_start = self.start();
            self.bump();
            let mut clause = Vec::new();
            if self.eat("(") {
                let param_start = self.start();
                let name = if self.current().kind == TokenKind::Word {
                    Some(self.take_name())
                } else {
                    self.skip_balanced();
                    None
                };
                let ty = self.parse_annotation(&[")"]);
                let param = self.named(SyntaxKind::Parameter, param_start, name, vec![]);
                self.annotate(param, ty);
                clause.push(param);
                self.expect(")");
            }
            clause.push(self.parse_block());
            children.push(self.node(SyntaxKind::CatchClause, catch_start, clause));
        }
        if self.eat_word("finally") {
            children.push(self.parse_block());
        }
        self.node(SyntaxKind::TryStatement, start, children)
    }

    fn parse_decorators(&mut self) -> Vec<NodeId> {
        let mut decorators = Vec::new();
        while self.at("@") {
            let start = self.start();
            self.bump();
            let expr = self.parse_call_member();
            decorators.push(self.node(SyntaxKind::Decorator, start, vec![expr]));
        }
        decorators
    }

    fn parse_decorated_statement(&mut self) -> NodeId {
        let start = self.start();
        let decorators = self.parse_decorators();
        self.eat_word("export");
        self.eat_word("default");
        self.eat_word("abstract");
        if self.at_word("class") {
            return self.parse_class(decorators);
        }
        let mut children = decorators;
        children.push(self.parse_statement());
        self.node(SyntaxKind::Unknown, start, children)
    }

    // ── Functions and classes ────────────────────────────────────────────

    /// `function [*] [name] [<T>] (params) [: R] { body }`
    fn parse_function(&mut self, kind: SyntaxKind) -> NodeId {
        let start = self.start();
        self.bump();
        self.eat("*");
        let name = if self.current().kind == TokenKind::Word {
            Some(self.take_name())
        } else {
            None
        };
        if self.at("<") {
            self.skip_angle_brackets();
        }
        let mut children = self.parse_parameters();
        let return_type = self.parse_annotation(&["{", ";"]);
        if self.at("{") {
            children.push(self.parse_block());
        } else {
            self.consume_semicolon();
        }
        let id = self.named(kind, start, name, children);
        self.annotate(id, return_type);
        id
    }

    fn parse_parameters(&mut self) -> Vec<NodeId> {
        let mut params = Vec::new();
        if !self.eat("(") {
            self.error_here("'('".to_string());
            return params;
        }
        while !self.at(")") && !self.is_eof() {
            let before = self.pos;
            params.push(self.parse_parameter());
            if !self.eat(",") {
                break;
            }
            if self.pos == before {
                break;
            }
        }
        self.expect(")");
        params
    }

    fn parse_parameter(&mut self) -> NodeId {
        let start = self.start();
        let mut children = self.parse_decorators();
        let mut is_property = false;
        while ACCESSIBILITY_MODIFIERS.contains(&self.text())
            && self.current().kind == TokenKind::Word
            && (self.nth_is_word(1) || self.nth_at(1, "{") || self.nth_at(1, "["))
        {
            is_property = true;
            self.bump();
        }
        self.eat("...");
        let name = if self.current().kind == TokenKind::Word {
            Some(self.take_name())
        } else if self.at("{") || self.at("[") {
            self.skip_balanced();
            None
        } else {
            self.error_here("parameter name".to_string());
            if !self.at(")") {
                self.bump();
            }
            None
        };
        self.eat("?");
        let ty = self.parse_annotation(&[",", ")", "="]);
        if self.eat("=") {
            children.push(self.parse_assignment());
        }
        let kind = if is_property {
            SyntaxKind::ParameterProperty
        } else {
            SyntaxKind::Parameter
        };
        let id = self.named(kind, start, name, children);
        self.annotate(id, ty);
        id
    }

    fn parse_class(&mut self, decorators: Vec<NodeId>) -> NodeId {
        let start = self.start();
        self.bump();
        let name = if self.current().kind == TokenKind::Word
            && !self.at_word("extends")
            && !self.at_word("implements")
        {
            Some(self.take_name())
        } else {
            None
        };
        if self.at("<") {
            self.skip_angle_brackets();
        }
        let mut children = decorators;
        if self.eat_word("extends") {
            children.push(self.parse_call_member());
            if self.at("<") {
                self.skip_angle_brackets();
            }
        }
        if self.eat_word("implements") {
            self.parse_type(&["{"]);
        }
        self.expect("{");
        while !self.at("}") && !self.is_eof() {
            let before = self.pos;
            if self.eat(";") {
                continue;
            }
            children.extend(self.parse_class_member());
            if self.pos == before {
                self.error_here("class member".to_string());
                self.bump();
            }
        }
        self.expect("}");
        self.named(SyntaxKind::ClassDeclaration, start, name, children)
    }

    /// Next token can name a member, so a preceding word is a modifier
    fn nth_starts_member_name(&self, n: usize) -> bool {
        let token = self.nth(n);
        match token.kind {
            TokenKind::Word | TokenKind::String | TokenKind::Number => true,
            TokenKind::Punct => matches!(self.token_text(token), "[" | "*" | "{"),
            _ => false,
        }
    }

    fn parse_member_name(&mut self) -> Option<Name> {
        let token = self.current();
        match token.kind {
            TokenKind::Word | TokenKind::String | TokenKind::Number => {
                self.bump();
                let text = self.token_text(token).trim_matches(|c| c == '"' || c == '\'');
                Some(Name::new(text, token.span))
            }
            TokenKind::Punct if self.at("[") => {
                let start = self.start();
                self.skip_balanced();
                let span = self.span_from(start);
                Some(Name::new(&self.source[span.start..span.end], span))
            }
            _ => {
                self.error_here("member name".to_string());
                None
            }
        }
    }

    fn parse_class_member(&mut self) -> Vec<NodeId> {
        let mut nodes = self.parse_decorators();
        let start = self.start();

        if self.at_word("static") && self.nth_at(1, "{") {
            self.bump();
            nodes.push(self.parse_block());
            return nodes;
        }

        while self.current().kind == TokenKind::Word
            && MEMBER_MODIFIERS.contains(&self.text())
            && self.nth_starts_member_name(1)
            && !self.nth(1).newline_before
        {
            self.bump();
        }

        let mut kind = SyntaxKind::MethodDeclaration;
        if (self.at_word("get") || self.at_word("set")) && self.nth_starts_member_name(1) {
            if self.at_word("get") {
                kind = SyntaxKind::GetAccessor;
            }
            self.bump();
        }
        self.eat("*");

        if self.at_word("constructor") && self.nth_at(1, "(") {
            self.bump();
            let mut children = self.parse_parameters();
            if self.at("{") {
                children.push(self.parse_block());
            } else {
                self.consume_semicolon();
            }
            nodes.push(self.node(SyntaxKind::Constructor, start, children));
            return nodes;
        }

        let name = self.parse_member_name();
        self.eat("?");
        self.eat("!");

        if self.at("(") || self.at("<") {
            if self.at("<") {
                self.skip_angle_brackets();
            }
            let mut children = self.parse_parameters();
            let return_type = self.parse_annotation(&["{", ";", "}"]);
            if self.at("{") {
                children.push(self.parse_block());
            } else {
                self.consume_semicolon();
            }
            let id = self.named(kind, start, name, children);
            self.annotate(id, return_type);
            nodes.push(id);
            return nodes;
        }

        let ty = self.parse_annotation(&["=", ";", "}"]);
        let mut children = Vec::new();
        if self.eat("=") {
            children.push(self.parse_assignment());
        }
        self.consume_semicolon();
        let id = self.named(SyntaxKind::PropertyDeclaration, start, name, children);
        self.annotate(id, ty);
        nodes.push(id);
        nodes
    }

    // ── Expressions ──────────────────────────────────────────────────────

    fn parse_expression(&mut self) -> NodeId {
        let start = self.start();
        let first = self.parse_assignment();
        if !self.at(",") {
            return first;
        }
        let mut items = vec![first];
        while self.eat(",") {
            items.push(self.parse_assignment());
        }
        self.node(SyntaxKind::Binary, start, items)
    }

    fn parse_assignment(&mut self) -> NodeId {
        self.nested(Self::parse_assignment_inner)
    }

    fn parse_assignment_inner(&mut self) -> NodeId {
        let start = self.start();
        if self.at_word("yield") {
            self.bump();
            self.eat("*");
            let mut children = Vec::new();
            if !self.at(")") && !self.at("]") && !self.at("}") && !self.at(",") && !self.at(";")
                && !self.current().newline_before
            {
                children.push(self.parse_assignment());
            }
            return self.node(SyntaxKind::Unary, start, children);
        }
        let target = self.parse_conditional();
        let token = self.current();
        if token.kind == TokenKind::Punct && ASSIGNMENT_OPERATORS.contains(&self.text()) {
            self.bump();
            let value = self.parse_assignment();
            return self.node(SyntaxKind::Assignment, start, vec![target, value]);
        }
        target
    }

    fn parse_conditional(&mut self) -> NodeId {
        let start = self.start();
        let condition = self.parse_binary(0);
        if !self.eat("?") {
            return condition;
        }
        let when_true = self.parse_assignment();
        self.expect(":");
        let when_false = self.parse_assignment();
        self.node(
            SyntaxKind::Conditional,
            start,
            vec![condition, when_true, when_false],
        )
    }

    fn parse_binary(&mut self, min_precedence: u8) -> NodeId {
        self.nested(|p| p.parse_binary_inner(min_precedence))
    }

    fn parse_binary_inner(&mut self, min_precedence: u8) -> NodeId {
        let start = self.start();
        let mut left = self.parse_unary();
        loop {
            let token = self.current();
            let op = self.text();
            let is_operator = match token.kind {
                TokenKind::Punct => true,
                TokenKind::Word => {
                    matches!(op, "instanceof" | "in" | "as" | "satisfies")
                        && !(matches!(op, "as" | "satisfies") && token.newline_before)
                }
                _ => false,
            };
            if !is_operator {
                break;
            }
            let Some(precedence) = binary_precedence(op) else {
                break;
            };
            if precedence <= min_precedence && !(op == "**" && precedence == min_precedence) {
                break;
            }
            self.bump();
            if matches!(op, "as" | "satisfies") {
                let ty = if self.at_word("const") {
                    self.bump();
                    None
                } else {
                    self.parse_type(AS_TYPE_STOPS)
                };
                left = self.node(SyntaxKind::AsExpression, start, vec![left]);
                self.annotate(left, ty);
                continue;
            }
            let right = self.parse_binary(precedence);
            left = self.node(SyntaxKind::Binary, start, vec![left, right]);
        }
        left
    }

    fn parse_unary(&mut self) -> NodeId {
        self.nested(Self::parse_unary_inner)
    }

    fn parse_unary_inner(&mut self) -> NodeId {
        let start = self.start();
        let token = self.current();
        let text = self.text();
        let is_prefix = match token.kind {
            TokenKind::Punct => matches!(text, "!" | "-" | "+" | "~" | "++" | "--"),
            TokenKind::Word => {
                matches!(text, "typeof" | "void" | "delete" | "await")
                    && !self.nth_at(1, ")")
                    && !self.nth_at(1, ";")
                    && !self.nth_at(1, ",")
                    && !self.nth_at(1, ".")
                    && !self.nth_at(1, "=")
            }
            _ => false,
        };
        if is_prefix {
            self.bump();
            let operand = self.parse_unary();
            return self.node(SyntaxKind::Unary, start, vec![operand]);
        }
        let expr = self.parse_call_member();
        if (self.at("++") || self.at("--")) && !self.current().newline_before {
            self.bump();
            return self.node(SyntaxKind::Unary, start, vec![expr]);
        }
        expr
    }

    /// Primary expression followed by member accesses, calls and `!`
    fn parse_call_member(&mut self) -> NodeId {
        let start = self.start();
        let mut expr = if self.at_word("new") {
            self.parse_new()
        } else {
            self.parse_primary()
        };
        loop {
            if self.at(".") || self.at("?.") {
                self.bump();
                if self.at("(") {
                    let mut children = vec![expr];
                    children.extend(self.parse_arguments());
                    expr = self.node(SyntaxKind::Call, start, children);
                } else if self.at("[") {
                    expr = self.parse_element_access(start, expr);
                } else if self.current().kind == TokenKind::Word {
                    let name = self.take_name();
                    expr = self.named(SyntaxKind::PropertyAccess, start, Some(name), vec![expr]);
                } else {
                    self.error_here("property name".to_string());
                    break;
                }
            } else if self.at("[") && !self.current().newline_before {
                expr = self.parse_element_access(start, expr);
            } else if self.at("(") {
                let mut children = vec![expr];
                children.extend(self.parse_arguments());
                expr = self.node(SyntaxKind::Call, start, children);
            } else if self.at("<") && self.type_arguments_then_call() {
                self.skip_angle_brackets();
                let mut children = vec![expr];
                children.extend(self.parse_arguments());
                expr = self.node(SyntaxKind::Call, start, children);
            } else if matches!(
                self.current().kind,
                TokenKind::Template | TokenKind::TemplateHead
            ) {
                // Tagged template
                let template = self.parse_primary();
                expr = self.node(SyntaxKind::Call, start, vec![expr, template]);
            } else if self.at("!") && !self.current().newline_before {
                // Non-null assertion
                self.bump();
            } else {
                break;
            }
        }
        expr
    }

    fn parse_element_access(&mut self, start: usize, object: NodeId) -> NodeId {
        self.expect("[");
        let index = self.parse_expression();
        self.expect("]");
        self.node(SyntaxKind::ElementAccess, start, vec![object, index])
    }

    /// `<` opens a type argument list followed by `(`
    fn type_arguments_then_call(&self) -> bool {
        let mut depth = 0i32;
        let mut i = self.pos;
        let limit = (self.pos + MAX_TYPE_ARGUMENT_TOKENS).min(self.tokens.len());
        while i < limit {
            let token = self.tokens[i];
            let text = self.token_text(token);
            match token.kind {
                TokenKind::Word | TokenKind::String | TokenKind::Number => {}
                TokenKind::Punct => match text {
                    "<" => depth += 1,
                    ">" => depth -= 1,
                    ">>" => depth -= 2,
                    ">>>" => depth -= 3,
                    "," | "." | "[" | "]" | "|" | "&" | "{" | "}" | ":" | "?" | "=>"
                    | "(" | ")" => {
                        // Only tolerated while inside the brackets
                        if depth <= 0 {
                            return false;
                        }
                    }
                    _ => return false,
                },
                _ => return false,
            }
            i += 1;
            if depth == 0 {
                return self
                    .tokens
                    .get(i)
                    .is_some_and(|t| t.kind == TokenKind::Punct && self.token_text(*t) == "(");
            }
            if depth < 0 {
                return false;
            }
        }
        false
    }

    fn parse_arguments(&mut self) -> Vec<NodeId> {
        let mut args = Vec::new();
        self.expect("(");
        while !self.at(")") && !self.is_eof() {
            let before = self.pos;
            args.push(self.parse_spread_or_assignment());
            if !self.eat(",") || self.pos == before {
                break;
            }
        }
        self.expect(")");
        args
    }

    fn parse_spread_or_assignment(&mut self) -> NodeId {
        if self.at("...") {
            let start = self.start();
            self.bump();
            let expr = self.parse_assignment();
            return self.node(SyntaxKind::SpreadElement, start, vec![expr]);
        }
        self.parse_assignment()
    }

    /// `new Callee[<T>][(args)]`
    fn parse_new(&mut self) -> NodeId {
        self.nested(Self::parse_new_inner)
    }

    fn parse_new_inner(&mut self) -> NodeId {
        let start = self.start();
        self.bump();
        if self.eat(".") {
            // new.target
            let name = self.take_name();
            return self.named(SyntaxKind::Identifier, start, Some(name), vec![]);
        }
        let callee_start = self.start();
        let mut callee = if self.at_word("new") {
            self.parse_new()
        } else {
            self.parse_primary()
        };
        loop {
            if self.at(".") {
                self.bump();
                if self.current().kind != TokenKind::Word {
                    self.error_here("property name".to_string());
                    break;
                }
                let name = self.take_name();
                callee = self.named(SyntaxKind::PropertyAccess, callee_start, Some(name), vec![callee]);
            } else if self.at("[") {
                callee = self.parse_element_access(callee_start, callee);
            } else {
                break;
            }
        }
        if self.at("<") {
            self.skip_angle_brackets();
        }
        let mut children = vec![callee];
        if self.at("(") {
            children.extend(self.parse_arguments());
        }
        self.node(SyntaxKind::New, start, children)
    }

    fn parse_primary(&mut self) -> NodeId {
        let start = self.start();
        let token = self.current();
        match token.kind {
            TokenKind::Word => self.parse_word_primary(),
            TokenKind::Number | TokenKind::String | TokenKind::Regex => {
                self.bump();
                self.node(SyntaxKind::Literal, start, vec![])
            }
            TokenKind::Template => {
                self.bump();
                self.node(SyntaxKind::TemplateLiteral, start, vec![])
            }
            TokenKind::TemplateHead => self.parse_template(),
            TokenKind::TemplateMiddle | TokenKind::TemplateTail => {
                self.error_here("expression".to_string());
                self.node(SyntaxKind::Unknown, start, vec![])
            }
            TokenKind::Punct => match self.text() {
                "(" => {
                    if self.is_arrow_at(self.pos) {
                        return self.parse_arrow(start);
                    }
                    self.bump();
                    let inner = self.parse_expression();
                    self.expect(")");
                    self.node(SyntaxKind::Parenthesized, start, vec![inner])
                }
                "[" => self.parse_array_literal(),
                "{" => self.parse_object_literal(),
                "<" => {
                    // Generic arrow function `<T>(x: T) => x`
                    self.skip_angle_brackets();
                    if self.at("(") && self.is_arrow_at(self.pos) {
                        return self.parse_arrow(start);
                    }
                    self.error_here("expression".to_string());
                    self.node(SyntaxKind::Unknown, start, vec![])
                }
                ")" | "]" | "}" | ";" => {
                    self.error_here("expression".to_string());
                    self.node(SyntaxKind::Unknown, start, vec![])
                }
                _ => {
                    self.error_here("expression".to_string());
                    self.bump();
                    self.node(SyntaxKind::Unknown, start, vec![])
                }
            },
            TokenKind::Eof => {
                self.error_here("expression".to_string());
                self.node(SyntaxKind::Unknown, start, vec![])
            }
        }
    }

    /// Template with substitutions; each `${...}` becomes a child expression
    fn parse_template(&mut self) -> NodeId {
        let start = self.start();
        self.bump();
        let mut substitutions = Vec::new();
        loop {
            substitutions.push(self.parse_expression());
            match self.current().kind {
                TokenKind::TemplateMiddle => {
                    self.bump();
                }
                TokenKind::TemplateTail => {
                    self.bump();
                    break;
                }
                _ => {
                    self.error_here("'}' closing the template substitution".to_string());
                    break;
                }
            }
        }
        self.node(SyntaxKind::TemplateLiteral, start, substitutions)
    }

    fn parse_word_primary(&mut self) -> NodeId {
        let start = self.start();
        match self.text() {
            "function" => return self.parse_function(SyntaxKind::FunctionExpression),
            "class" => return self.parse_class(Vec::new()),
            "async" if !self.nth(1).newline_before => {
                if self.nth_text(1) == "function" {
                    self.bump();
                    return self.parse_function(SyntaxKind::FunctionExpression);
                }
                if self.nth_is_word(1) && self.nth_at(2, "=>") {
                    self.bump();
                    return self.parse_arrow(start);
                }
                if self.nth_at(1, "(") && self.is_arrow_at(self.pos + 1) {
                    self.bump();
                    return self.parse_arrow(start);
                }
            }
            "this" => {
                self.bump();
                return self.node(SyntaxKind::ThisExpression, start, vec![]);
            }
            "super" => {
                self.bump();
                return self.node(SyntaxKind::SuperExpression, start, vec![]);
            }
            "true" | "false" | "null" => {
                self.bump();
                return self.node(SyntaxKind::Literal, start, vec![]);
            }
            _ => {}
        }
        if self.nth_at(1, "=>") && !self.nth(1).newline_before {
            return self.parse_arrow(start);
        }
        let name = self.take_name();
        self.named(SyntaxKind::Identifier, start, Some(name), vec![])
    }

    /// Does the `(` at token index `at` open an arrow function's parameters?
    fn is_arrow_at(&self, at: usize) -> bool {
        let mut depth = 0usize;
        let mut i = at;
        while i < self.tokens.len() {
            let token = self.tokens[i];
            if token.kind == TokenKind::Eof {
                return false;
            }
            if token.kind == TokenKind::Punct {
                match self.token_text(token) {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            i += 1;
        }
        let after = |n: usize| self.tokens.get(i + n).copied();
        let Some(next) = after(1) else {
            return false;
        };
        let next_text = self.token_text(next);
        if next.kind != TokenKind::Punct {
            return false;
        }
        if next_text == "=>" {
            return true;
        }
        if next_text != ":" {
            return false;
        }
        // `(params): ReturnType =>`
        let mut depth = 0i32;
        let mut j = i + 2;
        while let Some(token) = self.tokens.get(j) {
            if token.kind == TokenKind::Eof {
                return false;
            }
            if token.kind == TokenKind::Punct {
                match self.token_text(*token) {
                    "=>" if depth == 0 => return true,
                    "(" | "[" | "{" | "<" => depth += 1,
                    ")" | "]" | "}" | ">" => {
                        depth -= 1;
                        if depth < 0 {
                            return false;
                        }
                    }
                    ";" | "," | "=" if depth == 0 => return false,
                    _ => {}
                }
            }
            j += 1;
        }
        false
    }

    /// Arrow function starting at the parameter list or a bare parameter;
    /// any `async` has already been consumed
    fn parse_arrow(&mut self, start: usize) -> NodeId {
        let mut children = if self.current().kind == TokenKind::Word {
            let param_start = self.start();
            let name = self.take_name();
            vec![self.named(SyntaxKind::Parameter, param_start, Some(name), vec![])]
        } else {
            self.parse_parameters()
        };
        let return_type = self.parse_annotation(&["=>"]);
        self.expect("=>");
        let body = if self.at("{") {
            self.parse_block()
        } else {
            self.parse_assignment()
        };
        children.push(body);
        let id = self.node(SyntaxKind::ArrowFunction, start, children);
        self.annotate(id, return_type);
        id
    }

    fn parse_array_literal(&mut self) -> NodeId {
        let start = self.start();
        self.expect("[");
        let mut elements = Vec::new();
        while !self.at("]") && !self.is_eof() {
            if self.eat(",") {
                continue;
            }
            let before = self.pos;
            elements.push(self.parse_spread_or_assignment());
            if !self.eat(",") || self.pos == before {
                break;
            }
        }
        self.expect("]");
        self.node(SyntaxKind::ArrayLiteral, start, elements)
    }

    fn parse_object_literal(&mut self) -> NodeId {
        let start = self.start();
        self.expect("{");
        let mut members = Vec::new();
        while !self.at("}") && !self.is_eof() {
            let before = self.pos;
            members.push(self.parse_object_member());
            if !self.eat(",") || self.pos == before {
                break;
            }
        }
        self.expect("}");
        self.node(SyntaxKind::ObjectLiteral, start, members)
    }

    fn parse_object_member(&mut self) -> NodeId {
        let start = self.start();
        if self.at("...") {
            self.bump();
            let expr = self.parse_assignment();
            return self.node(SyntaxKind::SpreadElement, start, vec![expr]);
        }

        let mut kind = SyntaxKind::MethodDeclaration;
        if self.current().kind == TokenKind::Word
            && matches!(self.text(), "get" | "set" | "async")
            && self.nth_starts_member_name(1)
            && !self.nth_at(1, "{")
        {
            if self.at_word("get") {
                kind = SyntaxKind::GetAccessor;
            }
            self.bump();
        }
        self.eat("*");

        let name = self.parse_member_name();
        if self.at("(") || self.at("<") {
            if self.at("<") {
                self.skip_angle_brackets();
            }
            let mut children = self.parse_parameters();
            let return_type = self.parse_annotation(&["{"]);
            children.push(self.parse_block());
            let id = self.named(kind, start, name, children);
            self.annotate(id, return_type);
            return id;
        }

        if self.eat(":") {
            let value = self.parse_assignment();
            return self.named(SyntaxKind::PropertyAssignment, start, name, vec![value]);
        }

        // Shorthand `{ a }`, possibly with a destructuring default `{ a = 1 }`
        let mut children = Vec::new();
        if let Some(name) = &name {
            let ident = self.builder.alloc(SyntaxKind::Identifier, name.span, vec![]);
            self.builder.set_name(ident, name.clone());
            children.push(ident);
        }
        if self.eat("=") {
            children.push(self.parse_assignment());
        }
        self.named(SyntaxKind::PropertyAssignment, start, name, children)
    }
}
