//! Tokenizer for TypeScript/JavaScript sources
//!
//! Keywords are not distinguished from identifiers here; the parser checks
//! word text where it cares. Punctuators are matched longest-first.

use super::span::Span;
use super::ParseError;

/// Token kinds produced by the lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword (including `#private` names)
    Word,
    Number,
    String,
    /// Template literal without substitutions
    Template,
    /// `` `text${ `` opening a template with substitutions
    TemplateHead,
    /// `` }text${ `` between two substitutions
    TemplateMiddle,
    /// `` }text` `` closing a template
    TemplateTail,
    Regex,
    Punct,
    Eof,
}

/// A lexed token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line break separates this token from the previous one
    pub newline_before: bool,
}

/// Punctuators, longest first so a prefix never shadows a longer match
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".", "@",
];

/// Words after which a `/` starts a regular expression rather than a division
const REGEX_PRECEDING_WORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case",
    "do", "else", "yield", "await",
];

pub struct Lexer<'src> {
    source: &'src str,
    pos: usize,
    tokens: Vec<Token>,
    errors: Vec<ParseError>,
    newline_before: bool,
    /// Open `${` substitutions, each with its count of unclosed `{`
    template_braces: Vec<usize>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            pos: 0,
            tokens: Vec::new(),
            errors: Vec::new(),
            newline_before: false,
            template_braces: Vec::new(),
        }
    }

    /// Tokenize the whole source. The token list always ends with `Eof`.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<ParseError>) {
        loop {
            self.skip_trivia();
            let Some(c) = self.peek() else {
                break;
            };
            let start = self.pos;
            let kind = self.lex_token(c, start);
            self.push(kind, start);
        }
        let end = self.source.len();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(end, end),
            newline_before: self.newline_before,
        });
        (self.tokens, self.errors)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, self.pos),
            newline_before: self.newline_before,
        });
        self.newline_before = false;
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.source[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn bump_while(&mut self, predicate: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !predicate(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                '\n' => {
                    self.newline_before = true;
                    self.pos += 1;
                }
                c if c.is_whitespace() => {
                    self.pos += c.len_utf8();
                }
                '/' if self.peek_nth(1) == Some('/') => {
                    self.bump_while(|c| c != '\n');
                }
                '/' if self.peek_nth(1) == Some('*') => {
                    let start = self.pos;
                    self.pos += 2;
                    match self.source[self.pos..].find("*/") {
                        Some(rel) => {
                            if self.source[self.pos..self.pos + rel].contains('\n') {
                                self.newline_before = true;
                            }
                            self.pos += rel + 2;
                        }
                        None => {
                            self.pos = self.source.len();
                            self.errors.push(ParseError::Unterminated {
                                what: "block comment",
                                span: Span::new(start, self.pos),
                            });
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_token(&mut self, c: char, start: usize) -> TokenKind {
        if is_ident_start(c) || c == '#' {
            self.bump();
            self.bump_while(is_ident_continue);
            return TokenKind::Word;
        }
        if c.is_ascii_digit()
            || (c == '.' && self.peek_nth(1).is_some_and(|n| n.is_ascii_digit()))
        {
            self.bump();
            self.bump_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
            return TokenKind::Number;
        }
        match c {
            '"' | '\'' => self.lex_string(c, start),
            '`' => {
                self.bump();
                self.lex_template_part(start, true)
            }
            '{' => {
                if let Some(open) = self.template_braces.last_mut() {
                    *open += 1;
                }
                self.lex_punct(c, start)
            }
            '}' if self.template_braces.last() == Some(&0) => {
                self.bump();
                self.lex_template_part(start, false)
            }
            '}' => {
                if let Some(open) = self.template_braces.last_mut() {
                    *open -= 1;
                }
                self.lex_punct(c, start)
            }
            '/' if self.regex_allowed() => self.lex_regex(start),
            _ => self.lex_punct(c, start),
        }
    }

    fn lex_string(&mut self, quote: char, start: usize) -> TokenKind {
        self.bump();
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '\n' => break,
                c if c == quote => {
                    self.bump();
                    return TokenKind::String;
                }
                _ => {
                    self.bump();
                }
            }
        }
        self.errors.push(ParseError::Unterminated {
            what: "string literal",
            span: Span::new(start, self.pos),
        });
        TokenKind::String
    }

    /// Template text after an opening backtick (`head`) or after the `}`
    /// closing a substitution. Stops at the closing backtick or at `${`.
    fn lex_template_part(&mut self, start: usize, head: bool) -> TokenKind {
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '`' => {
                    self.bump();
                    if head {
                        return TokenKind::Template;
                    }
                    self.template_braces.pop();
                    return TokenKind::TemplateTail;
                }
                '$' if self.peek_nth(1) == Some('{') => {
                    self.pos += 2;
                    if head {
                        self.template_braces.push(0);
                        return TokenKind::TemplateHead;
                    }
                    return TokenKind::TemplateMiddle;
                }
                _ => {
                    self.bump();
                }
            }
        }
        self.errors.push(ParseError::Unterminated {
            what: "template literal",
            span: Span::new(start, self.pos),
        });
        if head {
            TokenKind::Template
        } else {
            self.template_braces.pop();
            TokenKind::TemplateTail
        }
    }

    fn regex_allowed(&self) -> bool {
        let Some(prev) = self.tokens.last() else {
            return true;
        };
        let text = &self.source[prev.span.start..prev.span.end];
        match prev.kind {
            TokenKind::Word => REGEX_PRECEDING_WORDS.contains(&text),
            TokenKind::Number
            | TokenKind::String
            | TokenKind::Template
            | TokenKind::TemplateTail
            | TokenKind::Regex => false,
            TokenKind::TemplateHead | TokenKind::TemplateMiddle => true,
            TokenKind::Punct => !matches!(text, ")" | "]" | "}" | "++" | "--"),
            TokenKind::Eof => true,
        }
    }

    fn lex_regex(&mut self, start: usize) -> TokenKind {
        self.bump();
        let mut in_class = false;
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '\n' => break,
                '[' => {
                    in_class = true;
                    self.bump();
                }
                ']' => {
                    in_class = false;
                    self.bump();
                }
                '/' if !in_class => {
                    self.bump();
                    self.bump_while(is_ident_continue);
                    return TokenKind::Regex;
                }
                _ => {
                    self.bump();
                }
            }
        }
        self.errors.push(ParseError::Unterminated {
            what: "regular expression",
            span: Span::new(start, self.pos),
        });
        TokenKind::Regex
    }

    fn lex_punct(&mut self, c: char, start: usize) -> TokenKind {
        let rest = &self.source[self.pos..];
        if let Some(p) = PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) {
            self.pos += p.len();
            return TokenKind::Punct;
        }
        self.bump();
        self.errors.push(ParseError::UnexpectedChar {
            ch: c,
            span: Span::new(start, self.pos),
        });
        TokenKind::Punct
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphanumeric()
}

/// Tokenize `source`, returning tokens (ending in `Eof`) and lexical errors
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<ParseError>) {
    Lexer::new(source).tokenize()
}
