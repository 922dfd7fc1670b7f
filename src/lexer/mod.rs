use std::default::Default;

use trie_rs::{Trie, TrieBuilder};

pub struct Lexer {
    source: String,
    lexeme_start: usize,
    lexeme_current: usize,
    line: usize,
    keywords: Trie<u8>,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum TokenType {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Colon,
    ColonEqual,
    EqualColon,
    RightArrow,
    Identifier,
    String,
    HexString,
    Number,
    Let,
    Function,
    If,
    Switch,
    Case,
    Default,
    For,
    Break,
    Continue,
    True,
    False,
    Object,
    Code,
    Data,
    EOF,
    #[default]
    Error,
}

const KEYWORDS: [(&str, TokenType); 15] = [
    ("let", TokenType::Let),
    ("function", TokenType::Function),
    ("if", TokenType::If),
    ("switch", TokenType::Switch),
    ("case", TokenType::Case),
    ("default", TokenType::Default),
    ("for", TokenType::For),
    ("break", TokenType::Break),
    ("continue", TokenType::Continue),
    ("true", TokenType::True),
    ("false", TokenType::False),
    ("object", TokenType::Object),
    ("code", TokenType::Code),
    ("data", TokenType::Data),
    ("hex", TokenType::HexString),
];

#[derive(Debug, Clone, Default)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub line: usize,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        self.token_type == TokenType::EOF
    }

    /// The text between the quotes of a string or hex string token.
    pub fn string_contents(&self) -> &str {
        let start = self.lexeme.find('"').map_or(0, |i| i + 1);
        let end = self.lexeme.len().saturating_sub(1).max(start);
        &self.lexeme[start..end]
    }
}

impl Lexer {
    pub fn new(source: String) -> Lexer {
        Lexer {
            source,
            lexeme_start: 0,
            lexeme_current: 0,
            line: 1,
            keywords: {
                let mut tb = TrieBuilder::new();
                for (k, _) in KEYWORDS.iter() {
                    tb.push(k.as_bytes());
                }
                tb.build()
            },
        }
    }

    pub fn scan_token(&mut self) -> Token {
        if let Err(message) = self.skip_whitespace() {
            return self.error_token(message);
        }
        self.lexeme_start = self.lexeme_current;

        if self.is_at_end() {
            return self.make_token(TokenType::EOF);
        };

        let c = self.advance();
        if is_identifier_start(c) {
            while is_identifier_part(self.peek()) {
                self.advance();
            }
            let token_type = self.identifier_type();
            if token_type == TokenType::HexString {
                return if self.peek() == '"' {
                    self.advance();
                    self.string(TokenType::HexString)
                } else {
                    self.make_token(TokenType::Identifier)
                };
            }
            return self.make_token(token_type);
        }

        if c.is_ascii_digit() {
            if c == '0' && self.peek() == 'x' {
                self.advance();
                while self.peek().is_ascii_hexdigit() {
                    self.advance();
                }
            } else {
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
            }
            if is_identifier_part(self.peek()) {
                return self.error_token("Invalid character in number literal.");
            }
            return self.make_token(TokenType::Number);
        }

        match c {
            '(' => self.make_token(TokenType::LeftParen),
            ')' => self.make_token(TokenType::RightParen),
            '{' => self.make_token(TokenType::LeftBrace),
            '}' => self.make_token(TokenType::RightBrace),
            ',' => self.make_token(TokenType::Comma),
            '-' => {
                if self.advance_if_match('>') {
                    self.make_token(TokenType::RightArrow)
                } else {
                    self.error_token("Unexpected character.")
                }
            }
            ':' => {
                if self.advance_if_match('=') {
                    self.make_token(TokenType::ColonEqual)
                } else {
                    self.make_token(TokenType::Colon)
                }
            }
            '=' => {
                if self.advance_if_match(':') {
                    self.make_token(TokenType::EqualColon)
                } else {
                    self.error_token("Unexpected character.")
                }
            }
            '"' => self.string(TokenType::String),
            _ => self.error_token("Unexpected character."),
        }
    }

    fn string(&mut self, token_type: TokenType) -> Token {
        while self.peek() != '"' && !self.is_at_end() {
            match self.peek() {
                '\n' => return self.error_token("Unterminated string."),
                '\\' => {
                    self.advance();
                }
                _ => {}
            }
            self.advance();
        }
        if self.is_at_end() {
            return self.error_token("Unterminated string.");
        }
        self.advance();
        self.make_token(token_type)
    }

    fn is_at_end(&self) -> bool {
        self.lexeme_current >= self.source.len()
    }

    fn make_token(&self, token_type: TokenType) -> Token {
        Token {
            token_type,
            lexeme: String::from(&self.source[self.lexeme_start..self.lexeme_current]),
            line: self.line,
        }
    }

    fn error_token(&self, message: &str) -> Token {
        Token {
            token_type: TokenType::Error,
            lexeme: String::from(message),
            line: self.line,
        }
    }

    fn byte_at(&self, index: usize) -> char {
        self.source.as_bytes().get(index).map_or('\0', |b| *b as char)
    }

    fn advance(&mut self) -> char {
        let c = self.byte_at(self.lexeme_current);
        self.lexeme_current += 1;
        c
    }

    fn advance_if_match(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            return false;
        }
        self.lexeme_current += 1;
        true
    }

    fn peek(&self) -> char {
        self.byte_at(self.lexeme_current)
    }

    fn peek_next(&self) -> char {
        self.byte_at(self.lexeme_current + 1)
    }

    fn skip_whitespace(&mut self) -> Result<(), &'static str> {
        loop {
            match self.peek() {
                ' ' | '\r' | '\t' => {
                    self.advance();
                }
                '\n' => {
                    self.line += 1;
                    self.advance();
                }
                '/' if self.peek_next() == '/' => {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                }
                '/' if self.peek_next() == '*' => {
                    self.advance();
                    self.advance();
                    while !(self.peek() == '*' && self.peek_next() == '/') {
                        if self.is_at_end() {
                            return Err("Unterminated comment.");
                        }
                        if self.advance() == '\n' {
                            self.line += 1;
                        }
                    }
                    self.advance();
                    self.advance();
                }
                _ => return Ok(()),
            }
        }
    }

    fn identifier_type(&self) -> TokenType {
        let lexeme = &self.source[self.lexeme_start..self.lexeme_current];
        if self.keywords.exact_match(lexeme.as_bytes()) {
            return KEYWORDS
                .iter()
                .find(|(k, _)| *k == lexeme)
                .map_or(TokenType::Identifier, |(_, t)| *t);
        };
        TokenType::Identifier
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    is_identifier_start(c) || c.is_ascii_digit() || c == '.'
}
