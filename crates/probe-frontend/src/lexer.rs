//! Lexer: tokenizes probe language source text
//!
//! Produces the token stream the parser consumes. Handles keywords,
//! identifiers, literals, operators and both comment forms.

use thiserror::Error;

/// A malformed piece of source text. Reported as an error diagnostic by
/// the task; never escapes the frontend as a `FrontendError`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub line: usize,
    pub col: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, col: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            col,
            message: message.into(),
        }
    }
}

pub type SyntaxResult<T> = Result<T, SyntaxError>;

/// A token produced by the lexer
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw text; for string and char literals the unescaped value
    pub text: String,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub col: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            col,
        }
    }
}

/// Token types
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Keywords
    Package,
    Import,
    Class,
    Extends,
    Public,
    Private,
    Protected,
    Static,
    Final,
    Void,
    Int,
    Long,
    Boolean,
    If,
    Else,
    While,
    For,
    Return,
    Throw,
    Synchronized,
    New,
    This,
    True,
    False,
    Null,

    // Identifiers and literals
    Identifier,
    IntLiteral,
    LongLiteral,
    StringLiteral,
    CharLiteral,

    // Structural
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Semicolon,
    Comma,
    Dot,
    At,

    // Operators
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,

    // End of input
    Eof,
}

impl TokenKind {
    fn keyword(text: &str) -> Option<Self> {
        let kind = match text {
            "package" => Self::Package,
            "import" => Self::Import,
            "class" => Self::Class,
            "extends" => Self::Extends,
            "public" => Self::Public,
            "private" => Self::Private,
            "protected" => Self::Protected,
            "static" => Self::Static,
            "final" => Self::Final,
            "void" => Self::Void,
            "int" => Self::Int,
            "long" => Self::Long,
            "boolean" => Self::Boolean,
            "if" => Self::If,
            "else" => Self::Else,
            "while" => Self::While,
            "for" => Self::For,
            "return" => Self::Return,
            "throw" => Self::Throw,
            "synchronized" => Self::Synchronized,
            "new" => Self::New,
            "this" => Self::This,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            _ => return None,
        };
        Some(kind)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Package => "'package'",
            Self::Import => "'import'",
            Self::Class => "'class'",
            Self::Extends => "'extends'",
            Self::Public => "'public'",
            Self::Private => "'private'",
            Self::Protected => "'protected'",
            Self::Static => "'static'",
            Self::Final => "'final'",
            Self::Void => "'void'",
            Self::Int => "'int'",
            Self::Long => "'long'",
            Self::Boolean => "'boolean'",
            Self::If => "'if'",
            Self::Else => "'else'",
            Self::While => "'while'",
            Self::For => "'for'",
            Self::Return => "'return'",
            Self::Throw => "'throw'",
            Self::Synchronized => "'synchronized'",
            Self::New => "'new'",
            Self::This => "'this'",
            Self::True => "'true'",
            Self::False => "'false'",
            Self::Null => "'null'",
            Self::Identifier => "<identifier>",
            Self::IntLiteral | Self::LongLiteral => "number",
            Self::StringLiteral => "string literal",
            Self::CharLiteral => "character literal",
            Self::OpenBrace => "'{'",
            Self::CloseBrace => "'}'",
            Self::OpenParen => "'('",
            Self::CloseParen => "')'",
            Self::OpenBracket => "'['",
            Self::CloseBracket => "']'",
            Self::Semicolon => "';'",
            Self::Comma => "','",
            Self::Dot => "'.'",
            Self::At => "'@'",
            Self::Assign => "'='",
            Self::Plus => "'+'",
            Self::Minus => "'-'",
            Self::Star => "'*'",
            Self::Slash => "'/'",
            Self::Percent => "'%'",
            Self::Bang => "'!'",
            Self::EqEq => "'=='",
            Self::NotEq => "'!='",
            Self::Lt => "'<'",
            Self::Le => "'<='",
            Self::Gt => "'>'",
            Self::Ge => "'>='",
            Self::AndAnd => "'&&'",
            Self::OrOr => "'||'",
            Self::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// Lexer for probe language source
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Tokenize the entire input. The last token is always `Eof`.
    pub fn tokenize(&mut self) -> SyntaxResult<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments()?;

            if self.pos >= self.input.len() {
                tokens.push(Token::new(TokenKind::Eof, "", self.line, self.col));
                break;
            }

            let token = self.next_token()?;
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> SyntaxResult<Token> {
        let ch = self.input[self.pos];
        let line = self.line;
        let col = self.col;

        let two = |lexer: &mut Self, kind: TokenKind, text: &str| -> SyntaxResult<Token> {
            lexer.advance();
            lexer.advance();
            Ok(Token::new(kind, text, line, col))
        };
        let one = |lexer: &mut Self, kind: TokenKind| -> SyntaxResult<Token> {
            lexer.advance();
            Ok(Token::new(kind, ch.to_string(), line, col))
        };

        match ch {
            '=' if self.peek_at(1) == Some('=') => two(self, TokenKind::EqEq, "=="),
            '!' if self.peek_at(1) == Some('=') => two(self, TokenKind::NotEq, "!="),
            '<' if self.peek_at(1) == Some('=') => two(self, TokenKind::Le, "<="),
            '>' if self.peek_at(1) == Some('=') => two(self, TokenKind::Ge, ">="),
            '&' if self.peek_at(1) == Some('&') => two(self, TokenKind::AndAnd, "&&"),
            '|' if self.peek_at(1) == Some('|') => two(self, TokenKind::OrOr, "||"),
            '{' => one(self, TokenKind::OpenBrace),
            '}' => one(self, TokenKind::CloseBrace),
            '(' => one(self, TokenKind::OpenParen),
            ')' => one(self, TokenKind::CloseParen),
            '[' => one(self, TokenKind::OpenBracket),
            ']' => one(self, TokenKind::CloseBracket),
            ';' => one(self, TokenKind::Semicolon),
            ',' => one(self, TokenKind::Comma),
            '.' => one(self, TokenKind::Dot),
            '@' => one(self, TokenKind::At),
            '=' => one(self, TokenKind::Assign),
            '+' => one(self, TokenKind::Plus),
            '-' => one(self, TokenKind::Minus),
            '*' => one(self, TokenKind::Star),
            '/' => one(self, TokenKind::Slash),
            '%' => one(self, TokenKind::Percent),
            '!' => one(self, TokenKind::Bang),
            '<' => one(self, TokenKind::Lt),
            '>' => one(self, TokenKind::Gt),
            '"' => self.read_string_literal(),
            '\'' => self.read_char_literal(),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_alphabetic() || c == '_' || c == '$' => Ok(self.read_identifier_or_keyword()),
            _ => Err(SyntaxError::new(
                line,
                col,
                format!("illegal character: '{}'", ch),
            )),
        }
    }

    fn read_string_literal(&mut self) -> SyntaxResult<Token> {
        let line = self.line;
        let col = self.col;
        self.advance(); // opening quote

        let mut text = String::new();
        loop {
            match self.peek_at(0) {
                None | Some('\n') => {
                    return Err(SyntaxError::new(line, col, "unclosed string literal"));
                }
                Some('"') => break,
                Some('\\') => text.push(self.read_escape()?),
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }

        self.advance(); // closing quote
        Ok(Token::new(TokenKind::StringLiteral, text, line, col))
    }

    fn read_char_literal(&mut self) -> SyntaxResult<Token> {
        let line = self.line;
        let col = self.col;
        self.advance();

        let value = match self.peek_at(0) {
            Some('\\') => self.read_escape()?,
            Some(c) if c != '\'' && c != '\n' => {
                self.advance();
                c
            }
            _ => return Err(SyntaxError::new(line, col, "empty character literal")),
        };
        if self.peek_at(0) != Some('\'') {
            return Err(SyntaxError::new(line, col, "unclosed character literal"));
        }
        self.advance();
        Ok(Token::new(TokenKind::CharLiteral, value.to_string(), line, col))
    }

    fn read_escape(&mut self) -> SyntaxResult<char> {
        let line = self.line;
        let col = self.col;
        self.advance(); // backslash
        let c = match self.peek_at(0) {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('0') => '\0',
            Some('\\') => '\\',
            Some('"') => '"',
            Some('\'') => '\'',
            _ => return Err(SyntaxError::new(line, col, "illegal escape character")),
        };
        self.advance();
        Ok(c)
    }

    fn read_number(&mut self) -> SyntaxResult<Token> {
        let line = self.line;
        let col = self.col;
        let mut text = String::new();

        while let Some(c) = self.peek_at(0).filter(char::is_ascii_digit) {
            text.push(c);
            self.advance();
        }

        if matches!(self.peek_at(0), Some('L' | 'l')) {
            self.advance();
            if text.parse::<i64>().is_err() {
                return Err(SyntaxError::new(line, col, "long number too large"));
            }
            return Ok(Token::new(TokenKind::LongLiteral, text, line, col));
        }
        if text.parse::<i32>().is_err() {
            return Err(SyntaxError::new(line, col, "integer number too large"));
        }
        Ok(Token::new(TokenKind::IntLiteral, text, line, col))
    }

    fn read_identifier_or_keyword(&mut self) -> Token {
        let line = self.line;
        let col = self.col;
        let mut text = String::new();

        while let Some(c) = self
            .peek_at(0)
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
        {
            text.push(c);
            self.advance();
        }

        let kind = TokenKind::keyword(&text).unwrap_or(TokenKind::Identifier);
        Token::new(kind, text, line, col)
    }

    fn skip_whitespace_and_comments(&mut self) -> SyntaxResult<()> {
        while let Some(ch) = self.peek_at(0) {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '/' && self.peek_at(1) == Some('/') {
                while self.peek_at(0).is_some_and(|c| c != '\n') {
                    self.advance();
                }
            } else if ch == '/' && self.peek_at(1) == Some('*') {
                let line = self.line;
                let col = self.col;
                self.advance();
                self.advance();
                loop {
                    match self.peek_at(0) {
                        None => return Err(SyntaxError::new(line, col, "unclosed comment")),
                        Some('*') if self.peek_at(1) == Some('/') => {
                            self.advance();
                            self.advance();
                            break;
                        }
                        Some(_) => self.advance(),
                    }
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    fn advance(&mut self) {
        if self.pos < self.input.len() {
            if self.input[self.pos] == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.pos += 1;
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_class_header() {
        assert_eq!(
            kinds("public class Probe extends Base {"),
            vec![
                TokenKind::Public,
                TokenKind::Class,
                TokenKind::Identifier,
                TokenKind::Extends,
                TokenKind::Identifier,
                TokenKind::OpenBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a == b != c <= d >= e && f || !g = h < i > j"),
            vec![
                TokenKind::Identifier,
                TokenKind::EqEq,
                TokenKind::Identifier,
                TokenKind::NotEq,
                TokenKind::Identifier,
                TokenKind::Le,
                TokenKind::Identifier,
                TokenKind::Ge,
                TokenKind::Identifier,
                TokenKind::AndAnd,
                TokenKind::Identifier,
                TokenKind::OrOr,
                TokenKind::Bang,
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Identifier,
                TokenKind::Lt,
                TokenKind::Identifier,
                TokenKind::Gt,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_literals() {
        let tokens = Lexer::new(r#"42 7L "a\"b\n" 'x' '\t'"#).tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[1].kind, TokenKind::LongLiteral);
        assert_eq!(tokens[1].text, "7");
        assert_eq!(tokens[2].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[2].text, "a\"b\n");
        assert_eq!(tokens[3].text, "x");
        assert_eq!(tokens[4].text, "\t");
    }

    #[test]
    fn test_comments_and_line_tracking() {
        let tokens = Lexer::new("class // trailing\n/* block\n comment */ A")
            .tokenize()
            .unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Class);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].line, 3);
        assert_eq!(tokens[1].col, 13);
    }

    #[test]
    fn test_errors_carry_position() {
        let err = Lexer::new("class A {\n  \"open").tokenize().unwrap_err();
        assert_eq!((err.line, err.col), (2, 3));
        assert_eq!(err.message, "unclosed string literal");

        assert!(Lexer::new("/* never closed").tokenize().is_err());
        assert!(Lexer::new("int x = #;").tokenize().is_err());
        assert!(Lexer::new("99999999999").tokenize().is_err());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }
}
