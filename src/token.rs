use std::fmt;
use std::mem;

/// Token kinds produced by the scanner.
///
/// `NUMBER` carries the parsed value and `STRING` carries the literal text
/// including the surrounding quotes; every other kind is fully described by
/// its lexeme.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone)]
pub enum TokenType {
    // Scanner-level markers.
    ILLEGAL,
    EOF,
    COMMENT,

    // Single-character tokens.
    PAREN_LEFT,
    PAREN_RIGHT,
    BRACE_LEFT,
    BRACE_RIGHT,
    COMMA,
    DOT,
    DASH,
    PLUS,
    SEMICOLON,
    SLASH,
    STAR,

    // One or two character tokens.
    BANG,
    BANG_EQUAL,
    EQUAL,
    EQUAL_EQUAL,
    GREATER,
    GREATER_EQUAL,
    LESS,
    LESS_EQUAL,

    // Literals.
    IDENTIFIER,
    STRING(String),
    NUMBER(f64),

    // Keywords.
    AND,
    CLASS,
    ELSE,
    FALSE,
    FUN,
    FOR,
    IF,
    NIL,
    OR,
    PRINT,
    RETURN,
    SUPER,
    THIS,
    TRUE,
    VAR,
    WHILE,
}

/// Kind-only equality: the parser matches on token kinds and must treat any
/// two `NUMBER`s (or `STRING`s) as the same kind regardless of payload.
impl PartialEq for TokenType {
    fn eq(&self, other: &Self) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }
}

impl Eq for TokenType {}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub line: usize,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: String, line: usize) -> Self {
        Self {
            token_type,
            lexeme,
            line,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tmp: String = format!("{:?}", self.token_type);
        let type_name: &str = tmp.split('(').next().unwrap_or(&tmp);

        match &self.token_type {
            TokenType::STRING(literal) => write!(f, "{} {} {}", type_name, self.lexeme, literal),

            TokenType::NUMBER(literal) => {
                if literal.fract() == 0.0 {
                    write!(f, "{} {} {:.1}", type_name, self.lexeme, literal)
                } else {
                    write!(f, "{} {} {}", type_name, self.lexeme, literal)
                }
            }

            _ => write!(f, "{} {} null", type_name, self.lexeme),
        }
    }
}
