use logos::Logos;

use crate::ast::{Location, Span};

/// Tokens of the Java subset.
///
/// `record`, `yield`, `sealed`, `permits` and `var` are contextual: they lex
/// as [`Token::Identifier`] and the parser recognises them by position.
#[derive(Logos, Debug, PartialEq, Clone)]
pub enum Token {
    // Keywords
    #[token("package")]
    Package,
    #[token("import")]
    Import,
    #[token("static")]
    Static,
    #[token("public")]
    Public,
    #[token("protected")]
    Protected,
    #[token("private")]
    Private,
    #[token("abstract")]
    Abstract,
    #[token("final")]
    Final,
    #[token("native")]
    Native,
    #[token("synchronized")]
    Synchronized,
    #[token("transient")]
    Transient,
    #[token("volatile")]
    Volatile,
    #[token("strictfp")]
    Strictfp,
    #[token("non-sealed")]
    NonSealed,
    #[token("class")]
    Class,
    #[token("interface")]
    Interface,
    #[token("enum")]
    Enum,
    #[token("extends")]
    Extends,
    #[token("implements")]
    Implements,
    #[token("new")]
    New,
    #[token("this")]
    This,
    #[token("super")]
    Super,
    #[token("instanceof")]
    InstanceOf,
    #[token("void")]
    Void,
    #[token("boolean")]
    Boolean,
    #[token("byte")]
    Byte,
    #[token("short")]
    Short,
    #[token("int")]
    Int,
    #[token("long")]
    Long,
    #[token("char")]
    Char,
    #[token("float")]
    Float,
    #[token("double")]
    Double,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("assert")]
    Assert,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("return")]
    Return,
    #[token("throw")]
    Throw,
    #[token("throws")]
    Throws,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("finally")]
    Finally,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    // Operators
    #[token("=")]
    Assign,
    #[token("+=")]
    AddAssign,
    #[token("-=")]
    SubAssign,
    #[token("*=")]
    MulAssign,
    #[token("/=")]
    DivAssign,
    #[token("%=")]
    ModAssign,
    #[token("&=")]
    AndAssign,
    #[token("|=")]
    OrAssign,
    #[token("^=")]
    XorAssign,
    #[token("<<=")]
    LShiftAssign,
    #[token(">>=")]
    RShiftAssign,
    #[token(">>>=")]
    URShiftAssign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("++")]
    Inc,
    #[token("--")]
    Dec,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("<<")]
    LShift,
    #[token(">>")]
    RShift,
    #[token(">>>")]
    URShift,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    PipePipe,
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token("::")]
    DoubleColon,
    #[token("->")]
    Arrow,

    // Separators
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("@")]
    At,
    #[token("...")]
    Ellipsis,

    // Literals
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    StringLiteral,
    #[regex(r"'([^'\\\n]|\\.|\\u[0-9a-fA-F]{4})'")]
    CharLiteral,
    #[regex(r"[0-9][0-9_]*")]
    #[regex(r"0[xX][0-9a-fA-F_]+")]
    #[regex(r"0[bB][01_]+")]
    IntLiteral,
    #[regex(r"[0-9][0-9_]*[lL]")]
    #[regex(r"0[xX][0-9a-fA-F_]+[lL]")]
    #[regex(r"0[bB][01_]+[lL]")]
    LongLiteral,
    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?[fFdD]?")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?[fFdD]?")]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+[fFdD]?")]
    #[regex(r"[0-9][0-9_]*[fFdD]")]
    FloatLiteral,

    // Identifiers
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*")]
    Identifier,

    // Comments and whitespace
    #[regex(r"//[^\n]*")]
    LineComment,
    #[regex(r"/\*[^*]*\*+([^/*][^*]*\*+)*/", priority = 2)]
    BlockComment,
    #[regex(r"[ \t\n\r\f]+", priority = 2)]
    Whitespace,
    #[token("\u{FEFF}")]
    Bom,
}

impl Token {
    /// Check if this token is a modifier keyword
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            Token::Public
                | Token::Protected
                | Token::Private
                | Token::Abstract
                | Token::Final
                | Token::Native
                | Token::Synchronized
                | Token::Transient
                | Token::Volatile
                | Token::Static
                | Token::Strictfp
                | Token::NonSealed
        )
    }

    /// Check if this token is a primitive type (or `void`)
    pub fn is_primitive_type(&self) -> bool {
        matches!(
            self,
            Token::Boolean
                | Token::Byte
                | Token::Short
                | Token::Int
                | Token::Long
                | Token::Char
                | Token::Float
                | Token::Double
                | Token::Void
        )
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Token::StringLiteral
                | Token::CharLiteral
                | Token::IntLiteral
                | Token::LongLiteral
                | Token::FloatLiteral
                | Token::True
                | Token::False
                | Token::Null
        )
    }

    fn is_trivia(&self) -> bool {
        matches!(self, Token::Whitespace | Token::Bom | Token::LineComment | Token::BlockComment)
    }
}

/// Lexical token with location information
#[derive(Debug, Clone)]
pub struct LexicalToken {
    pub token: Token,
    pub lexeme: String,
    pub location: Location,
    pub end: Location,
}

impl LexicalToken {
    pub fn span(&self) -> Span {
        Span::new(self.location, self.end)
    }

    /// Check if this token matches the given token type
    pub fn is(&self, token_type: &Token) -> bool {
        std::mem::discriminant(&self.token) == std::mem::discriminant(token_type)
    }
}

/// Characters the lexer could not classify.
#[derive(Debug, Clone)]
pub struct BadToken {
    pub text: String,
    pub span: Span,
}

pub struct Lexer<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { source, line_starts }
    }

    fn location(&self, offset: usize) -> Location {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = self.line_starts[line];
        let column = self.source[line_start..offset].chars().count() + 1;
        Location::new(line + 1, column, offset)
    }

    /// Tokens without trivia, plus anything that failed to lex.
    pub fn tokenize(self) -> (Vec<LexicalToken>, Vec<BadToken>) {
        let mut tokens = Vec::new();
        let mut bad = Vec::new();
        let mut lexer = Token::lexer(self.source);
        while let Some(result) = lexer.next() {
            let range = lexer.span();
            let location = self.location(range.start);
            let end = self.location(range.end);
            match result {
                Ok(token) if token.is_trivia() => {}
                Ok(token) => tokens.push(LexicalToken {
                    token,
                    lexeme: lexer.slice().to_string(),
                    location,
                    end,
                }),
                Err(()) => bad.push(BadToken {
                    text: lexer.slice().to_string(),
                    span: Span::new(location, end),
                }),
            }
        }
        (tokens, bad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        let (tokens, bad) = Lexer::new(source).tokenize();
        assert!(bad.is_empty(), "unexpected bad tokens: {:?}", bad);
        tokens.into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn contextual_keywords_are_identifiers() {
        assert_eq!(
            kinds("record yield sealed permits var"),
            vec![Token::Identifier; 5]
        );
        assert_eq!(kinds("non-sealed"), vec![Token::NonSealed]);
    }

    #[test]
    fn numeric_literals() {
        assert_eq!(
            kinds("42 0x1F 7L 1.0 2.5f 3d .5 1e3"),
            vec![
                Token::IntLiteral,
                Token::IntLiteral,
                Token::LongLiteral,
                Token::FloatLiteral,
                Token::FloatLiteral,
                Token::FloatLiteral,
                Token::FloatLiteral,
                Token::FloatLiteral,
            ]
        );
    }

    #[test]
    fn arrow_and_varargs() {
        assert_eq!(
            kinds("case 1 -> x; int... a"),
            vec![
                Token::Case,
                Token::IntLiteral,
                Token::Arrow,
                Token::Identifier,
                Token::Semicolon,
                Token::Int,
                Token::Ellipsis,
                Token::Identifier,
            ]
        );
    }

    #[test]
    fn comments_are_skipped_and_locations_tracked() {
        let (tokens, _) = Lexer::new("// note\n/* block */ int\n  x").tokenize();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].location.line, 2);
        assert_eq!(tokens[0].location.column, 13);
        assert_eq!(tokens[1].location.line, 3);
        assert_eq!(tokens[1].location.column, 3);
        assert_eq!(tokens[1].end.column, 4);
    }

    #[test]
    fn unknown_characters_are_collected() {
        let (tokens, bad) = Lexer::new("int # x").tokenize();
        assert_eq!(tokens.len(), 2);
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].text, "#");
    }
}
