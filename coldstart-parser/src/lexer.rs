// coldstart-parser - Lexer for bootstrap source
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Tokeniser for bootstrap source.
//!
//! Works on byte offsets into the source and hands out tokens tagged with
//! the line and column they start at, so the reader never has to track
//! positions itself.

use std::fmt;

/// Bracket family of an opening or closing delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delim {
    Paren,
    Bracket,
    Brace,
    /// `#{`; closed by a plain brace.
    SetBrace,
}

impl Delim {
    /// Delimiter expected to close this one.
    #[must_use]
    pub fn closer(self) -> Delim {
        match self {
            Delim::SetBrace => Delim::Brace,
            other => other,
        }
    }

    fn open_str(self) -> &'static str {
        match self {
            Delim::Paren => "(",
            Delim::Bracket => "[",
            Delim::Brace => "{",
            Delim::SetBrace => "#{",
        }
    }

    fn close_str(self) -> &'static str {
        match self {
            Delim::Paren => ")",
            Delim::Bracket => "]",
            Delim::Brace | Delim::SetBrace => "}",
        }
    }
}

/// Reader shorthand applying to the next form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prefix {
    Quote,
    Deref,
    Var,
    Meta,
    Discard,
}

impl Prefix {
    fn as_str(self) -> &'static str {
        match self {
            Prefix::Quote => "'",
            Prefix::Deref => "@",
            Prefix::Var => "#'",
            Prefix::Meta => "^",
            Prefix::Discard => "#_",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Open(Delim),
    Close(Delim),
    Prefix(Prefix),
    Nil,
    Bool(bool),
    Int(i64),
    Double(f64),
    Char(char),
    Str(String),
    Symbol(String),
    Keyword(String),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Open(d) => f.write_str(d.open_str()),
            Token::Close(d) => f.write_str(d.close_str()),
            Token::Prefix(p) => f.write_str(p.as_str()),
            Token::Nil => f.write_str("nil"),
            Token::Bool(b) => write!(f, "{}", b),
            Token::Int(n) => write!(f, "{}", n),
            Token::Double(n) => write!(f, "{:?}", n),
            Token::Char(c) => write!(f, "\\{}", c),
            Token::Str(s) => write!(f, "{:?}", s),
            Token::Symbol(s) => f.write_str(s),
            Token::Keyword(s) => write!(f, ":{}", s),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

/// Line and column, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Loc {
    pub line: u32,
    pub column: u32,
}

/// A token and where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: Loc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lexer error at {}:{}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for LexerError {}

type Result<T> = std::result::Result<T, LexerError>;

/// Characters that end a symbol, keyword or number.
fn is_terminator(c: char) -> bool {
    c.is_whitespace() || matches!(c, ',' | ';' | '"' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '@' | '\\')
}

fn is_symbol_start(c: char) -> bool {
    !c.is_ascii_digit() && !is_terminator(c) && !matches!(c, ':' | '#' | '\'' | '`' | '~')
}

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    loc: Loc,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src,
            pos: 0,
            loc: Loc { line: 1, column: 1 },
        }
    }

    /// Next token with its start position. Returns [`Token::Eof`] forever
    /// once the input is exhausted.
    pub fn next_token(&mut self) -> Result<Spanned> {
        self.skip_trivia();
        let start = self.loc;
        let token = self.scan()?;
        Ok(Spanned { token, start })
    }

    /// Every remaining token, without the trailing [`Token::Eof`].
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            match self.next_token()?.token {
                Token::Eof => return Ok(tokens),
                token => tokens.push(token),
            }
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.loc.line += 1;
            self.loc.column = 1;
        } else {
            self.loc.column += 1;
        }
        Some(c)
    }

    /// Consume characters while `pred` holds and return them as a slice.
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    /// Consume up to the next terminator.
    fn atom(&mut self) -> &'a str {
        self.take_while(|c| !is_terminator(c))
    }

    fn error(&self, message: impl Into<String>) -> LexerError {
        LexerError {
            message: message.into(),
            line: self.loc.line as usize,
            column: self.loc.column as usize,
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() || c == ',' => {
                    self.bump();
                }
                Some(';') => {
                    self.take_while(|c| c != '\n');
                }
                _ => return,
            }
        }
    }

    fn scan(&mut self) -> Result<Token> {
        let Some(c) = self.peek() else {
            return Ok(Token::Eof);
        };
        let token = match c {
            '(' | ')' | '[' | ']' | '{' | '}' | '\'' | '@' | '^' => {
                self.bump();
                match c {
                    '(' => Token::Open(Delim::Paren),
                    ')' => Token::Close(Delim::Paren),
                    '[' => Token::Open(Delim::Bracket),
                    ']' => Token::Close(Delim::Bracket),
                    '{' => Token::Open(Delim::Brace),
                    '}' => Token::Close(Delim::Brace),
                    '\'' => Token::Prefix(Prefix::Quote),
                    '@' => Token::Prefix(Prefix::Deref),
                    _ => Token::Prefix(Prefix::Meta),
                }
            }
            '#' => self.dispatch()?,
            '"' => self.string()?,
            '\\' => self.character()?,
            ':' => {
                self.bump();
                let name = self.atom();
                if name.is_empty() {
                    return Err(self.error("Expected keyword name after :"));
                }
                Token::Keyword(name.to_string())
            }
            '0'..='9' => {
                let text = self.atom();
                self.number(text)?
            }
            '+' | '-' if self.rest()[1..].starts_with(|d: char| d.is_ascii_digit()) => {
                let text = self.atom();
                self.number(text)?
            }
            _ if is_symbol_start(c) => match self.atom() {
                "nil" => Token::Nil,
                "true" => Token::Bool(true),
                "false" => Token::Bool(false),
                name => Token::Symbol(name.to_string()),
            },
            _ => return Err(self.error(format!("Unexpected character: '{}'", c))),
        };
        Ok(token)
    }

    fn dispatch(&mut self) -> Result<Token> {
        self.bump();
        let token = match self.bump() {
            Some('\'') => Token::Prefix(Prefix::Var),
            Some('{') => Token::Open(Delim::SetBrace),
            Some('_') => Token::Prefix(Prefix::Discard),
            Some('#') => match self.atom() {
                "Inf" => Token::Double(f64::INFINITY),
                "-Inf" => Token::Double(f64::NEG_INFINITY),
                "NaN" => Token::Double(f64::NAN),
                other => return Err(self.error(format!("Unknown special value: ##{}", other))),
            },
            Some(c) => return Err(self.error(format!("Unknown dispatch macro: #{}", c))),
            None => return Err(self.error("Unexpected end of input after #")),
        };
        Ok(token)
    }

    fn string(&mut self) -> Result<Token> {
        self.bump();
        let mut out = String::new();
        loop {
            let c = self
                .bump()
                .ok_or_else(|| self.error("Unterminated string"))?;
            match c {
                '"' => return Ok(Token::Str(out)),
                '\\' => {
                    let escaped = self
                        .bump()
                        .ok_or_else(|| self.error("Unterminated string escape"))?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        '\\' | '"' => escaped,
                        'u' => {
                            let hex = self.take_hex4()?;
                            self.code_point(hex)?
                        }
                        other => {
                            return Err(self.error(format!("Unknown escape sequence: \\{}", other)));
                        }
                    });
                }
                c => out.push(c),
            }
        }
    }

    fn take_hex4(&mut self) -> Result<&'a str> {
        let start = self.pos;
        for _ in 0..4 {
            match self.bump() {
                Some(c) if c.is_ascii_hexdigit() => {}
                Some(c) => return Err(self.error(format!("Invalid hex digit in unicode escape: {}", c))),
                None => return Err(self.error("Unterminated unicode escape")),
            }
        }
        Ok(&self.src[start..self.pos])
    }

    fn code_point(&self, hex: &str) -> Result<char> {
        u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error(format!("Invalid unicode escape: \\u{}", hex)))
    }

    /// `\a`, `\newline`, `\λ`, or any single character such as `\(`.
    fn character(&mut self) -> Result<Token> {
        self.bump();
        let first = self
            .bump()
            .ok_or_else(|| self.error("Expected character after \\"))?;
        if !first.is_alphabetic() {
            return Ok(Token::Char(first));
        }
        let tail = self.take_while(|c| c.is_ascii_alphanumeric());
        if tail.is_empty() {
            return Ok(Token::Char(first));
        }
        let c = match (first, tail) {
            ('n', "ewline") => '\n',
            ('s', "pace") => ' ',
            ('t', "ab") => '\t',
            ('r', "eturn") => '\r',
            ('b', "ackspace") => '\x08',
            ('f', "ormfeed") => '\x0C',
            ('u', hex) if hex.len() == 4 => self.code_point(hex)?,
            _ => return Err(self.error(format!("Unknown character name: \\{}{}", first, tail))),
        };
        Ok(Token::Char(c))
    }

    fn number(&self, text: &str) -> Result<Token> {
        let (negative, unsigned) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        let invalid = || self.error(format!("Invalid number: {}", text));

        if let Some(hex) = unsigned.strip_prefix("0x").or_else(|| unsigned.strip_prefix("0X")) {
            return signed_radix(hex, 16, negative).map(Token::Int).ok_or_else(invalid);
        }
        if let Some((radix, digits)) = unsigned.split_once(['r', 'R']) {
            let radix: u32 = radix.parse().map_err(|_| invalid())?;
            if !(2..=36).contains(&radix) {
                return Err(self.error(format!("Radix must be between 2 and 36: {}", radix)));
            }
            return signed_radix(digits, radix, negative).map(Token::Int).ok_or_else(invalid);
        }
        if unsigned.contains(['.', 'e', 'E']) {
            return text.parse().map(Token::Double).map_err(|_| invalid());
        }
        if unsigned.len() > 1 && unsigned.starts_with('0') {
            return signed_radix(&unsigned[1..], 8, negative).map(Token::Int).ok_or_else(invalid);
        }
        // The signed text parses directly, which keeps i64::MIN in range.
        text.parse().map(Token::Int).map_err(|_| invalid())
    }
}

fn signed_radix(digits: &str, radix: u32, negative: bool) -> Option<i64> {
    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<Token> {
        Lexer::new(s).tokenize().unwrap()
    }

    fn sym(s: &str) -> Token {
        Token::Symbol(s.to_string())
    }

    #[test]
    fn test_delimiters_and_prefixes() {
        assert_eq!(
            tokens("( ] #{ } ' @ ^ #' #_"),
            vec![
                Token::Open(Delim::Paren),
                Token::Close(Delim::Bracket),
                Token::Open(Delim::SetBrace),
                Token::Close(Delim::Brace),
                Token::Prefix(Prefix::Quote),
                Token::Prefix(Prefix::Deref),
                Token::Prefix(Prefix::Meta),
                Token::Prefix(Prefix::Var),
                Token::Prefix(Prefix::Discard),
            ]
        );
        assert_eq!(Delim::SetBrace.closer(), Delim::Brace);
    }

    #[test]
    fn test_integers() {
        assert_eq!(
            tokens("0 42 -1 +5 0x1f -0x10 017 2r1010 -9223372036854775808"),
            vec![
                Token::Int(0),
                Token::Int(42),
                Token::Int(-1),
                Token::Int(5),
                Token::Int(31),
                Token::Int(-16),
                Token::Int(15),
                Token::Int(10),
                Token::Int(i64::MIN),
            ]
        );
        assert!(Lexer::new("99999999999999999999").tokenize().is_err());
        assert!(Lexer::new("40r1").tokenize().is_err());
    }

    #[test]
    fn test_doubles() {
        assert_eq!(
            tokens("1.5 -2.0 1e3"),
            vec![Token::Double(1.5), Token::Double(-2.0), Token::Double(1000.0)]
        );
        let special = tokens("##Inf ##-Inf ##NaN");
        assert_eq!(special[0], Token::Double(f64::INFINITY));
        assert_eq!(special[1], Token::Double(f64::NEG_INFINITY));
        assert!(matches!(special[2], Token::Double(f) if f.is_nan()));
    }

    #[test]
    fn test_chars_and_strings() {
        assert_eq!(
            tokens(r#"\a \newline \λ \( "a\"b\nA""#),
            vec![
                Token::Char('a'),
                Token::Char('\n'),
                Token::Char('λ'),
                Token::Char('('),
                Token::Str("a\"b\nA".to_string()),
            ]
        );
    }

    #[test]
    fn test_symbols_and_keywords() {
        assert_eq!(
            tokens("foo ns/bar - ->> <=> a.b/c? :kw :ns/kw nil true false"),
            vec![
                sym("foo"),
                sym("ns/bar"),
                sym("-"),
                sym("->>"),
                sym("<=>"),
                sym("a.b/c?"),
                Token::Keyword("kw".to_string()),
                Token::Keyword("ns/kw".to_string()),
                Token::Nil,
                Token::Bool(true),
                Token::Bool(false),
            ]
        );
    }

    #[test]
    fn test_trivia_is_skipped() {
        assert_eq!(
            tokens("; comment\n1, 2 ;; trailing"),
            vec![Token::Int(1), Token::Int(2)]
        );
    }

    #[test]
    fn test_token_starts() {
        let mut lexer = Lexer::new("(a\n  bc)");
        let starts: Vec<_> = std::iter::from_fn(|| {
            let t = lexer.next_token().unwrap();
            (t.token != Token::Eof).then_some((t.start.line, t.start.column))
        })
        .collect();
        assert_eq!(starts, vec![(1, 1), (1, 2), (2, 3), (2, 5)]);
    }

    #[test]
    fn test_errors_carry_position() {
        let err = Lexer::new("\n  \"open").tokenize().unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("Unterminated"));
        assert!(Lexer::new("#?").tokenize().is_err());
    }
}
