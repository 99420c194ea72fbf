// coldstart-parser - Reader for bootstrap source
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Recursive descent reader.
//!
//! Converts tokens into value trees allocated in a [`Heap`]. List forms get
//! their source span recorded in the heap so the analyzer can attach
//! positions to the expressions it builds.

use std::fmt;
use std::sync::Arc;

use crate::expr::Position;
use crate::heap::{Heap, HeapError};
use crate::lexer::{Delim, Lexer, LexerError, Loc, Prefix, Spanned, Token};
use crate::symbol::{Keyword, Symbol};
use crate::value::{Value, ValueId};

/// Parser error with position information.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at {}:{}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for ParseError {}

impl From<LexerError> for ParseError {
    fn from(e: LexerError) -> Self {
        ParseError {
            message: e.message,
            line: e.line,
            column: e.column,
        }
    }
}

enum MetaShape {
    Flag,
    Tag,
    Map,
    Invalid(&'static str),
}

/// Reads forms from source text into a heap.
pub struct Parser<'a, 'h> {
    lexer: Lexer<'a>,
    heap: &'h mut Heap,
    file: Option<Arc<str>>,
    current: Spanned,
}

impl<'a, 'h> Parser<'a, 'h> {
    pub fn new(source: &'a str, heap: &'h mut Heap) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token()?;
        Ok(Parser {
            lexer,
            heap,
            file: None,
            current,
        })
    }

    /// Tag recorded positions with a file name.
    #[must_use]
    pub fn with_file(mut self, file: &str) -> Self {
        self.file = Some(Arc::from(file));
        self
    }

    /// Parse the next top-level form, or `None` at end of input.
    pub fn parse(&mut self) -> Result<Option<ValueId>, ParseError> {
        self.skip_discards()?;
        if self.current.token == Token::Eof {
            return Ok(None);
        }
        self.parse_form().map(Some)
    }

    pub fn parse_all(&mut self) -> Result<Vec<ValueId>, ParseError> {
        let mut forms = Vec::new();
        while let Some(form) = self.parse()? {
            forms.push(form);
        }
        Ok(forms)
    }

    /// Step past the current token, returning it.
    fn bump(&mut self) -> Result<Token, ParseError> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next).token)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: self.current.start.line as usize,
            column: self.current.start.column as usize,
        }
    }

    fn heap_error(&self, e: HeapError) -> ParseError {
        self.error(e.to_string())
    }

    fn skip_discards(&mut self) -> Result<(), ParseError> {
        while self.current.token == Token::Prefix(Prefix::Discard) {
            self.bump()?;
            self.parse_form()?;
        }
        Ok(())
    }

    fn parse_form(&mut self) -> Result<ValueId, ParseError> {
        self.skip_discards()?;
        let id = match self.current.token.clone() {
            Token::Open(delim) => return self.parse_collection(delim),
            Token::Prefix(prefix) => return self.parse_prefixed(prefix),
            token @ Token::Close(_) => return Err(self.error(format!("Unexpected '{}'", token))),
            Token::Eof => return Err(self.error("Unexpected end of input")),
            Token::Nil => self.heap.nil(),
            Token::Bool(b) => self.heap.boolean(b),
            Token::Int(n) => self.heap.int(n),
            Token::Double(n) => self.heap.double(n),
            Token::Char(c) => self.heap.char(c),
            Token::Str(s) => self.heap.string(&s),
            Token::Symbol(s) => self.heap.symbol(Symbol::parse(&s)),
            Token::Keyword(s) => self.heap.keyword(Keyword::parse(&s)),
        };
        self.bump()?;
        Ok(id)
    }

    /// Read the elements of an opened collection and its closing delimiter.
    /// Returns the elements and the position of the closer.
    fn parse_elements(&mut self, open: Delim) -> Result<(Vec<ValueId>, Loc), ParseError> {
        self.bump()?;
        let close = Token::Close(open.closer());
        let mut items = Vec::new();
        loop {
            self.skip_discards()?;
            if self.current.token == close {
                let end = self.current.start;
                self.bump()?;
                return Ok((items, end));
            }
            if self.current.token == Token::Eof {
                return Err(self.error(format!("Expected {}, found {}", close, Token::Eof)));
            }
            items.push(self.parse_form()?);
        }
    }

    fn parse_collection(&mut self, open: Delim) -> Result<ValueId, ParseError> {
        let start = self.current.start;
        let (items, end) = self.parse_elements(open)?;
        match open {
            Delim::Paren => {
                let list = self.heap.list(&items);
                self.heap.set_form_position(
                    list,
                    Position {
                        file: self.file.clone(),
                        start_line: start.line,
                        start_column: start.column,
                        end_line: end.line,
                        end_column: end.column,
                    },
                );
                Ok(list)
            }
            Delim::Bracket => Ok(self.heap.vector(&items)),
            Delim::Brace => {
                if items.len() % 2 != 0 {
                    return Err(self.error("Map literal must contain an even number of forms"));
                }
                let pairs: Vec<_> = items.chunks_exact(2).map(|p| (p[0], p[1])).collect();
                self.heap.map(&pairs).map_err(|e| self.heap_error(e))
            }
            Delim::SetBrace => self.heap.set(&items).map_err(|e| self.heap_error(e)),
        }
    }

    /// `'x` => `(quote x)`, `@x` => `(deref x)`, `#'x` => `(var x)`.
    fn parse_prefixed(&mut self, prefix: Prefix) -> Result<ValueId, ParseError> {
        let head = match prefix {
            Prefix::Quote => "quote",
            Prefix::Deref => "deref",
            Prefix::Var => "var",
            Prefix::Meta => return self.parse_meta(),
            Prefix::Discard => return Err(self.error("Discard with nothing to discard")),
        };
        self.bump()?;
        let form = self.parse_form()?;
        let head = self.heap.symbol(Symbol::new(head));
        Ok(self.heap.list(&[head, form]))
    }

    fn parse_meta(&mut self) -> Result<ValueId, ParseError> {
        self.bump()?;
        let raw = self.parse_form()?;

        // ^:kw => {:kw true}, ^Sym / ^"Str" => {:tag ...}, ^{...} as is
        let shape = match self.heap.value(raw) {
            Value::Keyword(_) => MetaShape::Flag,
            Value::Symbol(_) | Value::String(_) => MetaShape::Tag,
            Value::ArrayMap(_) | Value::HashMap(_) => MetaShape::Map,
            other => MetaShape::Invalid(other.kind_name()),
        };
        let meta = match shape {
            MetaShape::Flag => {
                let t = self.heap.boolean(true);
                self.heap.array_map(&[(raw, t)])
            }
            MetaShape::Tag => {
                let tag = self.heap.keyword(Keyword::new("tag"));
                self.heap.array_map(&[(tag, raw)])
            }
            MetaShape::Map => raw,
            MetaShape::Invalid(kind) => {
                return Err(self.error(format!(
                    "Metadata must be Symbol, Keyword, String or Map, got {}",
                    kind
                )));
            }
        };

        let form = self.parse_form()?;
        if !matches!(self.heap.value(form), Value::Symbol(_)) {
            let head = self.heap.symbol(Symbol::new("with-meta"));
            return Ok(self.heap.list(&[head, form, meta]));
        }
        let merged = match self.heap.symbol_meta(form) {
            Some(inner) => {
                let mut pairs = self.heap.map_entries(meta).map_err(|e| self.heap_error(e))?;
                pairs.extend(self.heap.map_entries(inner).map_err(|e| self.heap_error(e))?);
                self.heap.map(&pairs).map_err(|e| self.heap_error(e))?
            }
            None => meta,
        };
        self.heap.set_symbol_meta(form, merged);
        Ok(form)
    }
}

/// Read every form of `source` into `heap`.
pub fn read_all(source: &str, heap: &mut Heap) -> Result<Vec<ValueId>, ParseError> {
    Parser::new(source, heap)?.parse_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_one(source: &str) -> (Heap, ValueId) {
        let mut heap = Heap::new();
        let forms = read_all(source, &mut heap).unwrap();
        assert_eq!(forms.len(), 1, "expected one form from {:?}", source);
        (heap, forms[0])
    }

    #[test]
    fn test_scalars() {
        let (heap, id) = read_one("42");
        assert_eq!(heap.value(id), &Value::Int(42));
        let (heap, id) = read_one("\"hi\"");
        assert_eq!(heap.value(id), &Value::String(Arc::from("hi")));
        let (heap, id) = read_one("nil");
        assert_eq!(heap.value(id), &Value::Nil);
    }

    #[test]
    fn test_list_elements_and_position() {
        let (heap, id) = read_one("\n  (def x\n 42)");
        let items = heap.list_elements(id).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(heap.value(items[0]).as_symbol(), Some(&Symbol::new("def")));
        let pos = heap.form_position(id).unwrap();
        assert_eq!((pos.start_line, pos.start_column), (2, 3));
        assert_eq!((pos.end_line, pos.end_column), (3, 4));
    }

    #[test]
    fn test_quote_expands() {
        let (heap, id) = read_one("'(1 2)");
        let items = heap.list_elements(id).unwrap();
        assert_eq!(heap.value(items[0]).as_symbol(), Some(&Symbol::new("quote")));
        assert_eq!(heap.list_elements(items[1]).unwrap().len(), 2);
    }

    #[test]
    fn test_collections() {
        let (heap, id) = read_one("[1 #_2 3]");
        assert_eq!(heap.vector_elements(id).unwrap().len(), 2);
        let (heap, id) = read_one("{:a 1 :b 2}");
        assert_eq!(heap.map_entries(id).unwrap().len(), 2);
        let (heap, id) = read_one("#{1 2 3}");
        assert_eq!(heap.set_elements(id).unwrap().len(), 3);
    }

    #[test]
    fn test_odd_map_is_an_error() {
        let mut heap = Heap::new();
        assert!(read_all("{:a}", &mut heap).is_err());
    }

    #[test]
    fn test_symbol_meta_goes_to_side_table() {
        let (heap, id) = read_one("^:private ^:dynamic x");
        let meta = heap.symbol_meta(id).unwrap();
        assert_eq!(heap.map_entries(meta).unwrap().len(), 2);
    }

    #[test]
    fn test_collection_meta_expands_to_with_meta() {
        let (heap, id) = read_one("^{:k 1} [1]");
        let items = heap.list_elements(id).unwrap();
        assert_eq!(heap.value(items[0]).as_symbol(), Some(&Symbol::new("with-meta")));
        assert!(matches!(heap.value(items[1]), Value::Vector(_)));
    }

    #[test]
    fn test_unbalanced() {
        let mut heap = Heap::new();
        let err = read_all("(a b", &mut heap).unwrap_err();
        assert!(err.message.contains("Expected )"));
        assert!(read_all(")", &mut heap).is_err());
    }
}
