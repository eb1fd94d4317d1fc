//! Token stream interfaces.
//!
//! The binding engine never parses or renders text itself. It talks to a codec
//! through two small traits:
//!
//! - [`TokenReader`]: pull-style source yielding one [`Token`] at a time
//! - [`TokenWriter`]: push-style sink accepting tokens
//!
//! Four in-memory implementations ship with the crate:
//!
//! - [`TokenBuffer`]: records written tokens, replays them through [`BufferReader`]
//! - [`TreeReader`]: replays a [`Value`] tree as tokens
//! - [`TreeWriter`]: materializes written tokens into a [`Value`]
//!
//! ## Examples
//!
//! ```rust
//! use databind::{Token, TokenWriter, TreeWriter, Value};
//!
//! let mut writer = TreeWriter::new();
//! writer.start_object().unwrap();
//! writer.field_name("id").unwrap();
//! writer.write_token(Token::Int(7)).unwrap();
//! writer.end_object().unwrap();
//!
//! let value = writer.into_value().unwrap();
//! assert_eq!(value.get("id"), Some(&Value::from(7)));
//! ```

use num_bigint::BigInt;
use std::collections::VecDeque;
use std::fmt;

use crate::{Error, Number, ObjectMap, Result, Value};

/// One structural or scalar event of a token stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    FieldName(String),
    Null,
    Bool(bool),
    Int(i64),
    BigInt(BigInt),
    Float(f64),
    String(String),
}

impl Token {
    /// Returns `true` for tokens that carry a complete value by themselves.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            Token::StartObject
                | Token::EndObject
                | Token::StartArray
                | Token::EndArray
                | Token::FieldName(_)
        )
    }

    /// Short description used in error messages.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Token::StartObject => "start of object",
            Token::EndObject => "end of object",
            Token::StartArray => "start of array",
            Token::EndArray => "end of array",
            Token::FieldName(_) => "field name",
            Token::Null => "null",
            Token::Bool(_) => "boolean",
            Token::Int(_) | Token::BigInt(_) => "integer",
            Token::Float(_) => "float",
            Token::String(_) => "string",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::FieldName(name) => write!(f, "field name \"{}\"", name),
            Token::String(s) => write!(f, "string \"{}\"", s),
            Token::Int(i) => write!(f, "integer {}", i),
            Token::BigInt(i) => write!(f, "integer {}", i),
            Token::Float(v) => write!(f, "float {}", v),
            Token::Bool(b) => write!(f, "boolean {}", b),
            other => f.write_str(other.describe()),
        }
    }
}

/// Pull-style token source.
pub trait TokenReader {
    /// Returns the next token, or `None` once the stream is exhausted.
    fn next_token(&mut self) -> Result<Option<Token>>;
}

/// Push-style token sink.
pub trait TokenWriter {
    fn write_token(&mut self, token: Token) -> Result<()>;

    fn start_object(&mut self) -> Result<()> {
        self.write_token(Token::StartObject)
    }

    fn end_object(&mut self) -> Result<()> {
        self.write_token(Token::EndObject)
    }

    fn start_array(&mut self) -> Result<()> {
        self.write_token(Token::StartArray)
    }

    fn end_array(&mut self) -> Result<()> {
        self.write_token(Token::EndArray)
    }

    fn field_name(&mut self, name: &str) -> Result<()> {
        self.write_token(Token::FieldName(name.to_string()))
    }

    fn write_null(&mut self) -> Result<()> {
        self.write_token(Token::Null)
    }

    fn write_string(&mut self, value: &str) -> Result<()> {
        self.write_token(Token::String(value.to_string()))
    }
}

impl<R: TokenReader + ?Sized> TokenReader for &mut R {
    fn next_token(&mut self) -> Result<Option<Token>> {
        (**self).next_token()
    }
}

impl<W: TokenWriter + ?Sized> TokenWriter for &mut W {
    fn write_token(&mut self, token: Token) -> Result<()> {
        (**self).write_token(token)
    }
}

/// Records tokens in memory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TokenBuffer {
    tokens: Vec<Token>,
}

impl TokenBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    #[must_use]
    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    #[must_use]
    pub fn into_reader(self) -> BufferReader {
        BufferReader::new(self.tokens)
    }
}

impl TokenWriter for TokenBuffer {
    fn write_token(&mut self, token: Token) -> Result<()> {
        self.tokens.push(token);
        Ok(())
    }
}

/// Replays a recorded token sequence.
#[derive(Clone, Debug, Default)]
pub struct BufferReader {
    tokens: VecDeque<Token>,
}

impl BufferReader {
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        BufferReader {
            tokens: tokens.into(),
        }
    }
}

impl TokenReader for BufferReader {
    fn next_token(&mut self) -> Result<Option<Token>> {
        Ok(self.tokens.pop_front())
    }
}

enum TreeFrame {
    Array(std::vec::IntoIter<Value>),
    Object(indexmap::map::IntoIter<String, Value>, Option<Value>),
}

/// Replays a [`Value`] tree as a token stream.
pub struct TreeReader {
    root: Option<Value>,
    stack: Vec<TreeFrame>,
}

impl TreeReader {
    #[must_use]
    pub fn new(value: Value) -> Self {
        TreeReader {
            root: Some(value),
            stack: Vec::new(),
        }
    }

    fn emit(&mut self, value: Value) -> Token {
        match value {
            Value::Null => Token::Null,
            Value::Bool(b) => Token::Bool(b),
            Value::Number(Number::Integer(i)) => Token::Int(i),
            Value::Number(Number::Float(f)) => Token::Float(f),
            Value::BigInt(n) => Token::BigInt(n),
            Value::String(s) => Token::String(s),
            Value::Array(items) => {
                self.stack.push(TreeFrame::Array(items.into_iter()));
                Token::StartArray
            }
            Value::Object(map) => {
                self.stack.push(TreeFrame::Object(map.into_iter(), None));
                Token::StartObject
            }
        }
    }
}

impl TokenReader for TreeReader {
    fn next_token(&mut self) -> Result<Option<Token>> {
        if let Some(root) = self.root.take() {
            return Ok(Some(self.emit(root)));
        }
        let next = match self.stack.last_mut() {
            None => return Ok(None),
            Some(TreeFrame::Array(items)) => match items.next() {
                Some(item) => Ok(item),
                None => Err(Token::EndArray),
            },
            Some(TreeFrame::Object(entries, pending)) => match pending.take() {
                Some(value) => Ok(value),
                None => match entries.next() {
                    Some((key, value)) => {
                        *pending = Some(value);
                        return Ok(Some(Token::FieldName(key)));
                    }
                    None => Err(Token::EndObject),
                },
            },
        };
        match next {
            Ok(value) => Ok(Some(self.emit(value))),
            Err(end) => {
                self.stack.pop();
                Ok(Some(end))
            }
        }
    }
}

enum TreeBuilderFrame {
    Array(Vec<Value>),
    Object(ObjectMap, Option<String>),
}

/// Builds a [`Value`] tree from written tokens.
#[derive(Default)]
pub struct TreeWriter {
    stack: Vec<TreeBuilderFrame>,
    result: Option<Value>,
}

impl TreeWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the completed tree.
    ///
    /// # Errors
    ///
    /// Fails if no value was written or a container is still open.
    pub fn into_value(self) -> Result<Value> {
        if !self.stack.is_empty() {
            return Err(Error::codec("incomplete token stream: unclosed container"));
        }
        self.result
            .ok_or_else(|| Error::codec("no value written to tree writer"))
    }

    fn attach(&mut self, value: Value) -> Result<()> {
        match self.stack.last_mut() {
            None => {
                if self.result.is_some() {
                    return Err(Error::codec("tree writer already holds a root value"));
                }
                self.result = Some(value);
                Ok(())
            }
            Some(TreeBuilderFrame::Array(items)) => {
                items.push(value);
                Ok(())
            }
            Some(TreeBuilderFrame::Object(map, pending)) => match pending.take() {
                Some(key) => {
                    map.insert(key, value);
                    Ok(())
                }
                None => Err(Error::codec("object value written without a field name")),
            },
        }
    }
}

impl TokenWriter for TreeWriter {
    fn write_token(&mut self, token: Token) -> Result<()> {
        match token {
            Token::StartObject => {
                self.stack
                    .push(TreeBuilderFrame::Object(ObjectMap::new(), None));
                Ok(())
            }
            Token::StartArray => {
                self.stack.push(TreeBuilderFrame::Array(Vec::new()));
                Ok(())
            }
            Token::EndObject => match self.stack.pop() {
                Some(TreeBuilderFrame::Object(map, None)) => self.attach(Value::Object(map)),
                _ => Err(Error::codec("unbalanced end of object")),
            },
            Token::EndArray => match self.stack.pop() {
                Some(TreeBuilderFrame::Array(items)) => self.attach(Value::Array(items)),
                _ => Err(Error::codec("unbalanced end of array")),
            },
            Token::FieldName(name) => match self.stack.last_mut() {
                Some(TreeBuilderFrame::Object(_, pending @ None)) => {
                    *pending = Some(name);
                    Ok(())
                }
                _ => Err(Error::codec("field name outside of an object")),
            },
            Token::Null => self.attach(Value::Null),
            Token::Bool(b) => self.attach(Value::Bool(b)),
            Token::Int(i) => self.attach(Value::Number(Number::Integer(i))),
            Token::BigInt(n) => self.attach(Value::BigInt(n)),
            Token::Float(f) => self.attach(Value::Number(Number::Float(f))),
            Token::String(s) => self.attach(Value::String(s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(mut reader: impl TokenReader) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = reader.next_token().unwrap() {
            tokens.push(token);
        }
        tokens
    }

    #[test]
    fn test_tree_reader_replays_structure() {
        let value: Value = serde_json::from_str(r#"{"a":[1,{}],"b":null}"#).unwrap();
        let tokens = drain(TreeReader::new(value));
        assert_eq!(
            tokens,
            vec![
                Token::StartObject,
                Token::FieldName("a".to_string()),
                Token::StartArray,
                Token::Int(1),
                Token::StartObject,
                Token::EndObject,
                Token::EndArray,
                Token::FieldName("b".to_string()),
                Token::Null,
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn test_tree_writer_rebuilds_replayed_tokens() {
        let value: Value =
            serde_json::from_str(r#"{"name":"n","items":[[],[2.5,"x"]],"ok":true}"#).unwrap();
        let mut writer = TreeWriter::new();
        for token in drain(TreeReader::new(value.clone())) {
            writer.write_token(token).unwrap();
        }
        assert_eq!(writer.into_value().unwrap(), value);
    }

    #[test]
    fn test_tree_writer_rejects_unbalanced() {
        let mut writer = TreeWriter::new();
        writer.start_array().unwrap();
        assert!(writer.end_object().is_err());
    }

    #[test]
    fn test_buffer_round_trip() {
        let mut buffer = TokenBuffer::new();
        buffer.start_array().unwrap();
        buffer.write_string("x").unwrap();
        buffer.end_array().unwrap();
        let tokens = drain(buffer.clone().into_reader());
        assert_eq!(tokens, buffer.into_tokens());
    }
}
