//! Field and record tokenizer for the Storage Analytics log format.
//!
//! Records are separated by `\n` and fields by `;`. A field is either
//! unquoted, in which case it may not contain `;`, `\n` or `"`, or wrapped in
//! `"` quotes, in which case delimiters inside the quotes are taken verbatim.
//! A closing quote must be immediately followed by a delimiter. A field with
//! zero-length content is an absent value and reads as `None`, even in a
//! column that is normally quoted.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::fmt::Display;
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use url::Url;
use uuid::Uuid;

const FIELD_DELIMITER: u8 = b';';
const RECORD_DELIMITER: u8 = b'\n';
const QUOTE: u8 = b'"';

/// One byte of look-ahead over the underlying stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookahead {
    /// Nothing buffered; the next byte must come from the stream
    Empty,
    /// A byte was peeked and not yet consumed
    Byte(u8),
    /// The stream is exhausted
    Eof,
}

/// Reads one field or record delimiter at a time from a byte stream.
///
/// The reader tracks whether the next field is the first of its record; every
/// other field is preceded by a field delimiter that the read consumes. The
/// delimiter ending a field is left in place so the following read, or
/// [`end_current_record`](Self::end_current_record), can consume it.
pub struct DelimitedRecordReader<R> {
    inner: R,
    lookahead: Lookahead,
    first_field: bool,
}

impl<R> DelimitedRecordReader<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Wrap a buffered byte stream.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            lookahead: Lookahead::Empty,
            first_field: true,
        }
    }

    /// Read an unquoted field as text.
    pub async fn read_string(&mut self) -> Result<Option<String>> {
        self.read_field(false).await
    }

    /// Read a quoted field as text, without the surrounding quotes.
    pub async fn read_quoted_string(&mut self) -> Result<Option<String>> {
        self.read_field(true).await
    }

    pub async fn read_bool(&mut self) -> Result<Option<bool>> {
        self.read_parsed("boolean").await
    }

    pub async fn read_i32(&mut self) -> Result<Option<i32>> {
        self.read_parsed("integer").await
    }

    pub async fn read_i64(&mut self) -> Result<Option<i64>> {
        self.read_parsed("long").await
    }

    pub async fn read_f64(&mut self) -> Result<Option<f64>> {
        self.read_parsed("double").await
    }

    pub async fn read_uuid(&mut self) -> Result<Option<Uuid>> {
        self.read_parsed("uuid").await
    }

    /// Read an unquoted field as a UTC timestamp using a chrono format string.
    pub async fn read_date(&mut self, format: &str) -> Result<Option<DateTime<Utc>>> {
        match self.read_string().await? {
            Some(text) => NaiveDateTime::parse_from_str(&text, format)
                .map(|naive| Some(naive.and_utc()))
                .map_err(|e| Error::format(format!("invalid date {text:?}: {e}"))),
            None => Ok(None),
        }
    }

    /// Read a quoted, HTML-entity-encoded field as a URL.
    pub async fn read_uri(&mut self) -> Result<Option<Url>> {
        match self.read_quoted_string().await? {
            Some(text) => {
                let unescaped = html_escape::decode_html_entities(&text);
                Url::parse(&unescaped)
                    .map(Some)
                    .map_err(|e| Error::format(format!("invalid url {unescaped:?}: {e}")))
            }
            None => Ok(None),
        }
    }

    /// Whether another field follows in the current record.
    pub async fn has_more_fields_in_record(&mut self) -> Result<bool> {
        Ok(self.peek().await? == Some(FIELD_DELIMITER))
    }

    /// Consume the record delimiter and start a new record.
    pub async fn end_current_record(&mut self) -> Result<()> {
        match self.next_byte().await? {
            Some(RECORD_DELIMITER) => {
                self.first_field = true;
                Ok(())
            }
            Some(other) => Err(Error::format(format!(
                "expected end of record, found {:?}",
                other as char
            ))),
            None => Err(Error::format(
                "unexpected end of stream, expected end of record",
            )),
        }
    }

    /// Whether the stream has no further bytes. The peeked byte stays buffered.
    pub async fn is_end_of_file(&mut self) -> Result<bool> {
        Ok(self.peek().await?.is_none())
    }

    async fn read_parsed<T>(&mut self, kind: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.read_string().await? {
            Some(text) => text
                .parse()
                .map(Some)
                .map_err(|e| Error::format(format!("invalid {kind} {text:?}: {e}"))),
            None => Ok(None),
        }
    }

    async fn read_field(&mut self, quoted: bool) -> Result<Option<String>> {
        if self.first_field {
            self.first_field = false;
        } else {
            match self.next_byte().await? {
                Some(FIELD_DELIMITER) => {}
                Some(other) => {
                    return Err(Error::format(format!(
                        "expected field delimiter, found {:?}",
                        other as char
                    )))
                }
                None => {
                    return Err(Error::format(
                        "unexpected end of stream, expected field delimiter",
                    ))
                }
            }
        }

        let content = if quoted {
            match self.read_quoted_content().await? {
                Some(content) => content,
                None => return Ok(None),
            }
        } else {
            let content = self.read_unquoted_content().await?;
            if content.is_empty() {
                return Ok(None);
            }
            content
        };

        String::from_utf8(content)
            .map(Some)
            .map_err(|e| Error::format(format!("field is not valid UTF-8: {e}")))
    }

    async fn read_unquoted_content(&mut self) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        loop {
            match self.peek().await? {
                Some(FIELD_DELIMITER | RECORD_DELIMITER) => return Ok(content),
                Some(QUOTE) => {
                    return Err(Error::format("unexpected quote in unquoted field"));
                }
                Some(byte) => {
                    self.lookahead = Lookahead::Empty;
                    content.push(byte);
                }
                None => {
                    return Err(Error::format(
                        "unexpected end of stream inside unquoted field",
                    ))
                }
            }
        }
    }

    /// `None` means the field was empty before any quote was seen.
    async fn read_quoted_content(&mut self) -> Result<Option<Vec<u8>>> {
        match self.peek().await? {
            Some(FIELD_DELIMITER | RECORD_DELIMITER) => return Ok(None),
            Some(QUOTE) => self.lookahead = Lookahead::Empty,
            Some(other) => {
                return Err(Error::format(format!(
                    "expected opening quote, found {:?}",
                    other as char
                )))
            }
            None => {
                return Err(Error::format(
                    "unexpected end of stream, expected quoted field",
                ))
            }
        }

        let mut content = Vec::new();
        loop {
            match self.next_byte().await? {
                Some(QUOTE) => break,
                Some(byte) => content.push(byte),
                None => {
                    return Err(Error::format(
                        "unexpected end of stream inside quoted field",
                    ))
                }
            }
        }

        match self.peek().await? {
            Some(FIELD_DELIMITER | RECORD_DELIMITER) => Ok(Some(content)),
            Some(other) => Err(Error::format(format!(
                "unexpected {:?} after closing quote",
                other as char
            ))),
            None => Err(Error::format(
                "unexpected end of stream after closing quote",
            )),
        }
    }

    async fn peek(&mut self) -> Result<Option<u8>> {
        if self.lookahead == Lookahead::Empty {
            self.lookahead = match self.pull().await? {
                Some(byte) => Lookahead::Byte(byte),
                None => Lookahead::Eof,
            };
        }
        Ok(match self.lookahead {
            Lookahead::Byte(byte) => Some(byte),
            _ => None,
        })
    }

    async fn next_byte(&mut self) -> Result<Option<u8>> {
        match self.lookahead {
            Lookahead::Byte(byte) => {
                self.lookahead = Lookahead::Empty;
                Ok(Some(byte))
            }
            Lookahead::Eof => Ok(None),
            Lookahead::Empty => self.pull().await,
        }
    }

    async fn pull(&mut self) -> Result<Option<u8>> {
        let byte = self.inner.fill_buf().await?.first().copied();
        if byte.is_some() {
            self.inner.consume(1);
        }
        Ok(byte)
    }
}
