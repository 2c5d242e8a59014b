//! Incremental extraction of `id` and `status` from a response envelope.
//!
//! The scanner reads a JSON object one byte at a time and keeps only the two
//! top-level fields the call engine needs. Every other value is skipped in place,
//! including nested objects and arrays, so a response of any size is handled
//! with a fixed amount of memory.

use super::Error;
use crate::network::Transport;
use crate::network::application::mqtt::MqttStream;
use heapless::Vec;

/// Longest key kept for comparison; longer keys can never match.
const KEY_CAPACITY: usize = 8;

/// Deepest nesting accepted inside a skipped value.
const MAX_DEPTH: usize = 16;

/// A source of JSON bytes.
pub(crate) trait ByteSource {
    fn next_byte(&mut self) -> Result<u8, Error>;
}

/// Reads the payload of one PUBLISH packet, never past its end.
pub(crate) struct PacketReader<'s, T: Transport> {
    stream: &'s mut MqttStream<T>,
    remaining: usize,
}

impl<'s, T: Transport> PacketReader<'s, T> {
    pub(crate) fn new(stream: &'s mut MqttStream<T>, remaining: usize) -> Self {
        Self { stream, remaining }
    }

    /// Payload bytes not consumed by the scanner.
    pub(crate) fn remaining(&self) -> usize {
        self.remaining
    }
}

impl<T: Transport> ByteSource for PacketReader<'_, T> {
    fn next_byte(&mut self) -> Result<u8, Error> {
        if self.remaining == 0 {
            return Err(Error::JsonInvalid);
        }
        let byte = self.stream.decode_u8()?;
        self.remaining -= 1;
        Ok(byte)
    }
}

/// The fields of a response envelope the call engine cares about.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Envelope {
    pub id: Option<i16>,
    pub status: Option<i16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Id,
    Status,
    Other,
}

pub(crate) struct Scanner<S> {
    source: S,
    peeked: Option<u8>,
}

impl<S: ByteSource> Scanner<S> {
    pub(crate) fn new(source: S) -> Self {
        Self {
            source,
            peeked: None,
        }
    }

    pub(crate) fn into_inner(self) -> S {
        self.source
    }

    /// Read one top-level object and return its `id` and `status`.
    pub(crate) fn scan_envelope(&mut self) -> Result<Envelope, Error> {
        let mut envelope = Envelope::default();
        self.expect_non_ws(b'{')?;
        if self.peek_non_ws()? == b'}' {
            self.next()?;
            return Ok(envelope);
        }
        loop {
            self.expect_non_ws(b'"')?;
            let key = self.read_key()?;
            self.expect_non_ws(b':')?;
            match key {
                Key::Status => {
                    self.skip_ws()?;
                    envelope.status = Some(self.read_i16()?);
                }
                Key::Id => {
                    // Ours are decimal i16 values inside a string; anything else
                    // belongs to someone else and never matches.
                    envelope.id = if self.peek_non_ws()? == b'"' {
                        self.next()?;
                        self.read_id_string()?
                    } else {
                        self.skip_value()?;
                        None
                    };
                }
                Key::Other => self.skip_value()?,
            }
            match self.next_non_ws()? {
                b',' => continue,
                b'}' => return Ok(envelope),
                _ => return Err(Error::JsonInvalid),
            }
        }
    }

    fn next(&mut self) -> Result<u8, Error> {
        match self.peeked.take() {
            Some(byte) => Ok(byte),
            None => self.source.next_byte(),
        }
    }

    fn peek(&mut self) -> Result<u8, Error> {
        match self.peeked {
            Some(byte) => Ok(byte),
            None => {
                let byte = self.source.next_byte()?;
                self.peeked = Some(byte);
                Ok(byte)
            }
        }
    }

    fn skip_ws(&mut self) -> Result<(), Error> {
        while is_ws(self.peek()?) {
            self.next()?;
        }
        Ok(())
    }

    fn peek_non_ws(&mut self) -> Result<u8, Error> {
        self.skip_ws()?;
        self.peek()
    }

    fn next_non_ws(&mut self) -> Result<u8, Error> {
        self.skip_ws()?;
        self.next()
    }

    fn expect(&mut self, byte: u8) -> Result<(), Error> {
        if self.next()? == byte {
            Ok(())
        } else {
            Err(Error::JsonInvalid)
        }
    }

    fn expect_non_ws(&mut self, byte: u8) -> Result<(), Error> {
        self.skip_ws()?;
        self.expect(byte)
    }

    /// Read the rest of a key whose opening quote was consumed.
    fn read_key(&mut self) -> Result<Key, Error> {
        let mut key: Vec<u8, KEY_CAPACITY> = Vec::new();
        let mut exact = true;
        loop {
            match self.next()? {
                b'"' => break,
                b'\\' => {
                    self.next()?;
                    exact = false;
                }
                byte if byte < 0x20 => return Err(Error::JsonInvalid),
                byte => {
                    if key.push(byte).is_err() {
                        exact = false;
                    }
                }
            }
        }
        Ok(match &key[..] {
            b"id" if exact => Key::Id,
            b"status" if exact => Key::Status,
            _ => Key::Other,
        })
    }

    fn read_i16(&mut self) -> Result<i16, Error> {
        let negative = self.peek()? == b'-';
        if negative {
            self.next()?;
        }
        let mut value: i32 = 0;
        let mut digits = 0;
        while self.peek()?.is_ascii_digit() {
            let digit = (self.next()? - b'0') as i32;
            value = value * 10 + digit;
            if value > i16::MAX as i32 + 1 {
                return Err(Error::JsonInvalid);
            }
            digits += 1;
        }
        if digits == 0 {
            return Err(Error::JsonInvalid);
        }
        let value = if negative { -value } else { value };
        i16::try_from(value).map_err(|_| Error::JsonInvalid)
    }

    /// Read the rest of a string whose opening quote was consumed, returning its
    /// value if it is a decimal `i16`.
    fn read_id_string(&mut self) -> Result<Option<i16>, Error> {
        let mut value: i32 = 0;
        let mut negative = false;
        let mut digits = 0;
        let mut numeric = true;
        loop {
            match self.next()? {
                b'"' => break,
                b'\\' => {
                    self.next()?;
                    numeric = false;
                }
                byte if byte < 0x20 => return Err(Error::JsonInvalid),
                b'-' if digits == 0 && !negative => negative = true,
                byte @ b'0'..=b'9' if numeric => {
                    value = value * 10 + (byte - b'0') as i32;
                    if value > i16::MAX as i32 + 1 {
                        numeric = false;
                    }
                    digits += 1;
                }
                _ => numeric = false,
            }
        }
        if !numeric || digits == 0 {
            return Ok(None);
        }
        let value = if negative { -value } else { value };
        Ok(i16::try_from(value).ok())
    }

    fn skip_value(&mut self) -> Result<(), Error> {
        match self.peek_non_ws()? {
            b'"' => {
                self.next()?;
                self.skip_string_body()
            }
            b'{' | b'[' => self.skip_container(),
            b't' => self.skip_literal(b"true"),
            b'f' => self.skip_literal(b"false"),
            b'n' => self.skip_literal(b"null"),
            b'-' | b'0'..=b'9' => self.skip_number(),
            _ => Err(Error::JsonInvalid),
        }
    }

    fn skip_string_body(&mut self) -> Result<(), Error> {
        loop {
            match self.next()? {
                b'"' => return Ok(()),
                b'\\' => {
                    self.next()?;
                }
                byte if byte < 0x20 => return Err(Error::JsonInvalid),
                _ => {}
            }
        }
    }

    /// Skip an object or array, checking that brackets pair up.
    fn skip_container(&mut self) -> Result<(), Error> {
        let mut closers: Vec<u8, MAX_DEPTH> = Vec::new();
        loop {
            match self.next()? {
                b'{' => closers.push(b'}').map_err(|_| Error::JsonInvalid)?,
                b'[' => closers.push(b']').map_err(|_| Error::JsonInvalid)?,
                byte @ (b'}' | b']') => {
                    if closers.pop() != Some(byte) {
                        return Err(Error::JsonInvalid);
                    }
                    if closers.is_empty() {
                        return Ok(());
                    }
                }
                b'"' => self.skip_string_body()?,
                _ => {}
            }
        }
    }

    fn skip_literal(&mut self, literal: &[u8]) -> Result<(), Error> {
        for &expected in literal {
            self.expect(expected)?;
        }
        Ok(())
    }

    fn skip_number(&mut self) -> Result<(), Error> {
        self.next()?;
        while matches!(self.peek()?, b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-') {
            self.next()?;
        }
        Ok(())
    }
}

fn is_ws(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}
