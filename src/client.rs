use std::io::{BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};

use serde::Deserialize;
use serde_json::de::IoRead;
use serde_json::Deserializer;

use crate::common::{Request, Response};
use crate::{KeyvError, Result};

/// A blocking client for a [`KeyvServer`](crate::KeyvServer).
///
/// Speaks the raw adapter protocol: keys are sent exactly as given.
pub struct KeyvClient {
    reader: Deserializer<IoRead<TcpStream>>,
    writer: BufWriter<TcpStream>,
}

impl KeyvClient {
    /// Connects to the server at the given address.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let reader_stream = TcpStream::connect(addr)?;
        let writer_stream = reader_stream.try_clone()?;
        Ok(Self {
            reader: Deserializer::from_reader(reader_stream),
            writer: BufWriter::new(writer_stream),
        })
    }

    /// Asks whether `key` exists.
    pub fn has(&mut self, key: String) -> Result<bool> {
        match self.call(Request::Has { key })? {
            Response::Bool(found) => Ok(found),
            other => unexpected(other),
        }
    }

    /// Gets the raw value for `key`.
    pub fn get(&mut self, key: String) -> Result<Option<String>> {
        match self.call(Request::Get { key })? {
            Response::Ok(value) => Ok(value),
            other => unexpected(other),
        }
    }

    /// Stores a raw value under `key`.
    pub fn set(&mut self, key: String, value: String) -> Result<()> {
        self.call_unit(Request::Set { key, value })
    }

    /// Removes `key`.
    pub fn remove(&mut self, key: String) -> Result<()> {
        self.call_unit(Request::Remove { key })
    }

    /// Removes every key starting with `prefix`.
    pub fn clear(&mut self, prefix: String) -> Result<()> {
        self.call_unit(Request::Clear { prefix })
    }

    /// Lists every key on the server's backend.
    pub fn keys(&mut self) -> Result<Vec<String>> {
        match self.call(Request::Keys)? {
            Response::Keys(keys) => Ok(keys),
            other => unexpected(other),
        }
    }

    fn call_unit(&mut self, request: Request) -> Result<()> {
        match self.call(request)? {
            Response::Ok(_) => Ok(()),
            other => unexpected(other),
        }
    }

    /// Sends one request and reads its response. Server-side failures
    /// come back as [`KeyvError::StringError`].
    fn call(&mut self, request: Request) -> Result<Response> {
        serde_json::to_writer(&mut self.writer, &request)?;
        self.writer.flush()?;

        match Response::deserialize(&mut self.reader)? {
            Response::Err(msg) => Err(KeyvError::StringError(msg)),
            response => Ok(response),
        }
    }
}

fn unexpected<T>(response: Response) -> Result<T> {
    Err(KeyvError::StringError(format!(
        "Unexpected response: {:?}",
        response
    )))
}
