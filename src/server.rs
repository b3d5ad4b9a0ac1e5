use std::io::{BufWriter, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;

use log::{debug, error, info};
use serde_json::Deserializer;

use crate::adapters::Adapter;
use crate::common::{Request, Response};
use crate::thread_pool::ThreadPool;
use crate::Result;

/// Serves an [`Adapter`] to remote `tcp://` clients.
///
/// Generic over the thread pool `P` that handles connections.
pub struct KeyvServer<P: ThreadPool> {
    adapter: Arc<dyn Adapter>,
    pool: P,
}

impl<P: ThreadPool> KeyvServer<P> {
    /// Creates a `KeyvServer` exposing `adapter`, handling connections on `pool`.
    pub fn new(adapter: Arc<dyn Adapter>, pool: P) -> Self {
        Self { adapter, pool }
    }

    /// Binds `addr` and serves connections until the listener fails.
    pub fn run(&self, addr: impl ToSocketAddrs) -> Result<()> {
        self.serve(TcpListener::bind(addr)?)
    }

    /// Serves connections accepted from an already bound listener.
    pub fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("Accepting connections on {}", listener.local_addr()?);
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let adapter = Arc::clone(&self.adapter);
                    self.pool.spawn(move || {
                        if let Err(e) = handle_connection(adapter.as_ref(), stream) {
                            error!("Error handling connection: {}", e);
                        }
                    });
                }
                Err(e) => error!("Connection failed: {}", e),
            }
        }
        Ok(())
    }
}

fn handle_connection(adapter: &dyn Adapter, stream: TcpStream) -> Result<()> {
    let peer_addr = stream.peer_addr()?;
    debug!("Accepted connection from {}", peer_addr);

    let mut writer = BufWriter::new(&stream);
    let requests = Deserializer::from_reader(&stream).into_iter::<Request>();

    for request in requests {
        let request = request?;
        debug!("Received request from {}: {:?}", peer_addr, request);

        let response = dispatch(adapter, request);
        serde_json::to_writer(&mut writer, &response)?;
        writer.flush()?;
    }

    debug!("Connection from {} closed", peer_addr);
    Ok(())
}

fn dispatch(adapter: &dyn Adapter, request: Request) -> Response {
    let result = match request {
        Request::Has { key } => return Response::Bool(adapter.has(key)),
        Request::Get { key } => adapter.get(key),
        Request::Set { key, value } => adapter.set(key, value).map(|()| None),
        Request::Remove { key } => adapter.remove(key).map(|()| None),
        Request::Clear { prefix } => adapter.clear(prefix).map(|()| None),
        Request::Keys => {
            return match adapter.keys() {
                Ok(keys) => Response::Keys(keys),
                Err(e) => Response::Err(e.to_string()),
            }
        }
    };
    match result {
        Ok(value) => Response::Ok(value),
        Err(e) => Response::Err(e.to_string()),
    }
}
