use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;

use keyv::adapters::MemoryAdapter;
use keyv::{Adapter, Keyv, KeyvClient, KeyvError, KeyvServer, Result, SharedQueueThreadPool, ThreadPool};

/// Serves `backend` on an ephemeral port in a background thread.
fn serve(backend: Arc<dyn Adapter>) -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let server = KeyvServer::new(backend, SharedQueueThreadPool::new(2)?);
    thread::spawn(move || server.serve(listener));
    Ok(addr)
}

#[test]
fn facade_over_tcp() -> Result<()> {
    keyv::register_builtin_adapters();
    let backend = MemoryAdapter::new();
    let addr = serve(Arc::new(backend.clone()))?;

    let store = Keyv::new(&format!("tcp://{}", addr), "remote")?;
    assert_eq!(store.adapter_name(), "tcp");

    store.set("answer", &42)?;
    assert!(store.has("answer"));
    assert_eq!(store.get_int("answer")?, 42);
    assert_eq!(backend.get("keyv:remote:answer".to_owned())?, Some("42".to_owned()));

    let sibling = store.namespaced("sibling");
    sibling.set("answer", "other")?;
    assert_eq!(store.keys()?, vec!["answer".to_owned()]);

    store.remove("answer")?;
    store.remove("answer")?;
    assert!(matches!(store.get_int("answer"), Err(KeyvError::KeyNotFound)));

    store.set("a", &1)?;
    store.clear()?;
    assert!(store.keys()?.is_empty());
    assert_eq!(sibling.get_string("answer")?, "other");
    Ok(())
}

#[test]
fn clients_share_the_served_backend() -> Result<()> {
    let addr = serve(Arc::new(MemoryAdapter::new()))?;

    let mut first = KeyvClient::connect(addr)?;
    let mut second = KeyvClient::connect(addr)?;
    first.set("raw".to_owned(), "value".to_owned())?;

    assert!(second.has("raw".to_owned())?);
    assert_eq!(second.get("raw".to_owned())?, Some("value".to_owned()));
    assert_eq!(second.keys()?, vec!["raw".to_owned()]);
    Ok(())
}

#[test]
fn reconnects_after_transport_failure() -> Result<()> {
    keyv::register_builtin_adapters();
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let backend = MemoryAdapter::new();
    let served = backend.clone();

    // Hang up on the first connection, then serve normally.
    thread::spawn(move || -> Result<()> {
        let (first, _) = listener.accept()?;
        drop(first);
        let server = KeyvServer::new(Arc::new(served), SharedQueueThreadPool::new(2)?);
        server.serve(listener)
    });

    let store = Keyv::new(&format!("tcp://{}", addr), "")?;
    assert!(matches!(
        store.set("k", &1),
        Err(KeyvError::Io(_) | KeyvError::Protocol(_))
    ));

    store.set("k", &2)?;
    assert_eq!(store.get_int("k")?, 2);
    assert_eq!(backend.get("keyv:default:k".to_owned())?, Some("2".to_owned()));
    Ok(())
}

#[test]
fn refused_connection_fails_to_connect() -> Result<()> {
    keyv::register_builtin_adapters();
    // Grab a free port, then release it so nothing is listening.
    let addr = TcpListener::bind("127.0.0.1:0")?.local_addr()?;

    let err = Keyv::new(&format!("tcp://{}", addr), "").unwrap_err();
    assert!(matches!(err, KeyvError::ConnectionFailed { .. }));
    Ok(())
}
