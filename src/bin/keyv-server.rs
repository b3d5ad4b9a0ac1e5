use std::net::SocketAddr;
use std::process::exit;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use log::{error, info};

use keyv::{Adapter, Keyv, KeyvServer, RayonThreadPool, Result, SharedQueueThreadPool, ThreadPool};

const DEFAULT_ADDR: &str = "127.0.0.1:4000";
const DEFAULT_URI: &str = "file://.";

#[derive(Clone, Copy, ValueEnum)]
enum PoolKind {
    /// Workers sharing one job queue
    Shared,
    /// Rayon work-stealing pool
    Rayon,
}

#[derive(Parser)]
#[command(name = "keyv-server", version, about = "Serves a keyv backend to tcp:// clients")]
struct Cli {
    /// Server listening address
    #[arg(long, default_value = DEFAULT_ADDR, value_name = "IP-PORT")]
    addr: SocketAddr,

    /// Connection string of the backend to serve
    #[arg(long, env = "KEYV_URI", default_value = DEFAULT_URI, value_name = "URI")]
    uri: String,

    /// Number of worker threads [default: number of CPUs]
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    threads: Option<u32>,

    /// Thread pool implementation
    #[arg(long, value_enum, default_value_t = PoolKind::Shared)]
    pool: PoolKind,
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{}", e);
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    keyv::register_builtin_adapters();

    let store = Keyv::new(&cli.uri, "")?;
    let threads = cli.threads.unwrap_or_else(|| num_cpus::get() as u32);

    info!("keyv-server {}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {} ({})", store.adapter_name(), store.uri());
    info!("Listening on {} with {} threads", cli.addr, threads);

    let adapter = Arc::clone(store.adapter());
    match cli.pool {
        PoolKind::Shared => serve(adapter, SharedQueueThreadPool::new(threads)?, cli.addr),
        PoolKind::Rayon => serve(adapter, RayonThreadPool::new(threads)?, cli.addr),
    }
}

fn serve<P: ThreadPool>(adapter: Arc<dyn Adapter>, pool: P, addr: SocketAddr) -> Result<()> {
    KeyvServer::new(adapter, pool).run(addr)
}
