use std::process::exit;

use clap::{Parser, Subcommand};
use serde_json::Value;

use keyv::{Keyv, KeyvError, Result};

/// Command-line access to any keyv backend
#[derive(Parser)]
#[command(name = "keyv", version, about = "Get and set values in a keyv store")]
struct Cli {
    /// Connection string, e.g. file:///var/lib/keyv or tcp://127.0.0.1:4000
    #[arg(long, env = "KEYV_URI", value_name = "URI")]
    uri: String,

    /// Namespace qualifying every key
    #[arg(long, short, env = "KEYV_NAMESPACE", default_value = "", hide_default_value = true)]
    namespace: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set a key to a JSON value (plain text is stored as a string)
    Set {
        /// The key to set
        key: String,
        /// The value to set
        value: String,
    },
    /// Print the JSON value of a key
    Get {
        /// The key to get
        key: String,
    },
    /// Remove a key
    Rm {
        /// The key to remove
        key: String,
    },
    /// List the keys in the namespace
    Keys,
    /// Remove every key in the namespace
    Clear,
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{}", e);
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    keyv::register_builtin_adapters();
    let store = Keyv::new(&cli.uri, &cli.namespace)?;

    match cli.command {
        Commands::Set { key, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            store.set(&key, &value)?;
        }
        Commands::Get { key } => match store.get::<Value>(&key) {
            Ok(value) => println!("{}", value),
            Err(KeyvError::KeyNotFound) => println!("Key not found"),
            Err(e) => return Err(e),
        },
        Commands::Rm { key } => store.remove(&key)?,
        Commands::Keys => {
            for key in store.keys()? {
                println!("{}", key);
            }
        }
        Commands::Clear => store.clear()?,
    }
    Ok(())
}
