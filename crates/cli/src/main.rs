//! # CLI - LayerKV interactive shell
//!
//! A REPL over the [`Db`] surface. Reads commands from stdin, executes them
//! and prints results to stdout, so it works both interactively and with
//! piped scripts. Logs go to stderr, filtered by `RUST_LOG`.
//!
//! ## Commands
//!
//! ```text
//! SET key value       Insert or update a key
//! GET key             Look up a key (prints value or "(nil)")
//! MGET key...         Look up several keys
//! DEL key             Delete a key
//! MERGE key value     Append to a key's value (comma separated)
//! SCAN [start] [end]  Range scan (inclusive start, exclusive end)
//! FLUSH               Write the memtable to a table file
//! COMPACT             Merge every table into one
//! STATS               Print sequence and write-path counters
//! EXIT / QUIT         Shut down
//! ```
//!
//! ## Configuration
//!
//! ```text
//! LAYERKV_DIR        Database directory           (default: "data")
//! LAYERKV_TTL        Expire values after N secs   (default: 0 = no TTL)
//! LAYERKV_WAL_SYNC   fsync every WAL append       (default: "true")
//! LAYERKV_*          Engine tunables, see config::Options::from_env
//! ```

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use common::merge_operator::StringAppendOperator;
use common::statistics::Statistics;
use common::DbIterator;
use config::{Options, ReadOptions, WriteOptions};
use engine::{Db, Engine};
use tracing::info;
use tracing_subscriber::EnvFilter;
use ttl::TtlDb;

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn open_db(dir: &str, options: Options, ttl: i32) -> Result<Box<dyn Db>> {
    let db: Box<dyn Db> = if ttl > 0 {
        Box::new(TtlDb::open(dir, options, ttl).with_context(|| format!("failed to open {dir} with ttl"))?)
    } else {
        Box::new(Engine::open(dir, options).with_context(|| format!("failed to open {dir}"))?)
    };
    Ok(db)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let dir = env_or("LAYERKV_DIR", "data");
    let ttl: i32 = env_or("LAYERKV_TTL", "0").parse().unwrap_or(0);
    let wal_sync: bool = env_or("LAYERKV_WAL_SYNC", "true").parse().unwrap_or(true);

    let stats = Arc::new(Statistics::new());
    let options = Options::from_env()
        .with_merge_operator(Arc::new(StringAppendOperator::new(b',')))
        .with_statistics(Arc::clone(&stats));
    options.dump();

    let db = open_db(&dir, options, ttl)?;
    let wo = WriteOptions {
        sync: wal_sync,
        ..WriteOptions::default()
    };
    let ro = ReadOptions::default();
    info!(dir = %dir, ttl, wal_sync, "layerkv started");

    println!("LayerKV started (seq={}, dir={}, ttl={}, wal_sync={})", db.snapshot(), dir, ttl, wal_sync);
    println!("Commands: SET key value | GET key | MGET key... | DEL key | MERGE key value");
    println!("          SCAN [start] [end] | FLUSH | COMPACT | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        if let Some(cmd) = parts.next() {
            match cmd.to_uppercase().as_str() {
                "SET" | "PUT" => match (parts.next(), parts.collect::<Vec<&str>>().join(" ")) {
                    (Some(k), v) if !v.is_empty() => match db.put(&wo, k.as_bytes(), v.as_bytes()) {
                        Ok(()) => println!("OK"),
                        Err(e) => println!("ERR set failed: {e}"),
                    },
                    _ => println!("ERR usage: SET key value"),
                },
                "MERGE" => match (parts.next(), parts.collect::<Vec<&str>>().join(" ")) {
                    (Some(k), v) if !v.is_empty() => match db.merge(&wo, k.as_bytes(), v.as_bytes()) {
                        Ok(()) => println!("OK"),
                        Err(e) => println!("ERR merge failed: {e}"),
                    },
                    _ => println!("ERR usage: MERGE key value"),
                },
                "GET" => {
                    if let Some(k) = parts.next() {
                        match db.get(&ro, k.as_bytes()) {
                            Ok(Some(v)) => println!("{}", String::from_utf8_lossy(&v)),
                            Ok(None) => println!("(nil)"),
                            Err(e) => println!("ERR read failed: {e}"),
                        }
                    } else {
                        println!("ERR usage: GET key");
                    }
                }
                "MGET" => {
                    let keys: Vec<&[u8]> = parts.map(str::as_bytes).collect();
                    if keys.is_empty() {
                        println!("ERR usage: MGET key...");
                    } else {
                        for (k, result) in keys.iter().zip(db.multi_get(&ro, &keys)) {
                            let k = String::from_utf8_lossy(k);
                            match result {
                                Ok(Some(v)) => println!("{k} -> {}", String::from_utf8_lossy(&v)),
                                Ok(None) => println!("{k} -> (nil)"),
                                Err(e) => println!("{k} -> ERR {e}"),
                            }
                        }
                    }
                }
                "DEL" => {
                    if let Some(k) = parts.next() {
                        match db.delete(&wo, k.as_bytes()) {
                            Ok(()) => println!("OK"),
                            Err(e) => println!("ERR del failed: {e}"),
                        }
                    } else {
                        println!("ERR usage: DEL key");
                    }
                }
                "SCAN" => {
                    let start = parts.next().unwrap_or("").as_bytes();
                    let end = parts.next().unwrap_or("").as_bytes();
                    let mut iter = db.new_iterator(&ro);
                    iter.seek(start);
                    let mut count = 0usize;
                    while iter.valid() && (end.is_empty() || iter.key() < end) {
                        println!(
                            "{} -> {}",
                            String::from_utf8_lossy(iter.key()),
                            String::from_utf8_lossy(iter.value())
                        );
                        count += 1;
                        iter.next();
                    }
                    match iter.status() {
                        Err(e) => println!("ERR scan failed: {e}"),
                        Ok(()) if count == 0 => println!("(empty)"),
                        Ok(()) => println!("({count} entries)"),
                    }
                }
                "FLUSH" => match db.flush() {
                    Ok(()) => println!("OK"),
                    Err(e) => println!("ERR flush failed: {e}"),
                },
                "COMPACT" => match db.compact_range() {
                    Ok(()) => println!("OK"),
                    Err(e) => println!("ERR compact failed: {e}"),
                },
                "STATS" => {
                    println!("seq={}", db.snapshot());
                    print!("{}", stats.to_report());
                }
                "EXIT" | "QUIT" => {
                    println!("bye");
                    break;
                }
                other => {
                    println!("unknown command: {other}");
                }
            }
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}
