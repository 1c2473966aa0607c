use std::fs;
use std::path::Path;

use config::{Options, ReadOptions, WriteOptions};

use crate::Engine;

pub fn count_sst_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext == "sst")
                .unwrap_or(false)
        })
        .count()
}

pub fn wo() -> WriteOptions {
    WriteOptions::default()
}

pub fn ro() -> ReadOptions {
    ReadOptions::default()
}

pub fn open(dir: &Path, options: Options) -> Engine {
    Engine::open(dir, options).unwrap()
}

/// Drops the engine without the best-effort flush, leaving data only in the
/// WAL, as a crash would.
pub fn crash(engine: Engine) {
    std::mem::forget(engine);
}
