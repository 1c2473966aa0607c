//! Per-table property collection hooks.

use std::collections::BTreeMap;

use crate::error::Result;

/// Name-to-bytes properties contributed by collectors, stored alongside the
/// well-known table properties.
pub type UserCollectedProperties = BTreeMap<String, Vec<u8>>;

/// Observes every entry written to one table and contributes properties
/// when the table is finished.
pub trait TablePropertiesCollector: Send {
    fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    fn finish(&mut self, properties: &mut UserCollectedProperties) -> Result<()>;

    fn name(&self) -> &str;
}

/// Creates a fresh collector for each table being built.
pub trait TablePropertiesCollectorFactory: Send + Sync {
    fn create_collector(&self) -> Box<dyn TablePropertiesCollector>;
}
