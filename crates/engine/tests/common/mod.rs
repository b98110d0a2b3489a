pub mod fixtures;
pub mod flaky;
pub mod harness;

#[allow(unused_imports)]
pub use fixtures::{seeded_bytes, sha256_hash};
#[allow(unused_imports)]
pub use flaky::{FlakyCatalog, FlakyStore};
#[allow(unused_imports)]
pub use harness::Harness;
