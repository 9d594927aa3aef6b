//! libsql persistence. `SqliteRepo` implements every repository port; the
//! impls are split by aggregate.

mod audit;
mod catalog;
mod contacts;
mod conversations;
pub mod sqlite_repo;
mod tenants;

pub use sqlite_repo::SqliteRepo;
