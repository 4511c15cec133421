//! Storage module — SQLite-backed `Store`: the single source of truth for
//! memories, relations, agents, and audit logs (spec §5 "The Store is the
//! single source of truth; all mutations go through it").

mod migrations;
mod sqlite;

pub use migrations::MIGRATIONS;
pub use sqlite::{Stats, Store};
