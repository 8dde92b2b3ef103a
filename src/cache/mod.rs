//! In-memory caches that sit in front of the three find-or-create lookup
//! tables (`websites`, `hosts`, `http_codes`) so steady-state ingestion
//! never round-trips to MariaDB for names it has already seen.

pub mod lookup;
pub mod website;

pub use lookup::LookupCaches;
pub use website::{WebsiteCache, WebsiteHints};
