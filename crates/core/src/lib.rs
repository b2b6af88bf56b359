//! Declarative extraction of typed records from HTML, plus the async
//! machinery to fetch many documents resiliently.
//!
//! - [`Extract`] and [`Schema`] describe how to pull fields out of a parsed
//!   [`Document`]; [`Page`] binds a schema to a Rust type.
//! - [`RetryPolicy`] retries network failures with jittered delays.
//! - [`FallbackCache`] answers from previously persisted output
//!   ([`PriorOutput`]) before falling back to a live fetch.
//! - [`for_each_chunked`] bounds how many requests are in flight.
//! - [`Harvester`] (feature `fetch`) ties all of the above to an HTTP client.

pub mod cache;
pub mod document;
pub mod error;
pub mod extract;
#[cfg(feature = "fetch")]
pub mod fetch;
#[cfg(feature = "fetch")]
pub mod harvest;
pub mod prior;
pub mod record;
pub mod retry;
pub mod schedule;
pub mod schema;

pub use cache::{FallbackCache, Providers};
pub use document::{Document, Node, Query};
pub use error::{GleanError, Result};
pub use extract::{Extract, PostProcess};
#[cfg(feature = "fetch")]
pub use fetch::{FetchConfig, Fetcher, fetch_file};
#[cfg(feature = "fetch")]
pub use harvest::{HarvestConfig, HarvestConfigBuilder, Harvester};
pub use prior::PriorOutput;
pub use record::{Record, Value};
pub use retry::RetryPolicy;
pub use schedule::{collect_pages, for_each_chunked};
pub use schema::{Field, Page, Schema, SchemaBuilder, SchemaCell, Target};
