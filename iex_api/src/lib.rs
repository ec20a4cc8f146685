//! Client for the IEX market-data API: batched chart bars and the reference
//! symbol list.

mod client;
mod errors;
mod query;
mod transport;
pub mod types;
pub use self::client::{Client, ClientConfig, BASE_URL};
pub use self::errors::Error;
pub use self::query::{is_supported_range, BarRange, BarsQuery, Query, SymbolsQuery, BATCH_SIZE};
pub use self::transport::{HttpTransport, RawResponse, Transport};
