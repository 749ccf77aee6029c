//! External collaborators: fact and price providers and their HTTP plumbing.

pub mod circuit_breaker;
pub mod csv_import;
pub mod edgar;
pub mod http;
pub mod memory;
pub mod provider;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use csv_import::{CsvFactSource, CsvPriceSource};
pub use edgar::EdgarFactProvider;
pub use http::{FetchSettings, HttpClient, RetryPolicy, Throttle};
pub use memory::{MemoryFactSource, MemoryPriceSource};
pub use provider::{FactProvider, FactRequest, FetchError, PriceProvider};
pub use yahoo::YahooPriceProvider;
