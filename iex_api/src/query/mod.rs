mod common;
pub use self::common::Query;

mod bars;
pub use self::bars::{is_supported_range, BarRange, BarsQuery, BATCH_SIZE};

mod symbols;
pub use self::symbols::SymbolsQuery;
