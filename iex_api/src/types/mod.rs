mod bar;
pub use self::bar::{Bar, BarsResponse, ChartResponse, EXCHANGE_TZ};

mod symbol;
pub use self::symbol::{SymbolRecord, SymbolsResponse};
