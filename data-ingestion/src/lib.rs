// Panel Store
// Loads adjusted daily panels and derives the forward return panel consumed by the backtest

pub mod csv_io;
pub mod store;

pub use csv_io::{read_panel, read_series, write_panel, write_series};
pub use store::{
    forward_returns, realized_returns, CsvPanelStore, InMemoryPanelStore, PanelSet, PanelStore,
    CLOSE_FIELD, RETURN_FIELD,
};
