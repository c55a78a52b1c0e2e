// =============================================================================
// Futures Intelligence Module
// =============================================================================
//
// Open interest tracking for the Binance Futures API — feeds the 1h OI series
// carried on `MarketData` for the coin-pool OI-top overlay.

pub mod open_interest;

pub use open_interest::{OIState, OpenInterestTracker};
