//! Pure, synchronous stages of the backtest: align → returns → clip →
//! aggregate → drawdown/ranking.

pub mod align;
pub mod drawdown;
pub mod portfolio;

pub use self::align::{align_prices, clip_to_window, compute_returns};
pub use self::drawdown::{drawdown, max_drawdown, rank_contributions};
pub use self::portfolio::{EqualWeight, WeightingScheme, aggregate, per_ticker_growth};
