pub mod indicator;
pub mod market_data;
pub mod position;
pub mod signal;
pub mod trade_state;

pub use indicator::{IndicatorSnapshot, MacdValue, StochValue};
pub use market_data::{AssetBalance, Balance, Bar, Ticker};
pub use position::{OrderAck, OrderKind, OrderSide, PendingOrder, PositionRecord, PositionSide};
pub use signal::{ClassifierMode, Signal};
pub use trade_state::{RiskState, TradeState};
