pub mod instrument;
pub mod order;
pub mod wallet;

pub use instrument::{derive_pair, InstrumentSpec, MarginCurrency};
pub use order::{OrderDraft, OrderKind, OrderStatus, QueuedOrder, Side};
pub use wallet::Wallet;
