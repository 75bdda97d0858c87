pub mod amount;
pub mod cache;
pub mod chain;
pub mod database;
pub mod event_store;
pub mod identity;
pub mod payment_store;
pub mod retention;

pub use amount::{to_minimal_unit, Amount, AmountError};
pub use cache::EntitlementCache;
pub use chain::{ChainClient, EndpointRegistry, TransactionSource};
pub use event_store::EventStore;
pub use identity::{IdentityBindingStrategy, IdentityClaim, IdentityVerifier, VerifiedIdentity};
pub use payment_store::PaymentStore;
pub use retention::RetentionSweeper;
