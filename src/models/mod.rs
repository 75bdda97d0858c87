pub mod event;
pub mod payment;
pub mod response;
pub mod transaction;

pub use event::*;
pub use payment::*;
pub use response::*;
pub use transaction::*;
