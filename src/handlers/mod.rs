pub mod health;
pub mod payments;

pub use health::*;
pub use payments::*;
