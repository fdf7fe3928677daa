//! Policy containers read on the request path.
//!
//! Every container is created with safe defaults so it can be consulted
//! before the first push arrives. Reads are lock-free or take a short read
//! lock; writes only come from config pushes.

mod circuit_breaker;
mod degradation;
mod rate_limit;
mod retry;
mod timeout;

pub use circuit_breaker::*;
pub use degradation::*;
pub use rate_limit::*;
pub use retry::*;
pub use timeout::*;
