//! Request builders.
//!
//! Fluent, type-safe construction of `get`, `history`, and `put` requests.
//! Builders collect inputs loosely and validate everything in `build()`,
//! so a request that exists is a request the engine will accept.

mod get_op;
mod put_op;

pub use get_op::{GetBuilder, GetRequest, HistoryBuilder, HistoryRequest};
pub use put_op::{PutBuilder, PutRequest};
