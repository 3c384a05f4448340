pub mod connection_limit;

pub use connection_limit::{ConnectionSlot, connection_limit_middleware};
