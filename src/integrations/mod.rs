//! External service integrations.

pub mod gateway_client {
    pub use crate::gateway_client::*;
}

pub mod providers {
    pub use crate::providers::*;
}

pub mod fixtures {
    pub use crate::fixtures::*;
}
