// Domain-layer modules and shared errors/models
pub mod dedup {
    pub use crate::dedup::*;
}

pub mod quality {
    pub use crate::quality::*;
}

pub mod verification {
    pub use crate::verification::*;
}

pub mod scoring {
    pub use crate::scoring::*;
}

pub mod pipeline {
    pub use crate::pipeline::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
