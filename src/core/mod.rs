// Funding engine, gate rules and shared errors/models
pub mod engine {
    pub use crate::calculator::*;
    pub use crate::catalog::*;
    pub use crate::million_mode::*;
    pub use crate::profile::*;
    pub use crate::timeline::*;
}

pub mod gate {
    pub use crate::approval::*;
    pub use crate::consent::*;
    pub use crate::disputes::*;
}

pub mod workflows {
    pub use crate::workflows::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
