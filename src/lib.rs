pub mod clock;
pub mod constants;
pub mod protocol;
pub mod registry;
pub mod rng;
pub mod routine;
pub mod session;
pub mod types;
