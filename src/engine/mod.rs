// Engine: the two-tier cache store and the preload orchestrator driving it.

pub mod cache;
pub mod clock;
pub mod preloader;
pub mod session;
pub mod stats;
