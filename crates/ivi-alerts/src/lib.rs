pub mod cancellation;
pub mod clock;
pub mod config;
pub mod error;
pub mod risk;
pub mod scheduler;
pub mod storage;
pub mod telemetry;
