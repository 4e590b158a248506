// Domain layer - battery model, pure computation over in-memory state
pub mod battery;
pub mod charge;
pub mod health;
pub mod metrics;
pub mod mode;
pub mod telemetry;
