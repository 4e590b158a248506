// Application layer - use cases and the seams they depend on
pub mod battery_service;
pub mod clock;
pub mod telemetry_channel;
