// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod system_clock;
pub mod thingspeak_channel;
