// Application state for HTTP handlers
use crate::application::battery_service::BatteryService;

#[derive(Clone)]
pub struct AppState {
    pub battery_service: BatteryService,
}
