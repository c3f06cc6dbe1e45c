pub mod controller;
pub mod cooldown;
pub mod display;
pub mod loop_worker;
pub mod overlay;
pub mod policy;
pub mod state;

pub use controller::FocusEngine;
pub use overlay::OverlayState;
pub use policy::{decide, Decision};
pub use state::{EngineEvent, EngineSnapshot};
