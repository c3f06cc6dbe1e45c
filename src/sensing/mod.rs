pub mod accessibility;
pub mod controller;
pub mod foreground;

pub use accessibility::{AccessibilityEvent, AccessibilityEventKind, UiNode};
pub use controller::{EventSink, EventSubscription};
pub use foreground::{ForegroundDetector, ForegroundGuess, GuessSource};
