mod app;
mod session;

pub use app::{AllowList, ApplicationId, BlockSet};
pub use session::SessionState;
