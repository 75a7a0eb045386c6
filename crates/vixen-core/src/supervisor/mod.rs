//! Lifecycle of the one bot instance a session owns.

pub mod interrupt;
pub mod launcher;
pub mod session;
pub mod shutdown;

pub use launcher::launch;
pub use session::{Session, SessionConfig, SessionExit};
pub use shutdown::{ShutdownCoordinator, ShutdownReport};
