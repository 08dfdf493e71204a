pub mod account_executor;
pub mod connection_manager;
pub mod connection_supervisor;
pub mod event_bus;
pub mod signal_router;

pub use account_executor::{AccountExecutor, ExecutorSettings};
pub use connection_manager::ConnectionManager;
pub use connection_supervisor::ConnectionSupervisor;
pub use event_bus::InProcessEventBus;
pub use signal_router::{InboundMessage, SignalRouter};
