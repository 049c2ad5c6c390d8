mod config;
mod engine;
mod escalation;
mod monitor;
pub mod scheduler;
mod store;

pub use config::PolicyConfig;
pub use engine::{CopyOutcome, EngineState, Escalation, ExpiryOutcome, PolicyEngine};
pub use escalation::{AlertRequest, AlertSink, ClipboardLock, DispatchError, EscalationDispatcher};
pub use monitor::Monitor;
pub use scheduler::SchedulerHandle;
pub use store::{AccountingStore, MemoryStateStore, SqliteStateStore, ViolationStore};
