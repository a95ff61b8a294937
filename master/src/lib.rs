pub mod config;
pub mod driver;
pub mod handlers;
pub mod pool;
pub mod rpc;
pub mod schedule;
pub mod state;

pub use driver::{expand_inputs, run_distributed, DriverError, JobSpec, JobSummary};
pub use pool::WorkerPool;
pub use rpc::{HttpRpcClient, RpcClient, RpcOutcome};
pub use schedule::{schedule, PhaseError, PhaseReport, ScheduleOptions};
pub use state::{AppState, WorkerRegistry};
