pub mod apps;
pub mod codec;
pub mod error;
pub mod exec;
pub mod kv;
pub mod map;
pub mod merge;
pub mod naming;
pub mod reduce;
pub mod sequential;
pub mod task;
pub mod worker;

/* --------- Modelo de datos --------- */

pub use kv::{compare_keys, KeyValue};
pub use task::{DoTaskReply, JobPhase, TaskDescriptor};
pub use worker::{
    WorkerAddr, WorkerInfo, WorkerRegisterRequest, WorkerRegisterResponse, DO_TASK_METHOD,
};

/* --------- Ejecución de tareas --------- */

pub use error::TaskError;
pub use exec::execute;
pub use map::{do_map, MapTask};
pub use merge::merge_outputs;
pub use reduce::{do_reduce, CorruptionPolicy, ReduceOutcome, ReduceTask};
pub use sequential::run_sequential;
