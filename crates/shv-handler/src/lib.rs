//! The request/signal handler pipeline, its built-in stages, and the
//! synchronous call helper (spec.md §4.4, §4.5).

pub mod call;
pub mod pipeline;
pub mod request_id;
pub mod stages;

pub use call::{
    call, call_as, call_with_retries, CallError, DEFAULT_CALL_ATTEMPTS, DEFAULT_CALL_TIMEOUT,
};
pub use pipeline::{Context, HandlerStage, Outcome, Pipeline};
pub use request_id::RequestIdAllocator;
pub use stages::{
    Alert, AppStage, DeviceStage, InMemoryUserDb, LoginStage, LoginType, Record, RecordsStage,
    RecordsStore, ResponsesStage, SignalsStage, UserDb,
};
