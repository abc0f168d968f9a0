//! Facade crate: connection URL parsing, `connect`/`serve` helpers, and
//! the client-side `Session` (spec.md §6).

pub mod connect;
pub mod server;
pub mod session;
pub mod url;

pub use connect::{dial, ClientError, DEFAULT_POLL_INTERVAL};
pub use session::{LoginOptions, Session, SessionError};
pub use url::{ConnectUrl, Scheme, UrlError};

/// Re-exports of the lower-level crates this facade sits on top of, for
/// callers that need to drop down past `Session`.
pub mod prelude {
    pub use shv_chainpack::{RpcValue, Value};
    pub use shv_handler::{
        call, call_as, AppStage, Context, DeviceStage, HandlerStage, InMemoryUserDb, LoginStage,
        LoginType, Outcome, Pipeline, RecordsStage, RecordsStore, RequestIdAllocator,
        ResponsesStage, SignalsStage, UserDb,
    };
    pub use shv_proto::{AccessLevel, MethodDescription, ResourceId, RpcError, RpcMessage};
    pub use shv_transport::{Client, Transport};

    pub use crate::server::{run_tcp_server, serve, serve_connection, serve_shared};
    pub use crate::{ConnectUrl, LoginOptions, Scheme, Session};
}
