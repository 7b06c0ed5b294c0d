pub mod apis;
pub mod error;
pub mod http;
pub mod session;
pub mod streaming;

pub use error::{ApiJson, ApiQuery, ErrorResponse};
pub use http::{
    origin_client, origin_router, relay_client, relay_router, start_origin_server, start_relay_server,
    OriginConfig, OriginState, RelayServerConfig, RelayState,
};
pub use session::{Session, SessionManager, SessionManagerConfig};
pub use streaming::{session_to_sse_stream, sse_response, to_sse_event};
