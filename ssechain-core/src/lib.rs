pub mod consumer;
pub mod error;
pub mod event;
pub mod logging;
pub mod origin;
pub mod relay;
pub mod source;

pub use consumer::{consume, ConsumeSummary, Handlers};
pub use error::{RelayError, RelayResult};
pub use event::{EventKind, StreamEvent, Terminal};
pub use relay::{relay, RelayConfig};
pub use source::{Endpoint, EventSource, EventStream, HttpSource, SourceRequest};
