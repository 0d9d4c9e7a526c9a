pub mod classify;
pub mod client;
pub mod endpoint;
pub mod transport;
pub mod validate;

pub use classify::classify;
pub use client::{ApiClient, Client};
pub use endpoint::Endpoint;
pub use transport::{HttpTransport, Method, OutboundRequest, RawResponse, RequestBody, Transport};
pub use validate::{CallOptions, NetworkErrors, validate};
