pub mod backoff;
pub mod http_client;
pub mod human_format;
pub mod jitter;

pub use http_client::{
    ReqwestSearchTransport, SearchRequest, SearchTransport, TransportResponse,
};
