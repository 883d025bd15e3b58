pub mod block;
pub mod extract;
pub mod fetch;
pub mod headers;
pub mod store;

pub use extract::extract;
pub use fetch::{Fetcher, HttpResponse, ReqwestTransport, Transport, TransportError};
pub use store::{read_record, save_debug_html, write_record};
