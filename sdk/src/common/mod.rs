pub mod errors;
pub mod http;
pub mod lro;
pub mod paging;
pub mod rate_limiter;
pub mod retry;

pub use errors::{AzureError, AzureResult, HttpError};
pub use http::ClientOptions;
pub use lro::{LroStatus, Poller, StatusMonitor};
pub use paging::{ListResponse, ODataListResponse, PageFlavor, Pager};
pub use rate_limiter::{RateLimitError, RateLimiter, RateLimiterConfig};
pub use retry::RetryPolicy;
