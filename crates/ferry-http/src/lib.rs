//! ferry-http: minimal request/response helper
//!
//! Sends a single HTTP request and hands back status, headers and a body that
//! is parsed as JSON when possible.
//!
//! # Examples
//!
//! ```no_run
//! use ferry_http::{HttpClient, ResponseBody, WebRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::from_env()?;
//!
//! let response = client
//!     .begin_request(WebRequest::get("https://example.com/api/status"))
//!     .await?;
//!
//! if let Some(ResponseBody::Json(value)) = &response.body {
//!     println!("{}: {value}", response.status_code);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod request;

pub use error::{HttpError, Result};
pub use reqwest::Method;
pub use request::{HttpClient, ResponseBody, USER_AGENT_ENV, WebRequest, WebResponse};
