//! Core HTTP protocol types.
//!
//! - **Message Handling** ([`message`]): payload framing types
//!   - [`PayloadItem`]: a decoded body chunk or EOF
//!   - [`PayloadSize`]: how a request body is delimited
//!
//! - **Request Processing** ([`request`]): the reusable [`RequestHead`]
//!
//! - **Error Handling** ([`error`]): error types
//!   - [`HttpError`]: Top-level error type
//!   - [`ParseError`]: Request parsing and reading errors
//!   - [`SendError`]: Response sending errors

mod message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub(crate) use request::has_connection_token;
pub use request::RequestHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
