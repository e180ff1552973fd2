use http::{HeaderMap, Method, Uri, Version};
use tokio_util::sync::CancellationToken;

use crate::connection::Body;
use crate::protocol::RequestHead;

/// The request handed to a handler: the parsed head, a reader over the body
/// and a cancellation token that fires once the response has been finalized
/// or the connection closes.
#[derive(Debug)]
pub struct Request<'a, R> {
    head: &'a RequestHead,
    body: Body<'a, R>,
    cancel: &'a CancellationToken,
}

impl<'a, R> Request<'a, R> {
    pub(crate) fn new(head: &'a RequestHead, body: Body<'a, R>, cancel: &'a CancellationToken) -> Self {
        Self { head, body, cancel }
    }

    pub fn head(&self) -> &RequestHead {
        self.head
    }

    pub fn method(&self) -> &Method {
        self.head.method()
    }

    pub fn uri(&self) -> &Uri {
        self.head.uri()
    }

    pub fn path(&self) -> &str {
        self.head.path()
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    pub fn is_not_keep_alive(&self) -> bool {
        self.head.is_not_keep_alive()
    }

    pub fn body_mut(&mut self) -> &mut Body<'a, R> {
        &mut self.body
    }

    /// Cancelled after this request's response is finalized, or when the
    /// connection ends. Clone it to tie background work to the request.
    pub fn cancellation(&self) -> &CancellationToken {
        self.cancel
    }
}
