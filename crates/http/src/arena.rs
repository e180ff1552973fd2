//! Pool of reusable per-connection state.
//!
//! Every served connection borrows one [`ConnState`] from a shared
//! [`ConnStatePool`] for its whole life. The state is reset between keep-alive
//! requests and returned to the pool when the connection closes, so buffers
//! and header maps are allocated once and reused. A hijacked state is never
//! returned: its buffers travel with the transport out of the engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::BytesMut;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::codec::PayloadDecoder;
use crate::config::HttpConfig;
use crate::connection::ResponseState;
use crate::protocol::RequestHead;
use crate::utils::{SCRATCH_LEN, Scratch};

/// Connection-bound state, owned by exactly one connection at a time.
#[derive(Debug)]
pub struct ConnState {
    pub(crate) read_buf: BytesMut,
    pub(crate) write_buf: BytesMut,
    pub(crate) scratch: Scratch,
    pub(crate) request: RequestHead,
    pub(crate) response: ResponseState,
    pub(crate) payload: PayloadDecoder,
    pub(crate) cancel: Option<CancellationToken>,
    pub(crate) hijacked: bool,
}

impl ConnState {
    fn new(read_buffer_size: usize, write_buffer_size: usize) -> Self {
        Self {
            read_buf: BytesMut::with_capacity(read_buffer_size),
            write_buf: BytesMut::with_capacity(write_buffer_size),
            scratch: [0; SCRATCH_LEN],
            request: RequestHead::default(),
            response: ResponseState::default(),
            payload: PayloadDecoder::empty(),
            cancel: None,
            hijacked: false,
        }
    }

    pub fn is_hijacked(&self) -> bool {
        self.hijacked
    }

    pub fn read_buf(&self) -> &BytesMut {
        &self.read_buf
    }

    pub fn write_buf(&self) -> &BytesMut {
        &self.write_buf
    }

    /// Per-request reset at the top of a keep-alive iteration. Bytes already
    /// read for a pipelined request stay in `read_buf`.
    pub(crate) fn reset(&mut self) {
        self.write_buf.clear();
        self.request.reset();
        self.response.reset();
        self.payload = PayloadDecoder::empty();
        self.cancel = None;
    }

    /// Full reset before the state goes back to the pool.
    fn recycle(&mut self, pool: &ConnStatePool) {
        self.reset();
        self.read_buf.clear();
        shrink(&mut self.read_buf, pool.read_buffer_size, pool.max_retained_buffer);
        shrink(&mut self.write_buf, pool.write_buffer_size, pool.max_retained_buffer);
    }
}

fn shrink(buf: &mut BytesMut, default_capacity: usize, max_retained: usize) {
    if buf.capacity() > max_retained {
        trace!(capacity = buf.capacity(), default_capacity, "shrink oversized connection buffer");
        *buf = BytesMut::with_capacity(default_capacity);
    }
}

/// Concurrent free list of [`ConnState`]s.
///
/// The lock is held only while pushing or popping; states are built and reset
/// outside of it.
#[derive(Debug)]
pub struct ConnStatePool {
    free: Mutex<Vec<Box<ConnState>>>,
    created: AtomicUsize,
    read_buffer_size: usize,
    write_buffer_size: usize,
    max_retained_buffer: usize,
    max_idle_states: usize,
}

impl Default for ConnStatePool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnStatePool {
    pub fn new() -> Self {
        Self::with_config(&HttpConfig::default())
    }

    pub fn with_config(config: &HttpConfig) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            read_buffer_size: config.read_buffer_size,
            write_buffer_size: config.write_buffer_size,
            max_retained_buffer: config.max_retained_buffer.max(config.read_buffer_size).max(config.write_buffer_size),
            max_idle_states: config.max_idle_states,
        }
    }

    /// Pops an idle state or builds a new one.
    pub fn acquire(&self) -> Box<ConnState> {
        let state = self.lock().pop();
        match state {
            Some(state) => state,
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                Box::new(ConnState::new(self.read_buffer_size, self.write_buffer_size))
            }
        }
    }

    /// Resets `state` and makes it available again. Hijacked states are
    /// dropped instead.
    pub fn release(&self, mut state: Box<ConnState>) {
        if state.hijacked {
            warn!("refusing to pool the state of a hijacked connection");
            return;
        }

        state.recycle(self);

        let mut free = self.lock();
        if free.len() < self.max_idle_states {
            free.push(state);
        }
    }

    /// Number of states waiting in the pool.
    pub fn idle_len(&self) -> usize {
        self.lock().len()
    }

    /// Number of states built so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Box<ConnState>>> {
        // the list holds no invariant a panicking holder could break
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
