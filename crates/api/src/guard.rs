//! Sliding-window rate limiting for the public review-page routes.
//!
//! The approval and change-request endpoints are reachable without a login,
//! so they carry per-IP caps: a generous read allowance for page refreshes
//! and a tighter write allowance for feedback submission. Counters live in a
//! sliding window and are pruned on access; an over-cap request is refused
//! with the seconds until the oldest entry falls out of the window.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use cadence_core::error::CoreError;

use crate::config::GuardConfig;
use crate::error::AppError;
use crate::state::AppState;

/// Time source, injectable so window expiry is testable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time via `Instant::now()`.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Request class for cap selection. Safe methods count as reads, everything
/// else as writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    Read,
    Write,
}

impl OpClass {
    pub fn of(method: &Method) -> Self {
        if matches!(*method, Method::GET | Method::HEAD) {
            OpClass::Read
        } else {
            OpClass::Write
        }
    }
}

/// Per-IP sliding-window rate limiter.
pub struct AccessGuard {
    config: GuardConfig,
    windows: Mutex<HashMap<(String, OpClass), VecDeque<Instant>>>,
    clock: Arc<dyn Clock>,
}

impl AccessGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: GuardConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn cap(&self, class: OpClass) -> u32 {
        match class {
            OpClass::Read => self.config.read_cap,
            OpClass::Write => self.config.write_cap,
        }
    }

    /// Record one request, refusing it if the window is already at cap.
    ///
    /// A refused request is not counted, so a client at the cap does not
    /// push its own recovery further away by retrying.
    pub fn check(&self, ip: &str, class: OpClass) -> Result<(), CoreError> {
        let now = self.clock.now();
        let window = self.config.window;

        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entries = windows.entry((ip.to_string(), class)).or_default();

        while entries
            .front()
            .is_some_and(|&t| now.duration_since(t) >= window)
        {
            entries.pop_front();
        }

        if entries.len() >= self.cap(class) as usize {
            let oldest = entries.front().copied().unwrap_or(now);
            let elapsed = now.duration_since(oldest);
            let retry_after = window.saturating_sub(elapsed);
            tracing::warn!(ip, class = ?class, "Rate limit exceeded");
            return Err(CoreError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        entries.push_back(now);
        Ok(())
    }
}

/// Resolve the client IP: first hop of `X-Forwarded-For` when present
/// (set by the reverse proxy), otherwise the peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Axum middleware enforcing the guard on the routes it is layered onto.
pub async fn guard_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let class = OpClass::of(req.method());
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let ip = client_ip(req.headers(), peer);

    match state.guard.check(&ip, class) {
        Ok(()) => next.run(req).await,
        Err(err) => AppError::Core(err).into_response(),
    }
}
