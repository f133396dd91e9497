//! Per-kind callback lists.
//!
//! Callbacks run synchronously on the driver task in frame order. Lists are
//! snapshotted before invocation so a callback may register further callbacks
//! or call back into the connection without deadlocking. A panicking callback
//! is logged and skipped.
//!
//! Once the connection finishes, every list is sealed: stored callbacks are
//! dropped and later registrations are ignored, which breaks any reference
//! cycle through a callback that captured its own connection.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde_json::Value;

use qws_core::{Headers, QwsError};

use super::state::CloseReason;
use super::lock;

pub(crate) type ConnectFn = dyn Fn() + Send + Sync;
pub(crate) type StructuredFn = dyn Fn(&Value, &Headers) + Send + Sync;
pub(crate) type BinaryFn = dyn Fn(&Bytes, &Headers) + Send + Sync;
pub(crate) type ErrorFn = dyn Fn(&QwsError) + Send + Sync;
pub(crate) type CloseFn = dyn Fn(&CloseReason) + Send + Sync;

pub(crate) struct Slot<F: ?Sized> {
    /// `None` once sealed.
    list: Mutex<Option<Vec<Arc<F>>>>,
}

impl<F: ?Sized> Default for Slot<F> {
    fn default() -> Self {
        Self {
            list: Mutex::new(Some(Vec::new())),
        }
    }
}

impl<F: ?Sized> Slot<F> {
    pub(crate) fn push(&self, f: Arc<F>) {
        if let Some(list) = lock(&self.list).as_mut() {
            list.push(f);
        }
    }

    fn snapshot(&self) -> Vec<Arc<F>> {
        lock(&self.list).clone().unwrap_or_default()
    }

    fn seal(&self) {
        let dropped = lock(&self.list).take();
        drop(dropped);
    }

    fn each(&self, kind: &'static str, mut call: impl FnMut(&F)) {
        for f in self.snapshot() {
            if catch_unwind(AssertUnwindSafe(|| call(&*f))).is_err() {
                tracing::warn!(callback = kind, "callback panicked");
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct Callbacks {
    pub(crate) connect: Slot<ConnectFn>,
    pub(crate) structured: Slot<StructuredFn>,
    pub(crate) binary: Slot<BinaryFn>,
    pub(crate) error: Slot<ErrorFn>,
    pub(crate) close: Slot<CloseFn>,
}

impl Callbacks {
    pub(crate) fn fire_connect(&self) {
        self.connect.each("connect", |f| f());
    }

    pub(crate) fn fire_structured(&self, value: &Value, headers: &Headers) {
        self.structured.each("structured", |f| f(value, headers));
    }

    pub(crate) fn fire_binary(&self, bytes: &Bytes, headers: &Headers) {
        self.binary.each("binary", |f| f(bytes, headers));
    }

    pub(crate) fn fire_error(&self, err: &QwsError) {
        self.error.each("error", |f| f(err));
    }

    pub(crate) fn fire_close(&self, reason: &CloseReason) {
        self.close.each("close", |f| f(reason));
    }

    pub(crate) fn seal(&self) {
        self.connect.seal();
        self.structured.seal();
        self.binary.seal();
        self.error.seal();
        self.close.seal();
    }
}
