//! Recording channel for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::NotificationChannel;
use crate::{Error, Result};

type SendHook = Box<dyn Fn() + Send + Sync>;

pub(crate) struct RecordingChannel {
    sent: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    /// 1-based attempt numbers that fail.
    fail_on: Mutex<Vec<usize>>,
    fail_all: AtomicBool,
    on_send: Mutex<Option<SendHook>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            fail_on: Mutex::new(Vec::new()),
            fail_all: AtomicBool::new(false),
            on_send: Mutex::new(None),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn fail_on(&self, attempt: usize) {
        self.fail_on.lock().push(attempt);
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Run `hook` at the start of every send.
    pub fn on_send(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.on_send.lock() = Some(Box::new(hook));
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn channel_type(&self) -> &'static str {
        "mock"
    }

    async fn send(&self, text: &str) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = self.on_send.lock().as_ref() {
            hook();
        }

        if self.fail_all.load(Ordering::SeqCst) || self.fail_on.lock().contains(&attempt) {
            return Err(Error::notification(format!("attempt {attempt} rejected")));
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }
}
