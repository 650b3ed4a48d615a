//! Streamed response accumulator.
//!
//! The backend streams each answer as `ai_response_start`, any number of
//! `ai_response_chunk` frames, then `ai_response_end`. The client forwards
//! those events untouched; this subscriber stitches the chunk text back
//! together for callers that only want whole responses.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::messaging::{listener, ClientEvent, EventData, EventRegistry, Listener};

#[derive(Debug, Default)]
struct AccumulatorState {
    current: Option<String>,
    completed: Vec<String>,
    violations: usize,
}

/// Collects chunk text between start and end events.
#[derive(Clone, Default)]
pub struct ResponseAccumulator {
    state: Arc<Mutex<AccumulatorState>>,
}

/// Registered callbacks, kept so they can be detached again.
pub struct AccumulatorSubscription {
    start: Listener,
    chunk: Listener,
    end: Listener,
}

impl AccumulatorSubscription {
    pub fn detach(self, registry: &EventRegistry) {
        registry.off(ClientEvent::AiResponseStart, &self.start);
        registry.off(ClientEvent::AiResponseChunk, &self.chunk);
        registry.off(ClientEvent::AiResponseEnd, &self.end);
    }
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AccumulatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to the streaming events on `registry`.
    pub fn attach(&self, registry: &EventRegistry) -> AccumulatorSubscription {
        let this = self.clone();
        let start = listener(move |_| this.on_start());
        let this = self.clone();
        let chunk = listener(move |data| this.on_chunk(data));
        let this = self.clone();
        let end = listener(move |_| this.on_end());

        registry.on(ClientEvent::AiResponseStart, Arc::clone(&start));
        registry.on(ClientEvent::AiResponseChunk, Arc::clone(&chunk));
        registry.on(ClientEvent::AiResponseEnd, Arc::clone(&end));

        AccumulatorSubscription { start, chunk, end }
    }

    fn on_start(&self) {
        let mut state = self.lock();
        if let Some(partial) = state.current.replace(String::new()) {
            tracing::warn!(
                discarded_len = partial.len(),
                "Response started while another was still streaming"
            );
            state.violations += 1;
        }
    }

    fn on_chunk(&self, data: &EventData) {
        let text = data.text("content").unwrap_or_default();
        let mut state = self.lock();
        match state.current.as_mut() {
            Some(current) => current.push_str(text),
            None => {
                tracing::warn!("Response chunk arrived without a start, starting implicitly");
                state.violations += 1;
                state.current = Some(text.to_string());
            }
        }
    }

    fn on_end(&self) {
        let mut state = self.lock();
        match state.current.take() {
            Some(response) => state.completed.push(response),
            None => {
                tracing::warn!("Response end arrived without a start");
                state.violations += 1;
            }
        }
    }

    /// Text of the response currently streaming, if any.
    pub fn in_progress(&self) -> Option<String> {
        self.lock().current.clone()
    }

    pub fn last_completed(&self) -> Option<String> {
        self.lock().completed.last().cloned()
    }

    /// Remove and return every completed response.
    pub fn take_completed(&self) -> Vec<String> {
        std::mem::take(&mut self.lock().completed)
    }

    /// Number of start/chunk/end ordering violations seen.
    pub fn violations(&self) -> usize {
        self.lock().violations
    }
}
