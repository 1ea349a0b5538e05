//! Scripted stand-ins for outbound clients.
//!
//! A [`Script`] records every request it receives and answers from a queue of
//! canned replies, falling back to a default once the queue is empty. Crates
//! wrap it in an implementation of their own client trait.

use std::collections::VecDeque;

use parking_lot::Mutex;

pub struct Script<Req, Resp> {
    calls: Mutex<Vec<Req>>,
    replies: Mutex<VecDeque<Resp>>,
    fallback: Mutex<Resp>,
}

impl<Req: Clone, Resp: Clone> Script<Req, Resp> {
    pub fn new(fallback: Resp) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
        }
    }

    /// Queues a reply for the next unanswered request.
    pub fn push_reply(&self, reply: Resp) -> &Self {
        self.replies.lock().push_back(reply);
        self
    }

    /// Replaces the reply used once the queue is drained.
    pub fn set_fallback(&self, reply: Resp) {
        *self.fallback.lock() = reply;
    }

    /// Records `request` and returns the scripted reply.
    pub fn respond(&self, request: Req) -> Resp {
        self.calls.lock().push(request);
        let queued = self.replies.lock().pop_front();
        queued.unwrap_or_else(|| self.fallback.lock().clone())
    }

    pub fn calls(&self) -> Vec<Req> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}
