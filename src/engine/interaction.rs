//! Questions a running load puts to the user.
//!
//! A load stops at most at two points: to ask for a password and to confirm
//! opening a file from a newer compatible format revision. Both are blocking
//! calls made on the worker thread.

use std::time::Duration;

use log::debug;
use parking_lot::{Condvar, Mutex};

/// Source of answers for a running load.
pub trait InteractionChannel: Send + Sync {
    /// Ask for the document password. `retry` is true after a wrong password.
    /// `None` or an empty string cancels the load.
    fn request_password(&self, retry: bool) -> Option<String>;

    /// Ask the user to confirm `message`.
    fn confirm(&self, message: &str) -> bool;
}

/// Declines everything. For loads that must not stop for input.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInteraction;

impl InteractionChannel for NoInteraction {
    fn request_password(&self, _retry: bool) -> Option<String> {
        None
    }

    fn confirm(&self, _message: &str) -> bool {
        false
    }
}

/// A pending question, as seen by the answering thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionRequest {
    Password { retry: bool },
    Confirmation { message: String },
}

#[derive(Debug)]
enum Answer {
    Password(Option<String>),
    Confirmation(bool),
}

#[derive(Default)]
struct Slot {
    request: Option<InteractionRequest>,
    answer: Option<Answer>,
}

/// Hands questions from the worker to another thread (usually the UI) and
/// parks the worker until that thread answers.
#[derive(Default)]
pub struct BlockingInteraction {
    slot: Mutex<Slot>,
    changed: Condvar,
}

impl BlockingInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    fn ask(&self, request: InteractionRequest) -> Answer {
        let mut slot = self.slot.lock();
        slot.request = Some(request);
        slot.answer = None;
        self.changed.notify_all();
        loop {
            if let Some(answer) = slot.answer.take() {
                slot.request = None;
                return answer;
            }
            self.changed.wait(&mut slot);
        }
    }

    /// Wait up to `timeout` for an unanswered question.
    pub fn wait_request(&self, timeout: Duration) -> Option<InteractionRequest> {
        let mut slot = self.slot.lock();
        if slot.request.is_none() || slot.answer.is_some() {
            let result = self.changed.wait_while_for(
                &mut slot,
                |s| s.request.is_none() || s.answer.is_some(),
                timeout,
            );
            if result.timed_out() {
                return None;
            }
        }
        slot.request.clone()
    }

    /// The question waiting for an answer, if any.
    pub fn pending(&self) -> Option<InteractionRequest> {
        let slot = self.slot.lock();
        match slot.answer {
            None => slot.request.clone(),
            Some(_) => None,
        }
    }

    /// Answer a pending password question. Returns false when none is pending.
    pub fn answer_password(&self, password: Option<String>) -> bool {
        let mut slot = self.slot.lock();
        if !matches!(slot.request, Some(InteractionRequest::Password { .. })) || slot.answer.is_some()
        {
            return false;
        }
        slot.answer = Some(Answer::Password(password));
        self.changed.notify_all();
        true
    }

    /// Answer a pending confirmation. Returns false when none is pending.
    pub fn answer_confirmation(&self, accept: bool) -> bool {
        let mut slot = self.slot.lock();
        if !matches!(slot.request, Some(InteractionRequest::Confirmation { .. }))
            || slot.answer.is_some()
        {
            return false;
        }
        slot.answer = Some(Answer::Confirmation(accept));
        self.changed.notify_all();
        true
    }

    /// Decline whatever is pending.
    pub fn cancel(&self) -> bool {
        match self.pending() {
            Some(InteractionRequest::Password { .. }) => self.answer_password(None),
            Some(InteractionRequest::Confirmation { .. }) => self.answer_confirmation(false),
            None => false,
        }
    }
}

impl InteractionChannel for BlockingInteraction {
    fn request_password(&self, retry: bool) -> Option<String> {
        debug!("waiting for password (retry: {})", retry);
        match self.ask(InteractionRequest::Password { retry }) {
            Answer::Password(p) => p,
            Answer::Confirmation(_) => None,
        }
    }

    fn confirm(&self, message: &str) -> bool {
        debug!("waiting for confirmation: {}", message);
        match self.ask(InteractionRequest::Confirmation {
            message: message.to_string(),
        }) {
            Answer::Confirmation(accept) => accept,
            Answer::Password(_) => false,
        }
    }
}
