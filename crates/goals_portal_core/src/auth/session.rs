//! Explicit session context with change subscriptions.

use super::{AuthResult, Identity, IdentityProvider};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Session change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(Identity),
    SignedOut,
}

#[derive(Default)]
struct SessionState {
    identity: Option<Identity>,
    subscribers: Vec<Sender<SessionEvent>>,
}

/// Shared handle to the signed-in identity.
///
/// Clones observe the same state. Components receive a handle at
/// construction and learn about changes through `subscribe`.
#[derive(Clone, Default)]
pub struct SessionContext {
    inner: Arc<Mutex<SessionState>>,
}

impl SessionContext {
    /// Creates a signed-out context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context already signed in as `identity`.
    pub fn signed_in(identity: Identity) -> Self {
        let context = Self::new();
        context.lock().identity = Some(identity);
        context
    }

    /// Creates a context mirroring the provider's current user.
    pub fn from_provider(provider: &impl IdentityProvider) -> AuthResult<Self> {
        Ok(match provider.current_user()? {
            Some(identity) => Self::signed_in(identity),
            None => Self::new(),
        })
    }

    pub fn current(&self) -> Option<Identity> {
        self.lock().identity.clone()
    }

    pub fn current_email(&self) -> Option<String> {
        self.current().map(|identity| identity.email)
    }

    pub fn is_signed_in(&self) -> bool {
        self.lock().identity.is_some()
    }

    /// Sets the identity and notifies subscribers when it changed.
    pub fn sign_in(&self, identity: Identity) {
        let mut state = self.lock();
        if state.identity.as_ref() == Some(&identity) {
            return;
        }
        state.identity = Some(identity.clone());
        broadcast(&mut state, SessionEvent::SignedIn(identity));
    }

    /// Clears the identity and notifies subscribers when one was set.
    pub fn sign_out(&self) {
        let mut state = self.lock();
        if state.identity.take().is_none() {
            return;
        }
        broadcast(&mut state, SessionEvent::SignedOut);
    }

    /// Registers a subscriber. Dropped receivers are pruned on next change.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        let (sender, receiver) = channel();
        self.lock().subscribers.push(sender);
        receiver
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn broadcast(state: &mut SessionState, event: SessionEvent) {
    state
        .subscribers
        .retain(|subscriber| subscriber.send(event.clone()).is_ok());
}
