//! Scoped use of a store session.

use std::ops::{Deref, DerefMut};

use crate::store::{StoreResult, StoreSession};

/// A session acquired for one execution.
///
/// Released when dropped, so early returns and `?` paths release too.
pub struct SessionScope<'a, S: StoreSession> {
    session: &'a mut S,
}

impl<'a, S: StoreSession> SessionScope<'a, S> {
    pub fn acquire(session: &'a mut S) -> StoreResult<Self> {
        session.acquire()?;
        Ok(Self { session })
    }
}

impl<S: StoreSession> Deref for SessionScope<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.session
    }
}

impl<S: StoreSession> DerefMut for SessionScope<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.session
    }
}

impl<S: StoreSession> Drop for SessionScope<'_, S> {
    fn drop(&mut self) {
        self.session.release();
    }
}
