use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

/// Supersede-on-schedule bookkeeping for background jobs.
///
/// Every `begin` cancels the previous ticket's token and hands out a new
/// ticket. A job may only commit its result while its ticket is current.
#[derive(Debug, Default)]
pub struct Debouncer {
    inner: Mutex<Slot>,
}

#[derive(Debug, Default)]
struct Slot {
    epoch: u64,
    token: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct Ticket {
    epoch: u64,
    token: CancellationToken,
}

impl Ticket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Ticket {
        let mut slot = self.lock();
        slot.token.cancel();
        slot.epoch += 1;
        slot.token = CancellationToken::new();
        Ticket {
            epoch: slot.epoch,
            token: slot.token.clone(),
        }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        let slot = self.lock();
        slot.epoch == ticket.epoch && !ticket.token.is_cancelled()
    }

    /// Cancel whatever is scheduled or running without starting anything new.
    pub fn cancel(&self) {
        let mut slot = self.lock();
        slot.token.cancel();
        slot.epoch += 1;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        // The slot holds plain data, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
