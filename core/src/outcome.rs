//! Single-assignment result of one request execution.
//!
//! # Design
//! The engine, its timeout timer and its transport event pump all hold a
//! `Settler` for the same execution. Settlement is a compare-and-set on a
//! `tokio::sync::watch` slot: the first caller writes its result and every
//! later call is a no-op that returns `false`. The winning call also
//! disarms the timeout timer, so no settlement path can leak it.
//!
//! Observers hold an `Outcome`, which is a receiver on the same slot. Any
//! number of clones may await it; they all see the one result.

use std::future::IntoFuture;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::error::RequestError;
use crate::response::Response;

type Slot = Option<Result<Response, RequestError>>;

enum Timer {
    Unarmed,
    Armed(AbortHandle),
    Disarmed,
}

struct Shared {
    slot: watch::Sender<Slot>,
    timer: Mutex<Timer>,
}

/// Write side of an outcome. Cheap to clone; every clone races for the
/// same slot.
#[derive(Clone)]
pub(crate) struct Settler {
    shared: Arc<Shared>,
}

/// Create a fresh, unsettled outcome and its settler.
pub(crate) fn deferred() -> (Outcome, Settler) {
    let (tx, rx) = watch::channel(None);
    let shared = Arc::new(Shared {
        slot: tx,
        timer: Mutex::new(Timer::Unarmed),
    });
    (Outcome { rx }, Settler { shared })
}

impl Settler {
    /// Record `result` unless something already settled. Returns whether
    /// this call won.
    pub(crate) fn settle(&self, result: Result<Response, RequestError>) -> bool {
        let won = self.shared.slot.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(result);
            true
        });
        if won {
            self.disarm_timer();
        }
        won
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.shared.slot.borrow().is_some()
    }

    /// Hand the timeout timer to this execution. If the execution already
    /// settled, the timer is cancelled immediately.
    pub(crate) fn arm_timer(&self, handle: AbortHandle) {
        let mut timer = self.shared.timer.lock().unwrap_or_else(PoisonError::into_inner);
        match *timer {
            Timer::Disarmed => handle.abort(),
            _ => *timer = Timer::Armed(handle),
        }
    }

    /// Cancel the timer. Cancelling a timer that was never armed or has
    /// already fired does nothing.
    fn disarm_timer(&self) {
        let mut timer = self.shared.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Timer::Armed(handle) = std::mem::replace(&mut *timer, Timer::Disarmed) {
            handle.abort();
        }
    }
}

/// Read side of an execution's result.
#[derive(Clone, Debug)]
pub struct Outcome {
    rx: watch::Receiver<Slot>,
}

impl Outcome {
    pub fn is_settled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// The result if the execution has settled, without waiting.
    pub fn peek(&self) -> Option<Result<Response, RequestError>> {
        self.rx.borrow().clone()
    }

    /// Wait for settlement.
    pub async fn wait(&self) -> Result<Response, RequestError> {
        let mut rx = self.rx.clone();
        // the watch guard has to drop before `rx` does
        let settled = match rx.wait_for(|slot| slot.is_some()).await {
            Ok(slot) => match &*slot {
                Some(result) => result.clone(),
                None => Err(abandoned()),
            },
            Err(_) => Err(abandoned()),
        };
        settled
    }

    /// Wait for settlement and report it as a value instead of an error.
    pub async fn reflect(&self) -> Inspection {
        match self.wait().await {
            Ok(response) => Inspection::Fulfilled(response),
            Err(err) => Inspection::Rejected(err),
        }
    }
}

fn abandoned() -> RequestError {
    RequestError::response_processing("request execution ended without settling", None)
}

impl IntoFuture for Outcome {
    type Output = Result<Response, RequestError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.wait().await })
    }
}

/// A settled outcome observed without propagating failure.
#[derive(Debug, Clone)]
pub enum Inspection {
    Fulfilled(Response),
    Rejected(RequestError),
}

impl Inspection {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Inspection::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Inspection::Rejected(_))
    }

    pub fn value(&self) -> Option<&Response> {
        match self {
            Inspection::Fulfilled(response) => Some(response),
            Inspection::Rejected(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&RequestError> {
        match self {
            Inspection::Fulfilled(_) => None,
            Inspection::Rejected(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::error::ErrorKind;
    use crate::http::ResponseHead;

    fn ok(status: u16) -> Result<Response, RequestError> {
        let head = ResponseHead {
            status: Some(status),
            ..Default::default()
        };
        Ok(Response::assemble(head, Bytes::new(), false))
    }

    #[tokio::test]
    async fn first_settlement_wins() {
        let (outcome, settler) = deferred();
        assert!(!outcome.is_settled());
        assert!(settler.settle(ok(200)));
        assert!(!settler.settle(Err(RequestError::transport("late", None))));
        assert_eq!(outcome.wait().await.unwrap().status(), 200);
    }

    #[tokio::test]
    async fn every_clone_observes_the_same_result() {
        let (outcome, settler) = deferred();
        let first = outcome.clone();
        let second = outcome.clone();
        let waiter = tokio::spawn(async move { first.wait().await });
        settler.settle(Err(RequestError::transport("socket hang up", None)));
        assert_eq!(waiter.await.unwrap().unwrap_err().message(), "socket hang up");
        assert_eq!(second.await.unwrap_err().message(), "socket hang up");
    }

    #[tokio::test]
    async fn pending_wait_resumes_on_settlement() {
        let (outcome, settler) = deferred();
        let pending = outcome.clone();
        let waiter = tokio::spawn(async move { pending.wait().await });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        settler.settle(ok(202));
        assert_eq!(waiter.await.unwrap().unwrap().status(), 202);
        assert!(format!("{outcome:?}").starts_with("Outcome"));
    }

    #[tokio::test]
    async fn reflect_turns_failure_into_value() {
        let (outcome, settler) = deferred();
        settler.settle(Err(RequestError::transport("boom", None)));
        let inspection = outcome.reflect().await;
        assert!(inspection.is_rejected());
        assert_eq!(inspection.reason().unwrap().message(), "boom");
        assert!(inspection.value().is_none());
    }

    #[tokio::test]
    async fn settlement_disarms_the_timer() {
        let (_outcome, settler) = deferred();
        let timer = tokio::spawn(tokio::time::sleep(Duration::from_secs(3600)));
        settler.arm_timer(timer.abort_handle());
        settler.settle(ok(200));
        assert!(timer.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn arming_after_settlement_cancels_immediately() {
        let (_outcome, settler) = deferred();
        settler.settle(ok(204));
        let timer = tokio::spawn(tokio::time::sleep(Duration::from_secs(3600)));
        settler.arm_timer(timer.abort_handle());
        assert!(timer.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn dropped_settler_reports_abandonment() {
        let (outcome, settler) = deferred();
        drop(settler);
        let err = outcome.wait().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResponseProcessing);
    }

    #[test]
    fn peek_before_and_after() {
        let (outcome, settler) = deferred();
        assert!(outcome.peek().is_none());
        settler.settle(ok(201));
        assert_eq!(outcome.peek().unwrap().unwrap().status(), 201);
    }
}
