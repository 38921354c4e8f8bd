//! Observer capabilities attached to entities.
//!
//! An observer is bound to one entity and one hook (work-in, work-out,
//! state-update). Entities invoke their observers strictly in registration
//! order, awaiting each to completion before starting the next. The first
//! failure aborts the hook and propagates out of the replay.
//!
//! Side-effect-only closures are wrapped with [`observer_fn`] so that every
//! registrant shares the one asynchronous signature.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::record::Record;

/// Boxed error type carried by [`ObserverError`].
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Failure reported by an observer. Always fatal to the replay.
#[derive(Debug, thiserror::Error)]
#[error("observer failed: {source}")]
pub struct ObserverError {
    #[source]
    source: BoxError,
}

impl ObserverError {
    /// Wrap any error (or message) as an observer failure.
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// The underlying error.
    pub fn inner(&self) -> &(dyn Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

/// A subscriber notified when an entity of type `E` handles a record.
///
/// The entity is passed in the state it has at notification time: for
/// work-out and state-update hooks, processing time has already accrued but
/// the state, timestamps and reset have not yet been applied.
#[async_trait]
pub trait Observer<E>: Send + Sync {
    async fn notify(&self, record: &Record, entity: &E) -> Result<(), ObserverError>;
}

/// Shared handle to an observer, as stored in an entity's hook list.
pub type ObserverRef<E> = Arc<dyn Observer<E>>;

/// Adapter turning a synchronous closure into an [`Observer`].
pub struct FnObserver<F>(F);

impl<F> fmt::Debug for FnObserver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnObserver(<fn>)")
    }
}

#[async_trait]
impl<E, F> Observer<E> for FnObserver<F>
where
    E: Sync,
    F: Fn(&Record, &E) -> Result<(), ObserverError> + Send + Sync,
{
    async fn notify(&self, record: &Record, entity: &E) -> Result<(), ObserverError> {
        (self.0)(record, entity)
    }
}

/// Wrap a synchronous closure as a shareable observer.
pub fn observer_fn<E, F>(f: F) -> ObserverRef<E>
where
    E: Sync + 'static,
    F: Fn(&Record, &E) -> Result<(), ObserverError> + Send + Sync + 'static,
{
    Arc::new(FnObserver(f))
}

/// Run `observers` in order against `entity`, stopping at the first failure.
pub(crate) async fn notify_all<E: Sync>(
    observers: &[ObserverRef<E>],
    record: &Record,
    entity: &E,
) -> Result<(), ObserverError> {
    for observer in observers {
        observer.notify(record, entity).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observer_error_wraps_messages() {
        let err = ObserverError::new("sink unreachable");
        assert_eq!(err.to_string(), "observer failed: sink unreachable");
        assert_eq!(err.inner().to_string(), "sink unreachable");
    }

    #[test]
    fn observer_error_keeps_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = ObserverError::new(io);
        assert!(err.source().is_some());
    }
}
