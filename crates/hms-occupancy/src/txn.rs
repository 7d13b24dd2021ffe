//! # Scoped Transactions
//!
//! [`transact`] owns the begin/commit/rollback protocol so no operation can
//! forget it: the body runs against a fresh transaction, `Ok` commits, `Err`
//! rolls back. If the body panics or its future is dropped, the transaction
//! handle is dropped with it, which the store contract defines as a rollback.

use std::future::Future;
use std::pin::Pin;

use hms_store::{ResourceStore, StoreTransaction};

use crate::error::OccupancyError;

/// Future returned by a [`transact`] body, borrowing the transaction.
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = Result<T, OccupancyError>> + Send + 't>>;

/// Run `body` inside one transaction on `store`.
///
/// `op` names the operation in logs. Commit failures (including constraint
/// violations detected at commit) are returned like body failures.
pub async fn transact<S, T, F>(store: &S, op: &'static str, body: F) -> Result<T, OccupancyError>
where
    S: ResourceStore,
    T: Send,
    F: for<'t> FnOnce(&'t mut S::Tx) -> TxFuture<'t, T> + Send,
{
    let mut tx = store.begin().await?;
    match body(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            tracing::debug!(op, error = %err, "operation rejected, rolling back");
            if let Err(rollback) = tx.rollback().await {
                tracing::warn!(op, error = %rollback, "rollback failed");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hms_core::{NewRoom, RoomId, RoomStatus};
    use hms_store::{MemoryStore, StoreConfig};

    use super::*;

    fn room(number: &str) -> NewRoom {
        NewRoom {
            room_number: number.into(),
            room_type: None,
            status: RoomStatus::Available,
        }
    }

    #[tokio::test]
    async fn ok_commits() {
        let store = MemoryStore::default();
        let id = transact(&store, "test", |tx| {
            Box::pin(async move { Ok::<_, OccupancyError>(tx.insert_room(&room("1")).await?) })
        })
        .await
        .unwrap();
        assert!(store.room(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn err_rolls_back_every_write() {
        let store = MemoryStore::default();
        let err = transact(&store, "test", |tx| {
            Box::pin(async move {
                tx.insert_room(&room("1")).await?;
                Err::<(), _>(OccupancyError::RoomNotFound(RoomId(9)))
            })
        })
        .await
        .unwrap_err();
        assert!(matches!(err, OccupancyError::RoomNotFound(RoomId(9))));
        assert!(store.snapshot().await.unwrap().rooms.is_empty());
    }

    #[tokio::test]
    async fn locks_are_released_after_rejection() {
        let store =
            MemoryStore::new(StoreConfig::default().with_lock_timeout(Duration::from_millis(50)));
        let _ = transact(&store, "test", |tx| {
            Box::pin(async move {
                tx.lock_room(RoomId(1)).await?;
                Err::<(), _>(OccupancyError::RoomNotFound(RoomId(1)))
            })
        })
        .await;
        assert_eq!(store.lock_table_len(), 0);
    }

    #[tokio::test]
    async fn store_constraint_failures_pass_through() {
        let store = MemoryStore::default();
        let mut other = store.begin().await.unwrap();
        other.insert_room(&room("7")).await.unwrap();
        other.commit().await.unwrap();

        let err = transact(&store, "test", |tx| {
            Box::pin(async move { Ok::<_, OccupancyError>(tx.insert_room(&room("7")).await?) })
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Internal);
    }
}
