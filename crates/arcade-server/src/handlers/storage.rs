//! Storage fetch, write and remove.

use arcade_core::messages::{StorageData, StorageKeys};
use arcade_core::{ErrorCode, Payload};
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::pipeline::{HandlerContext, HandlerError, PayloadHandler, Reply};
use crate::storage::StorageError;

impl From<StorageError> for HandlerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(msg) => HandlerError::bad_input(msg),
            err @ StorageError::DuplicateKey { .. } => HandlerError::bad_input(err.to_string()),
            err @ StorageError::VersionMismatch { .. } => {
                HandlerError::new(ErrorCode::StorageRejected, err.to_string())
            }
        }
    }
}

pub struct StorageFetchHandler;

#[async_trait]
impl PayloadHandler for StorageFetchHandler {
    #[instrument(skip_all, fields(payload = "storage_fetch"))]
    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        payload: &Payload,
    ) -> Result<Reply, HandlerError> {
        let Payload::StorageFetch(fetch) = payload else {
            return Err(HandlerError::bad_input("Expected storage_fetch"));
        };
        if fetch.keys.is_empty() {
            return Err(HandlerError::bad_input("At least one fetch key is required"));
        }
        let data = ctx
            .services
            .storage
            .fetch(ctx.session.user_id().as_str(), &fetch.keys)?;
        debug!(requested = fetch.keys.len(), found = data.len(), "storage fetch");
        Ok(Reply::Payload(Payload::StorageData(StorageData { data })))
    }
}

pub struct StorageWriteHandler;

#[async_trait]
impl PayloadHandler for StorageWriteHandler {
    #[instrument(skip_all, fields(payload = "storage_write"))]
    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        payload: &Payload,
    ) -> Result<Reply, HandlerError> {
        let Payload::StorageWrite(write) = payload else {
            return Err(HandlerError::bad_input("Expected storage_write"));
        };
        if write.data.is_empty() {
            return Err(HandlerError::bad_input("At least one write value is required"));
        }
        let keys = ctx
            .services
            .storage
            .write(ctx.session.user_id().as_str(), &write.data)?;
        Ok(Reply::Payload(Payload::StorageKeys(StorageKeys { keys })))
    }
}

pub struct StorageRemoveHandler;

#[async_trait]
impl PayloadHandler for StorageRemoveHandler {
    #[instrument(skip_all, fields(payload = "storage_remove"))]
    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        payload: &Payload,
    ) -> Result<Reply, HandlerError> {
        let Payload::StorageRemove(remove) = payload else {
            return Err(HandlerError::bad_input("Expected storage_remove"));
        };
        if remove.keys.is_empty() {
            return Err(HandlerError::bad_input("At least one remove key is required"));
        }
        ctx.services
            .storage
            .remove(ctx.session.user_id().as_str(), &remove.keys)?;
        Ok(Reply::Ack)
    }
}
