//! Target registration
//!
//! Maps a configured `(name, address)` pair to the durable identifier
//! stored in the `servers` table. Registering the same target again
//! returns the existing identifier instead of creating a new row.
//!
//! Registration is expected to run sequentially before any collector
//! starts. If a concurrent registration still wins the insert, the
//! uniqueness violation is absorbed by one extra lookup-then-insert pass.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::storage::{StorageBackend, StorageError};
use crate::{RegisteredTarget, Target};

/// How often a lookup-then-insert pass is repeated after losing an insert race
pub const MAX_DUPLICATE_RETRIES: usize = 1;

/// Registration failure for a single target
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("failed to register {target}: {source}")]
    Backend {
        target: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to register {target}: still conflicting after {retries} retry")]
    RetriesExhausted { target: String, retries: usize },
}

#[derive(Clone)]
pub struct TargetRegistry {
    backend: Arc<dyn StorageBackend>,
}

impl TargetRegistry {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Return the identifier for `(name, address)`, creating the row if needed.
    #[instrument(skip(self, description))]
    pub async fn register(
        &self,
        name: &str,
        address: &str,
        description: &str,
    ) -> Result<i64, RegistrationError> {
        let target = Target::new(name, address, description);
        let backend_error = |source| RegistrationError::Backend {
            target: target.to_string(),
            source,
        };

        for attempt in 0..=MAX_DUPLICATE_RETRIES {
            if let Some(id) = self
                .backend
                .lookup_target(name, address)
                .await
                .map_err(backend_error)?
            {
                debug!("server already registered with id {id}");
                return Ok(id);
            }

            match self.backend.insert_target(&target).await {
                Ok(id) => {
                    info!("registered new server with id {id}");
                    return Ok(id);
                }
                Err(e) if e.is_duplicate_key() => {
                    warn!(
                        "server was registered concurrently (attempt {}), looking it up again",
                        attempt + 1
                    );
                }
                Err(e) => return Err(backend_error(e)),
            }
        }

        Err(RegistrationError::RetriesExhausted {
            target: target.to_string(),
            retries: MAX_DUPLICATE_RETRIES,
        })
    }

    pub async fn register_target(
        &self,
        target: &Target,
    ) -> Result<RegisteredTarget, RegistrationError> {
        let store_id = self
            .register(&target.name, &target.address, &target.description)
            .await?;

        Ok(RegisteredTarget {
            target: target.clone(),
            store_id,
        })
    }

    /// Identifier of an already registered target, without creating one
    pub async fn lookup(
        &self,
        name: &str,
        address: &str,
    ) -> Result<Option<i64>, RegistrationError> {
        self.backend
            .lookup_target(name, address)
            .await
            .map_err(|source| RegistrationError::Backend {
                target: format!("{name} ({address})"),
                source,
            })
    }

    pub async fn exists(&self, store_id: i64) -> Result<bool, RegistrationError> {
        self.backend
            .target_exists(store_id)
            .await
            .map_err(|source| RegistrationError::Backend {
                target: format!("#{store_id}"),
                source,
            })
    }
}
