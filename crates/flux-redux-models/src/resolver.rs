//! Descriptor resolution with the install-and-wait fallback.
//!
//! Resolution returns exactly one matching model configuration. When the
//! registry comes up empty, a single heuristic-import job is submitted and
//! the resolver blocks on it with a fixed bound (600 s by default, sized for
//! a multi-gigabyte download) before re-querying. There is no retry beyond
//! that one attempt and no backoff; a registry that still has no match
//! afterwards fails the invocation loudly.

use crate::installer::{CancelToken, InstallOutcome, ModelInstaller};
use crate::registry::ModelRegistry;
use flux_redux_core::{ConfigOverrides, ModelConfigRecord, ReduxError, ReduxResult, StarterModel};
use std::sync::Arc;
use std::time::Duration;

/// Default install wait bound.
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(600);

/// Resolver tuning.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Upper bound on the install wait.
    pub install_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            install_timeout: DEFAULT_INSTALL_TIMEOUT,
        }
    }
}

/// Locates a required auxiliary model, installing it on demand.
pub struct ModelResolver {
    registry: Arc<dyn ModelRegistry>,
    installer: Arc<dyn ModelInstaller>,
    config: ResolverConfig,
}

impl ModelResolver {
    /// Build a resolver over the given collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<dyn ModelRegistry>,
        installer: Arc<dyn ModelInstaller>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            registry,
            installer,
            config,
        }
    }

    /// Resolve a starter model to exactly one registry record.
    ///
    /// A pre-populated registry is treated as already deduplicated by name,
    /// so the first match wins. After an install attempt, anything other
    /// than exactly one match is an error.
    ///
    /// # Errors
    ///
    /// - [`ReduxError::InstallTimeout`] if the wait timed out and the model
    ///   is still absent
    /// - [`ReduxError::ModelUnavailable`] if the install completed but the
    ///   registry still has no match
    /// - [`ReduxError::AmbiguousModel`] if the post-install registry holds
    ///   more than one match
    /// - [`ReduxError::Cancelled`] if the cancel token fired during the wait
    pub async fn resolve(
        &self,
        starter: &StarterModel,
        cancel: &CancelToken,
    ) -> ReduxResult<ModelConfigRecord> {
        let descriptor = &starter.descriptor;

        let matches = self.registry.search(descriptor).await?;
        if let Some(record) = matches.into_iter().next() {
            return Ok(record);
        }

        tracing::warn!(
            model = %descriptor.name,
            kind = %descriptor.kind,
            source = %starter.source,
            "required model is not installed; downloading and installing now, this may take a while"
        );

        // The installer's probe cannot reliably determine the kind, so pin
        // name and kind through the override record.
        let overrides = ConfigOverrides {
            name: descriptor.name.clone(),
            kind: descriptor.kind,
        };
        let job = self
            .installer
            .heuristic_import(&starter.source, &overrides)
            .await?;

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::warn!(model = %descriptor.name, "install wait cancelled");
                return Err(ReduxError::Cancelled);
            }
            outcome = self.installer.wait_for_job(&job, self.config.install_timeout) => outcome?,
        };

        let matches = self.registry.search(descriptor).await?;
        let count = matches.len();
        let mut iter = matches.into_iter();
        match (iter.next(), count) {
            (Some(record), 1) => Ok(record),
            (Some(_), n) => Err(ReduxError::AmbiguousModel {
                name: descriptor.name.clone(),
                count: n,
            }),
            (None, _) => {
                tracing::error!(
                    model = %descriptor.name,
                    kind = %descriptor.kind,
                    ?outcome,
                    "model still missing after install attempt"
                );
                match outcome {
                    InstallOutcome::TimedOut => Err(ReduxError::InstallTimeout {
                        name: descriptor.name.clone(),
                        timeout_secs: self.config.install_timeout.as_secs(),
                    }),
                    InstallOutcome::Completed => Err(ReduxError::ModelUnavailable {
                        name: descriptor.name.clone(),
                        kind: descriptor.kind,
                    }),
                }
            }
        }
    }
}
