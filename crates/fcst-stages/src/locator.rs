//! Resource Locator: name-based lookup in the remote registry
use fcst_core::{ForecastError, ForecastRegistry, StageKind, StageResource};
use std::sync::Arc;

#[derive(Clone)]
pub struct ResourceLocator {
    registry: Arc<dyn ForecastRegistry>,
}

impl ResourceLocator {
    pub fn new(registry: Arc<dyn ForecastRegistry>) -> Self {
        Self { registry }
    }

    /// Scans the full listing of `kind` for a resource called `name`.
    ///
    /// `Ok(None)` means the registry answered and no such resource exists.
    /// A failed listing is reported as [`ForecastError::LookupFailed`] and
    /// must not be read as absence.
    pub async fn locate(
        &self,
        kind: StageKind,
        name: &str,
    ) -> Result<Option<StageResource>, ForecastError> {
        let listing = self.registry.list(kind).await.map_err(|source| {
            tracing::warn!(stage = %kind, %name, error = %source, "listing failed");
            ForecastError::LookupFailed { stage: kind, source }
        })?;

        let found = listing.into_iter().find(|r| r.name == name);
        tracing::debug!(stage = %kind, %name, found = found.is_some(), "lookup");
        Ok(found)
    }
}
