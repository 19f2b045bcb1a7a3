//! Annotation service: validates client input and mediates store access.

use std::sync::Arc;

use crate::annotation::{Annotation, AnnotationRecord};
use crate::error::CoreError;
use crate::identity::validate_identity;
use crate::store::{AnnotationStore, COLLECTION_ENTITY};

/// Validating front for [`AnnotationStore`].
///
/// Cheap to clone; the store is shared.
#[derive(Clone)]
pub struct AnnotationService {
    store: Arc<AnnotationStore>,
}

impl AnnotationService {
    pub fn new(store: Arc<AnnotationStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    /// Validate `record` and append it to its image's collection.
    ///
    /// Returns the validated annotation as persisted.
    pub async fn save(&self, record: AnnotationRecord) -> Result<Annotation, CoreError> {
        let annotation = Annotation::try_from(record)?;
        let count = self
            .store
            .append(&annotation.image_name, annotation.clone())
            .await?;

        tracing::info!(
            image_name = %annotation.image_name,
            class = %annotation.class,
            shape = annotation.shape.tag(),
            count,
            "Annotation saved"
        );
        Ok(annotation)
    }

    /// Load every annotation saved for `identity`, in save order.
    pub async fn load(&self, identity: &str) -> Result<Vec<Annotation>, CoreError> {
        validate_identity(identity)?;
        self.store
            .load(identity)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: COLLECTION_ENTITY,
                key: identity.to_string(),
            })
    }
}
