use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with key '{key}'")]
    NotFound { entity: &'static str, key: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_not_found() {
        let err = CoreError::NotFound {
            entity: "AnnotationCollection",
            key: "page_01.png".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Entity not found: AnnotationCollection with key 'page_01.png'"
        );
    }

    #[test]
    fn display_validation() {
        let err = CoreError::Validation("class is required".to_string());
        assert_eq!(err.to_string(), "Validation failed: class is required");
    }
}
