use std::collections::HashMap;

pub const DEFAULT_EMBEDDING_MODEL: &str = "embed-base";

/// Model → vector width lookup for the embeddings endpoint.
///
/// The default model predates configurable widths and rejects a
/// `dimensions` field, so it maps to `None`.
#[derive(Debug, Clone)]
pub struct EmbeddingModels {
    default_model: String,
    dimensions: HashMap<String, u32>,
}

impl EmbeddingModels {
    pub fn new(default_model: impl Into<String>, dimensions: HashMap<String, u32>) -> Self {
        Self {
            default_model: default_model.into(),
            dimensions,
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn dimensions(&self) -> &HashMap<String, u32> {
        &self.dimensions
    }

    /// Width to send for `model`, or `None` to omit the field.
    pub fn dimensions_for(&self, model: &str) -> Option<u32> {
        if model == self.default_model {
            return None;
        }
        self.dimensions.get(model).copied()
    }
}

impl Default for EmbeddingModels {
    fn default() -> Self {
        let dimensions = [("embed-small-v3", 1536), ("embed-large-v3", 3072)]
            .into_iter()
            .map(|(model, width)| (model.to_string(), width))
            .collect();
        Self::new(DEFAULT_EMBEDDING_MODEL, dimensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_sends_no_dimensions() {
        let models = EmbeddingModels::default();
        assert_eq!(models.dimensions_for(DEFAULT_EMBEDDING_MODEL), None);
        assert_eq!(models.dimensions_for("embed-large-v3"), Some(3072));
        assert_eq!(models.dimensions_for("unknown"), None);
    }

    #[test]
    fn test_default_model_wins_even_if_listed() {
        let mut dims = HashMap::new();
        dims.insert("legacy".to_string(), 768);
        let models = EmbeddingModels::new("legacy", dims);
        assert_eq!(models.dimensions_for("legacy"), None);
    }
}
