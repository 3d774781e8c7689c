use std::path::PathBuf;

use fastembed::{
    EmbeddingModel,
    ImageEmbedding,
    ImageEmbeddingModel,
    ImageInitOptions,
    InitOptions,
    TextEmbedding,
};

use crate::error::RagError;

pub trait TextEmbedder: Send + Sync {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, RagError>;

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        texts
            .iter()
            .map(|text| self.embed_text(text))
            .collect()
    }
}

pub trait ImageEmbedder: Send + Sync {
    fn embed_images(&self, paths: &[PathBuf]) -> Result<Vec<Vec<f32>>, RagError>;
}

/// CLIP ViT-B/32 text and vision towers, so text queries land in the same
/// space as indexed images.
pub struct ClipEmbedder {
    text_model: TextEmbedding,
    image_model: ImageEmbedding,
}

impl ClipEmbedder {
    pub fn new() -> Result<Self, RagError> {
        let text_model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::ClipVitB32).with_show_download_progress(true)
        ).map_err(|e| RagError::Embedding(e.to_string()))?;

        let image_model = ImageEmbedding::try_new(
            ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32).with_show_download_progress(true)
        ).map_err(|e| RagError::Embedding(e.to_string()))?;

        Ok(Self {
            text_model,
            image_model,
        })
    }
}

impl TextEmbedder for ClipEmbedder {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, RagError> {
        self.text_model
            .embed(vec![text.to_string()], None)
            .map_err(|e| RagError::Embedding(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("model returned no embedding".to_string()))
    }

    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.text_model
            .embed(texts.to_vec(), None)
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(
                RagError::Embedding(
                    format!("expected {} text embeddings, got {}", texts.len(), embeddings.len())
                )
            );
        }

        Ok(embeddings)
    }
}

impl ImageEmbedder for ClipEmbedder {
    fn embed_images(&self, paths: &[PathBuf]) -> Result<Vec<Vec<f32>>, RagError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self.image_model
            .embed(paths.to_vec(), None)
            .map_err(|e| RagError::Embedding(e.to_string()))?;

        if embeddings.len() != paths.len() {
            return Err(
                RagError::Embedding(
                    format!("expected {} image embeddings, got {}", paths.len(), embeddings.len())
                )
            );
        }

        Ok(embeddings)
    }
}
