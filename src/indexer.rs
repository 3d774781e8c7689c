use std::fs;
use std::path::{ Path, PathBuf };
use std::sync::Arc;

use walkdir::WalkDir;

use crate::collection::VectorCollection;
use crate::embedding::{ ImageEmbedder, TextEmbedder };
use crate::error::RagError;
use crate::models::{ DocumentRecord, Metadata };

const SUPPORTED_TEXT_EXTENSIONS: &[&str] = &[
    "txt",
    "md",
    "rs",
    "py",
    "js",
    "json",
    "yaml",
    "yml",
    "toml",
    "css",
    "html",
    "htm",
    "xml",
    "csv",
    "log",
    "pdf",
];

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

const CHUNK_CHARS: usize = 1000;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub indexed_files: usize,
    pub documents: usize,
    pub skipped: usize,
}

pub struct Indexer {
    text_embedder: Arc<dyn TextEmbedder>,
    image_embedder: Arc<dyn ImageEmbedder>,
    collection: Arc<dyn VectorCollection>,
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
}

fn base_metadata(path: &Path, kind: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("source".to_string(), path.to_string_lossy().to_string());
    metadata.insert("kind".to_string(), kind.to_string());
    if let Some(mime) = mime_guess::from_path(path).first() {
        metadata.insert("mime_type".to_string(), mime.to_string());
    }
    metadata.insert("indexed_at".to_string(), chrono::Utc::now().to_rfc3339());
    metadata
}

/// Splits `content` into chunks of at most `max_chars` characters, preferring
/// paragraph breaks, then whitespace.
pub fn chunk_text(content: &str, max_chars: usize) -> Vec<String> {
    fn flush(current: &mut String, chunks: &mut Vec<String>) {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        current.clear();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in content.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        let sep = if current.is_empty() { 0 } else { 2 };
        if current.chars().count() + sep + paragraph.chars().count() <= max_chars {
            if sep > 0 {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
            continue;
        }

        flush(&mut current, &mut chunks);

        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();
            if word_len > max_chars {
                flush(&mut current, &mut chunks);
                let chars: Vec<char> = word.chars().collect();
                for piece in chars.chunks(max_chars) {
                    chunks.push(piece.iter().collect());
                }
                continue;
            }

            let sep = if current.is_empty() { 0 } else { 1 };
            if current.chars().count() + sep + word_len > max_chars {
                flush(&mut current, &mut chunks);
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
    }

    flush(&mut current, &mut chunks);
    chunks
}

impl Indexer {
    pub fn new(
        text_embedder: Arc<dyn TextEmbedder>,
        image_embedder: Arc<dyn ImageEmbedder>,
        collection: Arc<dyn VectorCollection>
    ) -> Self {
        Self {
            text_embedder,
            image_embedder,
            collection,
        }
    }

    fn extract_text_content(&self, path: &Path, extension: &str) -> Result<String, RagError> {
        match extension {
            "pdf" => {
                let bytes = fs::read(path)?;
                pdf_extract
                    ::extract_text_from_mem(&bytes)
                    .map_err(|e| RagError::PdfExtraction(e.to_string()))
            }
            _ if SUPPORTED_TEXT_EXTENSIONS.contains(&extension) => {
                fs::read_to_string(path).map_err(RagError::Io)
            }
            _ => Err(RagError::UnsupportedFileType(extension.to_string())),
        }
    }

    /// Indexes one file and returns the number of documents it produced.
    pub async fn index_file(&self, path: &Path) -> Result<usize, RagError> {
        let metadata = fs::metadata(path)?;
        let extension = lowercase_extension(path).unwrap_or_default();

        if !metadata.is_file() {
            return Err(RagError::UnsupportedFileType(extension));
        }

        let records = if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            let embedding = self.image_embedder
                .embed_images(&[path.to_path_buf()])?
                .into_iter()
                .next()
                .ok_or_else(|| RagError::Embedding("no image embedding returned".to_string()))?;

            vec![DocumentRecord {
                document: path.to_string_lossy().to_string(),
                metadata: base_metadata(path, "image"),
                embedding,
            }]
        } else {
            let content = self.extract_text_content(path, &extension)?;
            let chunks = chunk_text(&content, CHUNK_CHARS);
            let embeddings = self.text_embedder.embed_texts(&chunks)?;
            if embeddings.len() != chunks.len() {
                return Err(
                    RagError::Embedding(
                        format!("{} chunks but {} embeddings", chunks.len(), embeddings.len())
                    )
                );
            }

            chunks
                .into_iter()
                .zip(embeddings)
                .enumerate()
                .map(|(i, (chunk, embedding))| {
                    let mut metadata = base_metadata(path, "text");
                    metadata.insert("chunk".to_string(), i.to_string());
                    DocumentRecord {
                        document: chunk,
                        metadata,
                        embedding,
                    }
                })
                .collect()
        };

        let count = records.len();
        self.collection.add(records).await?;
        tracing::debug!("Indexed {} ({} documents)", path.display(), count);
        Ok(count)
    }

    pub async fn index_directory(&self, dir_path: PathBuf) -> Result<IndexReport, RagError> {
        let mut report = IndexReport::default();

        for entry in WalkDir::new(&dir_path) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            match self.index_file(entry.path()).await {
                Ok(documents) => {
                    report.indexed_files += 1;
                    report.documents += documents;
                }
                Err(RagError::UnsupportedFileType(ext)) => {
                    tracing::debug!("Skipping {} (unsupported type '{}')", entry.path().display(), ext);
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!("Error indexing {}: {}", entry.path().display(), e);
                    report.skipped += 1;
                }
            }
        }

        tracing::info!(
            "Indexed {} files into {} documents from {} ({} skipped)",
            report.indexed_files,
            report.documents,
            dir_path.display(),
            report.skipped
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::SurrealCollection;
    use crate::models::QueryResults;
    use async_trait::async_trait;
    use std::sync::atomic::{ AtomicUsize, Ordering };
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct LengthEmbedder;

    impl TextEmbedder for LengthEmbedder {
        fn embed_text(&self, text: &str) -> Result<Vec<f32>, RagError> {
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    impl ImageEmbedder for LengthEmbedder {
        fn embed_images(&self, paths: &[PathBuf]) -> Result<Vec<Vec<f32>>, RagError> {
            Ok(
                paths
                    .iter()
                    .map(|_| vec![0.0, 1.0])
                    .collect()
            )
        }
    }

    #[derive(Default)]
    struct BatchCountingEmbedder {
        batches: AtomicUsize,
        single_calls: AtomicUsize,
    }

    impl TextEmbedder for BatchCountingEmbedder {
        fn embed_text(&self, _: &str) -> Result<Vec<f32>, RagError> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0])
        }

        fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            Ok(
                texts
                    .iter()
                    .map(|t| vec![t.len() as f32])
                    .collect()
            )
        }
    }

    #[derive(Default)]
    struct MemoryCollection {
        records: Mutex<Vec<DocumentRecord>>,
    }

    #[async_trait]
    impl VectorCollection for MemoryCollection {
        async fn query(&self, _: &[Vec<f32>], _: usize) -> Result<QueryResults, RagError> {
            Ok(QueryResults::default())
        }

        async fn add(&self, records: Vec<DocumentRecord>) -> Result<(), RagError> {
            self.records.lock().unwrap().extend(records);
            Ok(())
        }

        async fn count(&self) -> Result<usize, RagError> {
            Ok(self.records.lock().unwrap().len())
        }
    }

    fn setup_indexer() -> (Indexer, Arc<MemoryCollection>) {
        let collection = Arc::new(MemoryCollection::default());
        let indexer = Indexer::new(
            Arc::new(LengthEmbedder),
            Arc::new(LengthEmbedder),
            collection.clone()
        );
        (indexer, collection)
    }

    #[test]
    fn test_chunk_text_keeps_small_paragraphs_together() {
        let chunks = chunk_text("first para\n\nsecond para\n\n\n", 100);
        assert_eq!(chunks, vec!["first para\n\nsecond para".to_string()]);
    }

    #[test]
    fn test_chunk_text_respects_limit() {
        let content = "word ".repeat(50);
        let chunks = chunk_text(&content, 20);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        assert_eq!(chunks.join(" ").split_whitespace().count(), 50);
    }

    #[test]
    fn test_chunk_text_splits_oversized_words() {
        let chunks = chunk_text(&"x".repeat(25), 10);
        assert_eq!(chunks, vec!["x".repeat(10), "x".repeat(10), "x".repeat(5)]);
    }

    #[test]
    fn test_chunk_text_empty_input() {
        assert!(chunk_text("   \n\n  ", 10).is_empty());
    }

    #[tokio::test]
    async fn test_image_becomes_path_document() -> anyhow::Result<()> {
        let (indexer, collection) = setup_indexer();
        let dir = TempDir::new()?;
        let image = dir.path().join("Figure.PNG");
        fs::write(&image, b"\x89PNG")?;

        assert_eq!(indexer.index_file(&image).await?, 1);

        let records = collection.records.lock().unwrap();
        assert_eq!(records[0].document, image.to_string_lossy());
        assert_eq!(records[0].metadata.get("kind").map(String::as_str), Some("image"));
        assert_eq!(
            records[0].metadata.get("source").map(String::as_str),
            Some(image.to_string_lossy().as_ref())
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_unsupported_file_types() -> anyhow::Result<()> {
        let (indexer, _collection) = setup_indexer();
        let dir = TempDir::new()?;
        let file = dir.path().join("test.xyz");
        fs::write(&file, "Some content")?;

        let result = indexer.index_file(&file).await;
        assert!(matches!(result, Err(RagError::UnsupportedFileType(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_pdf_is_an_error() -> anyhow::Result<()> {
        let (indexer, _collection) = setup_indexer();
        let dir = TempDir::new()?;
        let pdf = dir.path().join("test.pdf");
        fs::write(&pdf, b"Not a real PDF file")?;

        assert!(indexer.index_file(&pdf).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_directory_indexing() -> anyhow::Result<()> {
        let (indexer, collection) = setup_indexer();
        let dir = TempDir::new()?;

        let files: [(&str, &[u8]); 4] = [
            ("guide.md", b"Install the toolchain.\n\nThen run the build."),
            ("notes.txt", b"Short note"),
            ("nested/diagram.jpg", b"jpeg bytes"),
            ("nested/binary.bin", b"\x00\x01"),
        ];
        for (path, content) in files {
            let full_path = dir.path().join(path);
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&full_path, content)?;
        }

        let report = indexer.index_directory(dir.path().to_path_buf()).await?;
        assert_eq!(report, IndexReport {
            indexed_files: 3,
            documents: 3,
            skipped: 1,
        });
        assert_eq!(collection.count().await?, 3);

        let records = collection.records.lock().unwrap();
        let text = records
            .iter()
            .find(|r| r.metadata.get("source").map_or(false, |s| s.ends_with("guide.md")))
            .expect("guide.md indexed");
        assert_eq!(text.document, "Install the toolchain.\n\nThen run the build.");
        assert_eq!(text.metadata.get("chunk").map(String::as_str), Some("0"));
        assert!(text.metadata.contains_key("indexed_at"));

        let note = records
            .iter()
            .find(|r| r.document == "Short note")
            .expect("notes.txt indexed");
        assert_eq!(note.metadata.get("mime_type").map(String::as_str), Some("text/plain"));
        Ok(())
    }

    #[tokio::test]
    async fn test_chunks_are_embedded_in_one_batch() -> anyhow::Result<()> {
        let embedder = Arc::new(BatchCountingEmbedder::default());
        let collection = Arc::new(MemoryCollection::default());
        let indexer = Indexer::new(embedder.clone(), Arc::new(LengthEmbedder), collection.clone());

        let dir = TempDir::new()?;
        let file = dir.path().join("long.txt");
        let paragraph = "lorem ipsum ".repeat(60);
        fs::write(&file, format!("{}\n\n{}\n\n{}", paragraph, paragraph, paragraph))?;

        let documents = indexer.index_file(&file).await?;
        assert!(documents > 1);
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 1);
        assert_eq!(embedder.single_calls.load(Ordering::SeqCst), 0);
        assert_eq!(collection.count().await?, documents);
        Ok(())
    }

    #[tokio::test]
    async fn test_reindexing_does_not_duplicate_documents() -> anyhow::Result<()> {
        let db_dir = TempDir::new()?;
        let db_path = db_dir.path().join("test_db");
        let collection = Arc::new(SurrealCollection::open(db_path.to_str().unwrap()).await?);
        let indexer = Indexer::new(
            Arc::new(LengthEmbedder),
            Arc::new(LengthEmbedder),
            collection.clone()
        );

        let dir = TempDir::new()?;
        fs::write(dir.path().join("a.txt"), "hello world")?;
        fs::write(dir.path().join("b.md"), "first\n\nsecond")?;
        fs::write(dir.path().join("c.png"), b"png bytes")?;

        let first = indexer.index_directory(dir.path().to_path_buf()).await?;
        let count = collection.count().await?;
        assert_eq!(count, first.documents);

        indexer.index_directory(dir.path().to_path_buf()).await?;
        assert_eq!(collection.count().await?, count);

        let results = collection.query(&[vec![11.0, 1.0]], 5).await?;
        let hello_hits = results.documents[0]
            .iter()
            .filter(|d| d.as_str() == "hello world")
            .count();
        assert_eq!(hello_hits, 1);
        Ok(())
    }
}
