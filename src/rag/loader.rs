use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use super::{ChunkMetadata, DocumentChunk, DocumentLoader, LoadedFolder, RagError};

const EXTENSIONS: &[&str] = &["txt", "md"];

/// Plain-text loader for `.txt` and `.md` files under a fixed root.
///
/// Form feeds separate pages; blank lines separate paragraphs. Paragraphs are
/// packed into chunks of at most `max_chars` characters.
pub struct TextDocumentLoader {
    root: PathBuf,
    max_chars: usize,
}

impl TextDocumentLoader {
    pub fn new(root: impl Into<PathBuf>, max_chars: usize) -> Self {
        Self {
            root: root.into(),
            max_chars: max_chars.max(1),
        }
    }

    /// Resolve a folder relative to the root, refusing anything that escapes it
    fn resolve(&self, folder: &str) -> Result<PathBuf, RagError> {
        let relative = Path::new(folder);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if folder.trim().is_empty() || escapes {
            return Err(RagError::InvalidFolder(folder.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn is_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Split a page into paragraph-aligned chunks no longer than `max_chars`
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        for piece in split_long(paragraph, max_chars) {
            let needed = if current.is_empty() { 0 } else { 2 } + piece.chars().count();
            if !current.is_empty() && current.chars().count() + needed > max_chars {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(&piece);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Break an oversized paragraph on word boundaries, hard-splitting giant words
fn split_long(paragraph: &str, max_chars: usize) -> Vec<String> {
    if paragraph.chars().count() <= max_chars {
        return vec![paragraph.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            pieces.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            continue;
        }

        let sep = if current.is_empty() { 0 } else { 1 };
        if current.chars().count() + sep + word_len > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[async_trait]
impl DocumentLoader for TextDocumentLoader {
    async fn load(&self, folder: &str) -> Result<LoadedFolder, RagError> {
        let dir = self.resolve(folder)?;
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(RagError::FolderNotFound(folder.to_string())),
        }

        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && is_document(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut loaded = LoadedFolder::default();
        for path in paths {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_name.clone());

            let content = tokio::fs::read_to_string(&path).await?;
            let before = loaded.chunks.len();
            for (index, page) in content.split('\u{c}').enumerate() {
                for text in chunk_text(page, self.max_chars) {
                    loaded.chunks.push(DocumentChunk {
                        text,
                        title: title.clone(),
                        metadata: ChunkMetadata {
                            source: file_name.clone(),
                            page: index as u32 + 1,
                        },
                    });
                }
            }

            tracing::debug!("Chunked {} into {} chunks", file_name, loaded.chunks.len() - before);
            loaded.files.push(file_name);
        }

        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_pack_up_to_limit() {
        let text = "aaaa\n\nbbbb\n\ncccc";
        assert_eq!(chunk_text(text, 10), vec!["aaaa\n\nbbbb", "cccc"]);
        assert_eq!(chunk_text(text, 100), vec!["aaaa\n\nbbbb\n\ncccc"]);
    }

    #[test]
    fn long_paragraphs_split_on_words() {
        let chunks = chunk_text("one two three four five", 9);
        assert_eq!(chunks, vec!["one two", "three", "four five"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 9));
    }

    #[test]
    fn giant_words_are_hard_split() {
        assert_eq!(chunk_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn blank_input_has_no_chunks() {
        assert!(chunk_text("\n\n   \n\n", 10).is_empty());
    }

    #[test]
    fn folder_must_stay_under_root() {
        let loader = TextDocumentLoader::new("/srv/docs", 100);
        assert!(loader.resolve("books/2024").is_ok());
        assert!(matches!(loader.resolve("../etc"), Err(RagError::InvalidFolder(_))));
        assert!(matches!(loader.resolve("/etc"), Err(RagError::InvalidFolder(_))));
        assert!(matches!(loader.resolve(""), Err(RagError::InvalidFolder(_))));
    }

    #[tokio::test]
    async fn loads_text_and_markdown_files() {
        let root = std::env::temp_dir().join(format!("orgadmin-loader-{}", uuid::Uuid::new_v4()));
        let folder = root.join("books");
        tokio::fs::create_dir_all(&folder).await.unwrap();
        tokio::fs::write(folder.join("guide.md"), "intro\n\nbody\u{c}second page").await.unwrap();
        tokio::fs::write(folder.join("notes.TXT"), "note").await.unwrap();
        tokio::fs::write(folder.join("scan.pdf"), "%PDF").await.unwrap();

        let loader = TextDocumentLoader::new(&root, 100);
        let loaded = loader.load("books").await.unwrap();

        assert_eq!(loaded.files, vec!["guide.md".to_string(), "notes.TXT".to_string()]);
        assert_eq!(loaded.chunks.len(), 3);
        assert_eq!(loaded.chunks[0].title, "guide");
        assert_eq!(loaded.chunks[1].metadata.page, 2);

        assert!(matches!(loader.load("missing").await, Err(RagError::FolderNotFound(_))));
        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
