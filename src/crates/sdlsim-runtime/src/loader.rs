//! Collaborator seams for loading model files
//!
//! Parsing SDL text is an external concern; the runtime consumes the
//! resolved declaration tree. [`SdlParser`] is that seam, and
//! [`FileResolver`] is its sibling for turning a path into bytes.
//! [`JsonParser`] ships as a working parser implementation over the AST's
//! serde form so hosts and tests can load complete models without the
//! textual frontend.

use crate::error::{CanvasError, Result};
use async_trait::async_trait;
use sdlsim_core::ast::FileDecl;
use std::collections::HashMap;
use std::path::PathBuf;

/// Produces the bytes behind a model path (filesystem, memory, remote)
#[async_trait]
pub trait FileResolver: Send + Sync {
    async fn resolve(&self, path: &str) -> Result<Vec<u8>>;
}

/// Parses model source into the resolved declaration tree
pub trait SdlParser: Send + Sync {
    fn parse(&self, source: &str, source_name: &str) -> Result<FileDecl>;
}

/// Resolver over an in-memory path table
#[derive(Debug, Default)]
pub struct MemoryResolver {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }
}

#[async_trait]
impl FileResolver for MemoryResolver {
    async fn resolve(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| CanvasError::Resolve(format!("no such entry: {path}")))
    }
}

/// Resolver over the local filesystem, rooted at a base directory
#[derive(Debug)]
pub struct FsResolver {
    root: PathBuf,
}

impl FsResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsResolver { root: root.into() }
    }
}

#[async_trait]
impl FileResolver for FsResolver {
    async fn resolve(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.root.join(path);
        tokio::fs::read(&full)
            .await
            .map_err(|e| CanvasError::Resolve(format!("{}: {e}", full.display())))
    }
}

/// Parser over the declaration tree's JSON serialization
#[derive(Debug, Default)]
pub struct JsonParser;

impl SdlParser for JsonParser {
    fn parse(&self, source: &str, source_name: &str) -> Result<FileDecl> {
        let mut file: FileDecl = serde_json::from_str(source)
            .map_err(|e| CanvasError::Parse(format!("{source_name}: {e}")))?;
        file.source = source_name.to_string();
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdlsim_core::ast::{InstanceDecl, SystemDecl};

    #[tokio::test]
    async fn test_memory_resolver_round_trip() {
        let mut resolver = MemoryResolver::new();
        resolver.insert("a.sdl", b"hello".to_vec());
        assert_eq!(resolver.resolve("a.sdl").await.unwrap(), b"hello");
        assert!(matches!(
            resolver.resolve("b.sdl").await,
            Err(CanvasError::Resolve(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_resolver_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("m.sdl.json"), b"{}").unwrap();
        let resolver = FsResolver::new(dir.path());
        assert_eq!(resolver.resolve("m.sdl.json").await.unwrap(), b"{}");
    }

    #[test]
    fn test_json_parser_round_trip() {
        let file = FileDecl::new("orig.sdl")
            .system(SystemDecl::new("Main").instance(InstanceDecl::new("cache", "Cache")));
        let json = serde_json::to_string(&file).unwrap();

        let parsed = JsonParser.parse(&json, "loaded.sdl").unwrap();
        assert_eq!(parsed.source, "loaded.sdl");
        assert_eq!(parsed.systems.len(), 1);
    }

    #[test]
    fn test_json_parser_rejects_garbage() {
        assert!(matches!(
            JsonParser.parse("not json", "x.sdl"),
            Err(CanvasError::Parse(_))
        ));
    }
}
