//! Model file discovery across candidate locations

use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Conventional location of the model relative to a search root
pub const DEFAULT_MODEL_FILE: &str = "ml/model.onnx";

/// Finds the model file among an ordered list of candidate paths.
pub struct ModelResolver {
    /// Configured model path, absolute or relative
    model_path: PathBuf,
    /// Directories tried, most specific first
    search_roots: Vec<PathBuf>,
}

impl ModelResolver {
    /// Resolver searching the working directory, then its parent.
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        let search_roots = match std::env::current_dir() {
            Ok(cwd) => {
                let parent = cwd.parent().map(Path::to_path_buf);
                std::iter::once(cwd).chain(parent).collect()
            }
            Err(_) => Vec::new(),
        };
        Self::with_search_roots(model_path, search_roots)
    }

    /// Resolver with explicit search roots
    pub fn with_search_roots(model_path: impl Into<PathBuf>, search_roots: Vec<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            search_roots,
        }
    }

    /// Candidate paths in priority order.
    ///
    /// An absolute configured path comes first. Then, per root, the
    /// configured relative path followed by the conventional location.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates: Vec<PathBuf> = Vec::new();

        if self.model_path.is_absolute() {
            candidates.push(self.model_path.clone());
        }

        for root in &self.search_roots {
            if !self.model_path.is_absolute() {
                candidates.push(root.join(&self.model_path));
            }
            candidates.push(root.join(DEFAULT_MODEL_FILE));
        }

        let mut unique = Vec::with_capacity(candidates.len());
        for path in candidates {
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        unique
    }

    /// First candidate that exists as a file, if any
    pub fn resolve_path(&self) -> Option<PathBuf> {
        let candidates = self.candidates();

        for path in &candidates {
            if path.is_file() {
                info!(path = %path.display(), "Found model");
                return Some(absolute(path));
            }
            debug!(path = %path.display(), "Model not found");
        }

        error!(searched = ?candidates, "Model not found in any of the expected locations");
        None
    }
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_candidate_order_relative() {
        let resolver = ModelResolver::with_search_roots(
            "models/leaf.onnx",
            vec![PathBuf::from("/srv/backend"), PathBuf::from("/srv")],
        );

        assert_eq!(
            resolver.candidates(),
            vec![
                PathBuf::from("/srv/backend/models/leaf.onnx"),
                PathBuf::from("/srv/backend/ml/model.onnx"),
                PathBuf::from("/srv/models/leaf.onnx"),
                PathBuf::from("/srv/ml/model.onnx"),
            ]
        );
    }

    #[test]
    fn test_absolute_path_first_and_deduplicated() {
        let resolver = ModelResolver::with_search_roots(
            "/opt/ml/model.onnx",
            vec![PathBuf::from("/opt"), PathBuf::from("/opt")],
        );

        assert_eq!(
            resolver.candidates(),
            vec![PathBuf::from("/opt/ml/model.onnx")]
        );
    }

    #[test]
    fn test_resolve_prefers_configured_path() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("ml")).unwrap();
        fs::create_dir_all(root.path().join("custom")).unwrap();
        fs::write(root.path().join("ml/model.onnx"), b"default").unwrap();
        fs::write(root.path().join("custom/leaf.onnx"), b"custom").unwrap();

        let resolver =
            ModelResolver::with_search_roots("custom/leaf.onnx", vec![root.path().to_path_buf()]);
        let resolved = resolver.resolve_path().unwrap();
        assert!(resolved.ends_with("custom/leaf.onnx"));
    }

    #[test]
    fn test_resolve_falls_through_to_parent_root() {
        let root = tempfile::tempdir().unwrap();
        let backend = root.path().join("backend");
        fs::create_dir_all(&backend).unwrap();
        fs::create_dir_all(root.path().join("ml")).unwrap();
        fs::write(root.path().join("ml/model.onnx"), b"model").unwrap();

        let resolver = ModelResolver::with_search_roots(
            DEFAULT_MODEL_FILE,
            vec![backend, root.path().to_path_buf()],
        );
        assert!(resolver.resolve_path().is_some());
    }

    #[test]
    fn test_resolve_none_when_missing() {
        let root = tempfile::tempdir().unwrap();
        let resolver =
            ModelResolver::with_search_roots(DEFAULT_MODEL_FILE, vec![root.path().to_path_buf()]);
        assert_eq!(resolver.resolve_path(), None);
    }

    #[test]
    fn test_directory_is_not_a_model() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("ml/model.onnx")).unwrap();
        let resolver =
            ModelResolver::with_search_roots(DEFAULT_MODEL_FILE, vec![root.path().to_path_buf()]);
        assert_eq!(resolver.resolve_path(), None);
    }
}
