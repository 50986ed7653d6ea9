use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub user_data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub secrets_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = discover_project_root();
        let user_data_dir = discover_user_data_dir(&project_root);
        Self::from_dirs(project_root, user_data_dir)
    }

    /// Build paths rooted at explicit directories, creating the log dir.
    pub fn from_dirs(project_root: PathBuf, user_data_dir: PathBuf) -> Self {
        let log_dir = user_data_dir.join("logs");
        let secrets_path = user_data_dir.join("secrets.yaml");

        for dir in [&user_data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            project_root,
            user_data_dir,
            log_dir,
            secrets_path,
        }
    }

    /// Resolve a configured path against the data dir, then the project root.
    pub fn resolve(&self, raw: &str) -> PathBuf {
        let candidate = PathBuf::from(raw);
        if candidate.is_absolute() {
            return candidate;
        }
        let user_candidate = self.user_data_dir.join(&candidate);
        if user_candidate.exists() {
            return user_candidate;
        }
        let project_candidate = self.project_root.join(&candidate);
        if project_candidate.exists() {
            return project_candidate;
        }
        user_candidate
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("AGENTIC_RAG_ROOT") {
        return PathBuf::from(root);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if manifest_dir.join("config.yml").exists() {
        return manifest_dir;
    }

    env::current_dir().unwrap_or(manifest_dir)
}

fn discover_user_data_dir(project_root: &Path) -> PathBuf {
    if let Ok(dir) = env::var("AGENTIC_RAG_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(debug_assertions) {
        return project_root.to_path_buf();
    }

    if cfg!(target_os = "windows") {
        let base = env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string()));
        return PathBuf::from(base).join("AgenticRag");
    }

    if cfg!(target_os = "macos") {
        return home_dir()
            .join("Library")
            .join("Application Support")
            .join("AgenticRag");
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir()
            .join(".local/share")
            .to_string_lossy()
            .to_string()
    });
    PathBuf::from(xdg).join("agentic-rag")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_existing_data_dir_entry() {
        let project = tempfile::tempdir().expect("tempdir");
        let data = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(data.path().join("corpus")).expect("mkdir");
        fs::create_dir_all(project.path().join("corpus")).expect("mkdir");

        let paths = AppPaths::from_dirs(project.path().to_path_buf(), data.path().to_path_buf());
        assert_eq!(paths.resolve("corpus"), data.path().join("corpus"));
    }

    #[test]
    fn resolve_falls_back_to_project_root() {
        let project = tempfile::tempdir().expect("tempdir");
        let data = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(project.path().join("docs")).expect("mkdir");

        let paths = AppPaths::from_dirs(project.path().to_path_buf(), data.path().to_path_buf());
        assert_eq!(paths.resolve("docs"), project.path().join("docs"));
        assert_eq!(paths.resolve("missing"), data.path().join("missing"));
    }

    #[test]
    fn from_dirs_creates_log_dir() {
        let data = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::from_dirs(data.path().to_path_buf(), data.path().join("nested"));
        assert!(paths.log_dir.exists());
    }
}
