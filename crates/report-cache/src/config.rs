use std::path::{Path, PathBuf};

pub const CACHE_DIR_ENV: &str = "DUMP_TRIAGE_CACHE_DIR";
const DEFAULT_DIR_NAME: &str = ".dump-triage";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiskCacheConfig {
    pub root: PathBuf,
}

impl DiskCacheConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$DUMP_TRIAGE_CACHE_DIR`, else `~/.dump-triage/cache`, else a relative
    /// `.dump-triage/cache`.
    pub fn from_env() -> Self {
        let raw = std::env::var(CACHE_DIR_ENV).ok();
        Self::new(resolve_cache_root(raw.as_deref(), dirs::home_dir().as_deref()))
    }
}

pub(crate) fn resolve_cache_root(raw: Option<&str>, home: Option<&Path>) -> PathBuf {
    if let Some(dir) = raw.map(str::trim).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    home.map(|h| h.join(DEFAULT_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DIR_NAME))
        .join("cache")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_cache_root_prefers_env_then_home() {
        let home = Path::new("/home/dev");
        assert_eq!(
            resolve_cache_root(Some(" /srv/cache "), Some(home)),
            PathBuf::from("/srv/cache")
        );
        assert_eq!(
            resolve_cache_root(Some("   "), Some(home)),
            PathBuf::from("/home/dev/.dump-triage/cache")
        );
        assert_eq!(
            resolve_cache_root(None, None),
            PathBuf::from(".dump-triage/cache")
        );
    }
}
