//! Custom URI-scheme resource loaders
//!
//! Consulted when the engine asks for data behind a URI the window's own
//! notification handler did not supply. `resources://` resolves against a
//! configured directory; other schemes go to registered loader functions.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use hlkit_dom::types::ResourceType;
use url::Url;

/// Scheme served from the resources directory
pub const RESOURCES_SCHEME: &str = "resources";

/// Loader for one URI scheme.
pub type LoaderFn = Box<dyn Fn(&Url) -> Option<(Vec<u8>, ResourceType)>>;

#[derive(Default)]
pub struct ResourceLoaders {
    loaders: HashMap<String, LoaderFn>,
    resources_dir: Option<PathBuf>,
    cache_enabled: bool,
    cache: RefCell<HashMap<String, (Vec<u8>, ResourceType)>>,
}

impl ResourceLoaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scheme: &str, loader: LoaderFn) {
        tracing::debug!("registered resource loader for {}://", scheme);
        self.loaders.insert(scheme.to_ascii_lowercase(), loader);
    }

    pub fn unregister(&mut self, scheme: &str) -> bool {
        self.loaders.remove(&scheme.to_ascii_lowercase()).is_some()
    }

    pub fn set_resources_dir(&mut self, dir: Option<PathBuf>) {
        self.resources_dir = dir;
    }

    pub fn set_cache(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
        if !enabled {
            self.cache.borrow_mut().clear();
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Bytes and type for `uri`, `None` when no loader serves it.
    pub fn load(&self, uri: &str) -> Option<(Vec<u8>, ResourceType)> {
        if let Some(hit) = self.cache.borrow().get(uri) {
            return Some(hit.clone());
        }
        let url = match Url::parse(uri) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("not a loadable uri {:?}: {}", uri, e);
                return None;
            }
        };
        let loaded = match self.loaders.get(url.scheme()) {
            Some(loader) => loader(&url),
            None if url.scheme() == RESOURCES_SCHEME => self.load_resource(&url),
            None => None,
        }?;
        if self.cache_enabled {
            self.cache.borrow_mut().insert(uri.to_string(), loaded.clone());
        }
        Some(loaded)
    }

    fn load_resource(&self, url: &Url) -> Option<(Vec<u8>, ResourceType)> {
        let dir = self.resources_dir.as_ref()?;
        let relative = resource_path(url)?;
        let path = dir.join(&relative);
        match std::fs::read(&path) {
            Ok(bytes) => {
                let ext = relative.extension().and_then(|e| e.to_str()).unwrap_or("");
                Some((bytes, ResourceType::from_extension(ext)))
            }
            Err(e) => {
                tracing::warn!("resource {} unreadable: {}", path.display(), e);
                None
            }
        }
    }
}

/// `resources://images/a.png` -> `images/a.png`. Rejects paths that
/// climb out of the resources directory.
fn resource_path(url: &Url) -> Option<PathBuf> {
    let mut joined = String::new();
    if let Some(host) = url.host_str() {
        joined.push_str(host);
    }
    joined.push_str(url.path());
    let path = Path::new(joined.trim_start_matches('/'));
    let clean = path.components().all(|c| matches!(c, Component::Normal(_)));
    if !clean || path.as_os_str().is_empty() {
        tracing::warn!("rejected resource path {:?}", joined);
        return None;
    }
    Some(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_scheme() {
        let mut loaders = ResourceLoaders::new();
        loaders.register(
            "app",
            Box::new(|url| (url.host_str() == Some("main")).then(|| (b"<p/>".to_vec(), ResourceType::Html))),
        );
        assert_eq!(loaders.load("app://main"), Some((b"<p/>".to_vec(), ResourceType::Html)));
        assert_eq!(loaders.load("app://other"), None);
        assert_eq!(loaders.load("ftp://main"), None);
        assert_eq!(loaders.load("not a uri"), None);
        assert!(loaders.unregister("app"));
        assert_eq!(loaders.load("app://main"), None);
    }

    #[test]
    fn test_resource_path() {
        let url = Url::parse("resources://images/logo.png").unwrap();
        assert_eq!(resource_path(&url), Some(PathBuf::from("images/logo.png")));
        let url = Url::parse("resources://style.css").unwrap();
        assert_eq!(resource_path(&url), Some(PathBuf::from("style.css")));
        let url = Url::parse("resources:///").unwrap();
        assert_eq!(resource_path(&url), None);
    }

    #[test]
    fn test_resources_dir_and_cache() {
        let dir = std::env::temp_dir().join(format!("hlkit-resources-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("site.css"), "p { color: red }").unwrap();

        let mut loaders = ResourceLoaders::new();
        assert_eq!(loaders.load("resources://site.css"), None);

        loaders.set_resources_dir(Some(dir.clone()));
        loaders.set_cache(true);
        let (bytes, kind) = loaders.load("resources://site.css").unwrap();
        assert_eq!(bytes, b"p { color: red }");
        assert_eq!(kind, ResourceType::Style);
        assert_eq!(loaders.cached(), 1);

        std::fs::remove_file(dir.join("site.css")).unwrap();
        assert!(loaders.load("resources://site.css").is_some());
        loaders.set_cache(false);
        assert_eq!(loaders.load("resources://site.css"), None);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
