//! Immutable routing tables of the tenant router.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

use super::site::TenantSite;

/// Host name of the site that becomes the default handler.
pub const DEFAULT_SITE_HOST: &str = "default";

/// A site together with the handler serving it.
#[derive(Clone)]
pub struct TenantHandler {
    pub site: TenantSite,
    pub handler: Router,
}

/// One consistent view of all tenants.
///
/// Snapshots are never mutated once published to a
/// [`TenantRouter`](super::TenantRouter); a restart builds a new one and swaps
/// it in whole.
#[derive(Clone, Default)]
pub struct RouterSnapshot {
    tenants_by_host: HashMap<String, Arc<TenantHandler>>,
    sites_by_path: HashMap<String, Arc<TenantHandler>>,
    default: Option<Router>,
    dashboard: Option<Router>,
}

impl RouterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot serving each site's files from its storage root.
    ///
    /// Sites without a storage root have nothing to serve and are skipped.
    pub fn build(sites: Vec<TenantSite>, dashboard: Router) -> Self {
        let mut snapshot = Self::new().with_dashboard(dashboard);
        for site in sites {
            let Some(root) = site.storage_root.clone() else {
                warn!(site = %site.name, "Site has no storage root, not serving it");
                continue;
            };
            snapshot = snapshot.with_site(site, site_handler(&root));
        }
        info!(
            hosts = snapshot.tenants_by_host.len(),
            paths = snapshot.sites_by_path.len(),
            default = snapshot.default.is_some(),
            "Built tenant routing snapshot"
        );
        snapshot
    }

    pub fn with_dashboard(mut self, dashboard: Router) -> Self {
        self.dashboard = Some(dashboard);
        self
    }

    pub fn with_default(mut self, handler: Router) -> Self {
        self.default = Some(handler);
        self
    }

    /// Registers a site under its host name and path.
    ///
    /// A site whose host name is [`DEFAULT_SITE_HOST`] also becomes the
    /// default handler.
    pub fn with_site(mut self, site: TenantSite, handler: Router) -> Self {
        if site.hostname.as_deref() == Some(DEFAULT_SITE_HOST) {
            self.default = Some(handler.clone());
        }
        let tenant = Arc::new(TenantHandler { site, handler });
        if let Some(hostname) = &tenant.site.hostname {
            self.tenants_by_host
                .insert(hostname.clone(), Arc::clone(&tenant));
        }
        if let Some(path) = &tenant.site.path {
            self.sites_by_path.insert(path.clone(), Arc::clone(&tenant));
        }
        self
    }

    pub fn by_host(&self, host: &str) -> Option<&TenantHandler> {
        self.tenants_by_host.get(host).map(Arc::as_ref)
    }

    pub fn by_path(&self, segment: &str) -> Option<&TenantHandler> {
        self.sites_by_path.get(segment).map(Arc::as_ref)
    }

    pub fn default_handler(&self) -> Option<&Router> {
        self.default.as_ref()
    }

    pub fn dashboard(&self) -> Option<&Router> {
        self.dashboard.as_ref()
    }
}

impl fmt::Debug for RouterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hosts: Vec<&String> = self.tenants_by_host.keys().collect();
        hosts.sort();
        let mut paths: Vec<&String> = self.sites_by_path.keys().collect();
        paths.sort();
        f.debug_struct("RouterSnapshot")
            .field("hosts", &hosts)
            .field("paths", &paths)
            .field("default", &self.default.is_some())
            .field("dashboard", &self.dashboard.is_some())
            .finish()
    }
}

/// Serves the files under `root`, answering unknown paths with `index.html`.
pub fn site_handler(root: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(root).fallback(ServeFile::new(root.join("index.html"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_registered_by_host_and_path() {
        let site = TenantSite::new("s1", "blog")
            .with_hostname("blog.example.com")
            .with_path("blog");
        let snapshot = RouterSnapshot::new().with_site(site, Router::new());
        assert_eq!(snapshot.by_host("blog.example.com").unwrap().site.name, "blog");
        assert_eq!(snapshot.by_path("blog").unwrap().site.reference_id, "s1");
        assert!(snapshot.default_handler().is_none());
    }

    #[test]
    fn test_default_site_becomes_default_handler() {
        let site = TenantSite::new("s1", "home").with_hostname("default");
        let snapshot = RouterSnapshot::new().with_site(site, Router::new());
        assert!(snapshot.default_handler().is_some());
    }

    #[test]
    fn test_build_skips_sites_without_root() {
        let dir = tempfile::tempdir().unwrap();
        let served = TenantSite::new("s1", "a")
            .with_hostname("a.example.com")
            .with_storage_root(dir.path());
        let unserved = TenantSite::new("s2", "b").with_hostname("b.example.com");
        let snapshot = RouterSnapshot::build(vec![served, unserved], Router::new());
        assert!(snapshot.by_host("a.example.com").is_some());
        assert!(snapshot.by_host("b.example.com").is_none());
        assert!(snapshot.dashboard().is_some());
    }
}
