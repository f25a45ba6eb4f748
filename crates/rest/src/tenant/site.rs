//! Tenant sites loaded from the `site` table.

use std::path::PathBuf;

use tabula_persistence::core::{ObjectStore, Row, RowStorage};
use tabula_persistence::error::StorageResult;
use tabula_persistence::permission::{PermissionInstance, PermissionResolver};
use tabula_persistence::schema::{TableRegistry, tables};
use tracing::{debug, warn};

/// Column of `site` pointing at its cloud store.
const CLOUD_STORE_COLUMN: &str = "cloud_store_id";

/// One tenant site as the router needs it.
///
/// `permission` is resolved when the site is loaded and stays fixed until the
/// next restart.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantSite {
    pub reference_id: String,
    pub name: String,
    /// Host name the site answers on, without port.
    pub hostname: Option<String>,
    /// First path segment the site answers under.
    pub path: Option<String>,
    /// Directory the site's files are served from.
    pub storage_root: Option<PathBuf>,
    /// Name of the cloud store backing the site.
    pub cloud_store: Option<String>,
    pub permission: PermissionInstance,
}

impl TenantSite {
    /// A site with no host, path or files, denied to everyone.
    pub fn new(reference_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            reference_id: reference_id.into(),
            name: name.into(),
            hostname: None,
            path: None,
            storage_root: None,
            cloud_store: None,
            permission: PermissionInstance::denied(),
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = normalize_hostname(&hostname.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = normalize_path(&path.into());
        self
    }

    pub fn with_storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.storage_root = Some(root.into());
        self
    }

    pub fn with_permission(mut self, permission: PermissionInstance) -> Self {
        self.permission = permission;
        self
    }
}

/// Loads every site with its resolved permission.
///
/// A site's storage root is taken relative to its cloud store's `root_path`
/// when it has one.
pub async fn load_sites<S>(storage: &S, registry: &TableRegistry) -> StorageResult<Vec<TenantSite>>
where
    S: RowStorage + ObjectStore,
{
    let Some(site_table) = registry.get(tables::SITE) else {
        warn!("No site table configured, serving without tenants");
        return Ok(Vec::new());
    };

    let resolver = PermissionResolver::new(storage, registry);
    let rows = storage.list_all(site_table).await?;
    let mut sites = Vec::with_capacity(rows.len());

    for row in rows {
        let Ok(reference_id) = row.reference_id() else {
            continue;
        };
        let mut site = TenantSite::new(reference_id, row.text("name").unwrap_or_default());
        site.hostname = row.text("hostname").ok().and_then(normalize_hostname);
        site.path = row.text("path").ok().and_then(normalize_path);

        let store = cloud_store(storage, &row);
        site.cloud_store = store
            .as_ref()
            .and_then(|s| s.text("name").ok().map(str::to_string));
        site.storage_root = storage_root(&row, store.as_ref());
        site.permission = resolver.resolve_row(&row);

        debug!(
            site = %site.name,
            hostname = ?site.hostname,
            path = ?site.path,
            "Loaded site"
        );
        sites.push(site);
    }
    Ok(sites)
}

fn cloud_store<S: ObjectStore>(storage: &S, site: &Row) -> Option<Row> {
    let id = site.integer(CLOUD_STORE_COLUMN).ok()?;
    match storage.resolve_by_id(tables::CLOUD_STORE, id) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(site = site.reference_id().unwrap_or_default(), error = %e, "Cloud store of site missing");
            None
        }
    }
}

fn storage_root(site: &Row, store: Option<&Row>) -> Option<PathBuf> {
    let own = site.text("storage_root").ok().filter(|s| !s.is_empty());
    let base = store
        .and_then(|s| s.text("root_path").ok())
        .filter(|s| !s.is_empty());
    match (base, own) {
        (Some(base), Some(own)) => Some(PathBuf::from(base).join(own.trim_start_matches('/'))),
        (Some(base), None) => Some(PathBuf::from(base)),
        (None, Some(own)) => Some(PathBuf::from(own)),
        (None, None) => None,
    }
}

fn normalize_hostname(hostname: &str) -> Option<String> {
    let hostname = hostname.trim().to_ascii_lowercase();
    let hostname = strip_port(&hostname);
    (!hostname.is_empty()).then(|| hostname.to_string())
}

fn normalize_path(path: &str) -> Option<String> {
    let path = path.trim().trim_matches('/');
    (!path.is_empty()).then(|| path.to_string())
}

/// The host without a trailing `:port`. Bracketed IPv6 literals keep their
/// brackets.
pub fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port))
            if port.bytes().all(|b| b.is_ascii_digit())
                && (name.ends_with(']') || !name.contains(':')) =>
        {
            name
        }
        _ => host,
    }
}
