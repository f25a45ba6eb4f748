//! Multi-tenant request routing.
//!
//! Every request is classified once by its `Host` header and first path
//! segment:
//!
//! 1. **Host**: the host names a site and the first segment is not reserved.
//!    The actor must be allowed to execute the site; otherwise the answer is
//!    401 with a `WWW-Authenticate: Basic` challenge naming the host.
//! 2. **Path prefix**: the first segment names a site by path. Same check,
//!    denial answers 403. On success the prefix is stripped and the query
//!    kept.
//! 3. **Default**: the host does not start with `dashboard.` or `api.` and a
//!    default site exists.
//! 4. **Dashboard**: everything else goes to the dashboard application.
//!
//! The reserved segments `api`, `action`, `meta` and `jsmodel` are never
//! taken for site names.
//!
//! Sites are loaded from the `site` table into an immutable
//! [`RouterSnapshot`]. The [`TenantRouter`] swaps snapshots as a unit on
//! restart.

mod router;
mod site;
mod snapshot;

pub use router::{RESERVED_PATHS, RouteDecision, TenantRouter, classify};
pub use site::{TenantSite, load_sites, strip_port};
pub use snapshot::{DEFAULT_SITE_HOST, RouterSnapshot, TenantHandler, site_handler};
