//! Row-level access filtering around CRUD operations.
//!
//! An [`AccessInterceptor`] is created for one request and runs in two
//! phases:
//!
//! | Phase | Method | Capability |
//! |-------|--------|------------|
//! | before | GET | peek |
//! | before | PUT, PATCH | update |
//! | before | DELETE | delete |
//! | before | POST | none, rows pass untouched |
//! | after | GET | read |
//! | after | any other | peek |
//!
//! The before phase resolves a minimal envelope per candidate row. The after
//! phase resolves the materialized rows, included rows of foreign-key
//! expansion as well. Rows of `image.` tables skip the after phase.
//!
//! Denied rows are dropped; filtering never fails the request.

use std::collections::HashSet;

use axum::http::Method;
use tabula_persistence::core::Row;
use tabula_persistence::permission::{Actor, Capability, PermissionResolver};
use tracing::{debug, trace};

/// Table name prefix of inlined binary assets.
const ASSET_TABLE_PREFIX: &str = "image.";

/// Request-scoped row filter for one actor.
pub struct AccessInterceptor<'a> {
    resolver: PermissionResolver<'a>,
    actor: &'a Actor,
    included: HashSet<(Capability, String)>,
    excluded: HashSet<(Capability, String)>,
}

impl<'a> AccessInterceptor<'a> {
    pub fn new(resolver: PermissionResolver<'a>, actor: &'a Actor) -> Self {
        Self {
            resolver,
            actor,
            included: HashSet::new(),
            excluded: HashSet::new(),
        }
    }

    pub fn actor(&self) -> &Actor {
        self.actor
    }

    /// Filters candidate rows before the operation runs.
    pub fn intercept_before(&mut self, method: &Method, rows: Vec<Row>) -> Vec<Row> {
        if *method == Method::POST {
            return rows;
        }
        let Some(capability) = before_capability(method) else {
            debug!(method = %method, dropped = rows.len(), "No capability for method, dropping rows");
            return Vec::new();
        };

        rows.into_iter()
            .filter(|row| {
                let Ok(reference_id) = row.reference_id() else {
                    debug!(table = %row.table(), "Row without reference id, dropping");
                    return false;
                };
                let envelope = Row::envelope(
                    row.table(),
                    reference_id,
                    row.relation_reference_id().map(str::to_string),
                );
                self.permits(&envelope, capability)
            })
            .collect()
    }

    /// Filters result rows before they are returned.
    pub fn intercept_after(&mut self, method: &Method, rows: Vec<Row>) -> Vec<Row> {
        let capability = after_capability(method);
        rows.into_iter()
            .filter(|row| {
                if row.table().starts_with(ASSET_TABLE_PREFIX) {
                    return true;
                }
                self.permits(row, capability)
            })
            .collect()
    }

    /// Checks one row, consulting the memo sets first.
    pub fn permits(&mut self, row: &Row, capability: Capability) -> bool {
        let Ok(reference_id) = row.reference_id() else {
            debug!(table = %row.table(), "Row without reference id, dropping");
            return false;
        };
        let key = (capability, reference_id.to_string());
        if self.included.contains(&key) {
            return true;
        }
        if self.excluded.contains(&key) {
            return false;
        }

        let allowed = self.resolver.resolve_row(row).allows(self.actor, capability);
        trace!(
            table = %row.table(),
            reference_id = %reference_id,
            capability = %capability,
            actor = %self.actor.reference_id,
            allowed,
            "Access decision"
        );
        if allowed {
            self.included.insert(key);
        } else {
            self.excluded.insert(key);
        }
        allowed
    }
}

fn before_capability(method: &Method) -> Option<Capability> {
    match *method {
        Method::GET | Method::HEAD => Some(Capability::PEEK),
        Method::PUT | Method::PATCH => Some(Capability::UPDATE),
        Method::DELETE => Some(Capability::DELETE),
        _ => None,
    }
}

fn after_capability(method: &Method) -> Capability {
    if *method == Method::GET {
        Capability::READ
    } else {
        Capability::PEEK
    }
}
