//! Line access collaborator.
//!
//! Which lines a staff member may see is an authorisation concern owned by
//! the surrounding system; the worklist core only ever receives a line that
//! has already passed this check. The REST layer consults a [`LineAccess`]
//! implementation before touching the core.

use calllist_types::Line;
use std::collections::{HashMap, HashSet};

/// The set of lines granted to one user.
#[derive(Debug, Clone)]
pub enum LineGrant {
    /// Unrestricted: every line is visible.
    All,
    /// Only the named lines are visible.
    Only(HashSet<Line>),
}

impl LineGrant {
    pub fn allows(&self, line: &Line) -> bool {
        match self {
            LineGrant::All => true,
            LineGrant::Only(lines) => lines.contains(line),
        }
    }
}

/// Supplies the lines a user is allowed to query.
pub trait LineAccess: Send + Sync {
    fn allowed_lines(&self, user: &str) -> LineGrant;
}

/// Grants every user every line. The default for single-clinic deployments
/// where line assignment is handled upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveAccess;

impl LineAccess for PermissiveAccess {
    fn allowed_lines(&self, _user: &str) -> LineGrant {
        LineGrant::All
    }
}

/// Fixed per-user allow-list. Users absent from the list see nothing.
#[derive(Debug, Clone, Default)]
pub struct StaticLineAccess {
    grants: HashMap<String, HashSet<Line>>,
}

impl StaticLineAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `user` access to `line`, in addition to any existing grants.
    pub fn grant(&mut self, user: impl Into<String>, line: Line) {
        self.grants.entry(user.into()).or_default().insert(line);
    }
}

impl LineAccess for StaticLineAccess {
    fn allowed_lines(&self, user: &str) -> LineGrant {
        LineGrant::Only(self.grants.get(user).cloned().unwrap_or_default())
    }
}
