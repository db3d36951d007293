use serde::{Deserialize, Serialize};

use crate::ast::{Expr, Ident, Query};

/// `property := value`. The property is a path on the action alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub property: Expr,
    pub value: Expr,
}

impl Assignment {
    pub fn new(property: Expr, value: Expr) -> Self {
        Self { property, value }
    }
}

/// What an action hands back besides the affected-row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Returning {
    /// Full expression-shaped projection over the affected rows
    Rows { alias: Ident, body: Expr },
    /// Plain column list of database-generated keys
    GeneratedKeys { alias: Ident, body: Expr },
}

impl Returning {
    pub fn alias(&self) -> &Ident {
        match self {
            Returning::Rows { alias, .. } | Returning::GeneratedKeys { alias, .. } => alias,
        }
    }

    pub fn body(&self) -> &Expr {
        match self {
            Returning::Rows { body, .. } | Returning::GeneratedKeys { body, .. } => body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConflictResolution {
    Ignore,
    /// `existing` names the stored row, `excluded` the row that failed to insert
    Update {
        existing: Ident,
        excluded: Ident,
        assignments: Vec<Assignment>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnConflict {
    /// Conflict target properties on the insert alias; empty means any constraint
    #[serde(default)]
    pub target: Vec<Expr>,
    pub resolution: ConflictResolution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    pub target: Query,
    pub alias: Ident,
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub on_conflict: Option<OnConflict>,
    #[serde(default)]
    pub returning: Option<Returning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub target: Query,
    pub alias: Ident,
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub filter: Option<Expr>,
    #[serde(default)]
    pub returning: Option<Returning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    pub target: Query,
    pub alias: Ident,
    #[serde(default)]
    pub filter: Option<Expr>,
    #[serde(default)]
    pub returning: Option<Returning>,
}

/// Data-mutation action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Insert => write!(f, "INSERT"),
            ActionKind::Update => write!(f, "UPDATE"),
            ActionKind::Delete => write!(f, "DELETE"),
        }
    }
}

impl Action {
    pub fn insert(target: Query, alias: impl Into<Ident>, assignments: Vec<Assignment>) -> Self {
        Action::Insert(Insert {
            target,
            alias: alias.into(),
            assignments,
            on_conflict: None,
            returning: None,
        })
    }

    pub fn update(target: Query, alias: impl Into<Ident>, assignments: Vec<Assignment>) -> Self {
        Action::Update(Update {
            target,
            alias: alias.into(),
            assignments,
            filter: None,
            returning: None,
        })
    }

    pub fn delete(target: Query, alias: impl Into<Ident>) -> Self {
        Action::Delete(Delete {
            target,
            alias: alias.into(),
            filter: None,
            returning: None,
        })
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Insert(_) => ActionKind::Insert,
            Action::Update(_) => ActionKind::Update,
            Action::Delete(_) => ActionKind::Delete,
        }
    }

    pub fn alias(&self) -> &Ident {
        match self {
            Action::Insert(i) => &i.alias,
            Action::Update(u) => &u.alias,
            Action::Delete(d) => &d.alias,
        }
    }

    pub fn returning(&self) -> Option<&Returning> {
        match self {
            Action::Insert(i) => i.returning.as_ref(),
            Action::Update(u) => u.returning.as_ref(),
            Action::Delete(d) => d.returning.as_ref(),
        }
    }

    /// Restrict an update or delete to rows matching `filter`. No-op on inserts.
    pub fn filter(mut self, filter: Expr) -> Self {
        match &mut self {
            Action::Update(u) => u.filter = Some(Expr::and_opt(u.filter.take(), filter)),
            Action::Delete(d) => d.filter = Some(Expr::and_opt(d.filter.take(), filter)),
            Action::Insert(_) => {}
        }
        self
    }

    pub fn returning_rows(self, alias: impl Into<Ident>, body: Expr) -> Self {
        self.with_returning(Returning::Rows {
            alias: alias.into(),
            body,
        })
    }

    pub fn returning_generated(self, alias: impl Into<Ident>, body: Expr) -> Self {
        self.with_returning(Returning::GeneratedKeys {
            alias: alias.into(),
            body,
        })
    }

    fn with_returning(mut self, returning: Returning) -> Self {
        match &mut self {
            Action::Insert(i) => i.returning = Some(returning),
            Action::Update(u) => u.returning = Some(returning),
            Action::Delete(d) => d.returning = Some(returning),
        }
        self
    }

    /// Attach an on-conflict resolution. No-op unless this is an insert.
    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        if let Action::Insert(i) = &mut self {
            i.on_conflict = Some(on_conflict);
        }
        self
    }
}
