//! Canonical verbs and the small enums that travel with them.

use core::fmt;

use serde::{Serialize, Serializer};

// ─────────────────────────────────────────────────────────────────────────────
// Target
// ─────────────────────────────────────────────────────────────────────────────

/// The verb backing an operation alias.
///
/// Every [`OperationSpec`](crate::OperationSpec) has exactly one target. The
/// thirteen canonical verbs get framework-provided handlers; `Custom` carries
/// the name of a user-defined operation whose handler is registered
/// explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Insert one item.
    Create,
    /// Fetch one item by id.
    Read,
    /// Shallow field update of one item.
    Update,
    /// Full replacement of one item, keeping its id.
    Replace,
    /// RFC 7396 merge patch of one item, inserting it when absent.
    Merge,
    /// Remove one item by id.
    Delete,
    /// Filtered, sorted, paged listing.
    List,
    /// Remove every item matching a filter.
    Clear,
    /// Insert many items in one transaction.
    BulkCreate,
    /// Shallow update of many items in one transaction.
    BulkUpdate,
    /// Replace many items in one transaction.
    BulkReplace,
    /// Merge patch many items in one transaction.
    BulkMerge,
    /// Remove many items by id in one transaction.
    BulkDelete,
    /// A user-defined operation.
    Custom(String),
}

impl Target {
    /// All canonical verbs, in the order they are registered by
    /// [`ResourceDef::with_canonical_ops`](crate::ResourceDef::with_canonical_ops).
    pub const CANONICAL: [Target; 13] = [
        Target::Create,
        Target::Read,
        Target::Update,
        Target::Replace,
        Target::Merge,
        Target::Delete,
        Target::List,
        Target::Clear,
        Target::BulkCreate,
        Target::BulkUpdate,
        Target::BulkReplace,
        Target::BulkMerge,
        Target::BulkDelete,
    ];

    /// Parses a canonical verb name. Unknown names yield `None`; use
    /// [`Target::Custom`] for those explicitly.
    #[must_use]
    pub fn canonical(name: &str) -> Option<Self> {
        Self::CANONICAL.iter().find(|t| t.name() == name).cloned()
    }

    /// The verb's wire name (`"bulk_create"`, `"custom"`, ...).
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Target::Create => "create",
            Target::Read => "read",
            Target::Update => "update",
            Target::Replace => "replace",
            Target::Merge => "merge",
            Target::Delete => "delete",
            Target::List => "list",
            Target::Clear => "clear",
            Target::BulkCreate => "bulk_create",
            Target::BulkUpdate => "bulk_update",
            Target::BulkReplace => "bulk_replace",
            Target::BulkMerge => "bulk_merge",
            Target::BulkDelete => "bulk_delete",
            Target::Custom(_) => "custom",
        }
    }

    /// Returns true for every verb except [`Target::Custom`].
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        !matches!(self, Target::Custom(_))
    }

    /// Returns true for `read` and `list`.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        matches!(self, Target::Read | Target::List)
    }

    /// Returns true for the `bulk_*` family.
    #[must_use]
    pub fn is_bulk(&self) -> bool {
        matches!(
            self,
            Target::BulkCreate
                | Target::BulkUpdate
                | Target::BulkReplace
                | Target::BulkMerge
                | Target::BulkDelete
        )
    }

    /// Returns true when the verb carries a body that should pass input
    /// validation before the handler runs.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Target::Create
                | Target::Update
                | Target::Replace
                | Target::Merge
                | Target::BulkCreate
                | Target::BulkUpdate
                | Target::BulkReplace
                | Target::BulkMerge
        )
    }

    /// Returns true for verbs whose success creates new items.
    #[must_use]
    pub fn is_create_like(&self) -> bool {
        matches!(self, Target::Create | Target::BulkCreate)
    }

    /// Default arity when the operation does not set one.
    #[must_use]
    pub fn default_arity(&self) -> Arity {
        match self {
            Target::Read | Target::Update | Target::Replace | Target::Merge | Target::Delete => {
                Arity::Member
            }
            _ => Arity::Collection,
        }
    }

    /// Default REST method when the operation does not override it.
    #[must_use]
    pub fn default_http_method(&self) -> HttpMethod {
        match self {
            Target::Create | Target::BulkCreate | Target::Custom(_) => HttpMethod::Post,
            Target::Read | Target::List => HttpMethod::Get,
            Target::Update | Target::Merge | Target::BulkUpdate | Target::BulkMerge => {
                HttpMethod::Patch
            }
            Target::Replace | Target::BulkReplace => HttpMethod::Put,
            Target::Delete | Target::Clear | Target::BulkDelete => HttpMethod::Delete,
        }
    }

    /// Default success status: 201 for create-like verbs, 200 otherwise.
    #[must_use]
    pub fn default_status(&self) -> u16 {
        if self.is_create_like() { 201 } else { 200 }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Custom(name) => write!(f, "custom({name})"),
            other => f.write_str(other.name()),
        }
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Arity / Persist / HttpMethod
// ─────────────────────────────────────────────────────────────────────────────

/// Whether an operation addresses one item or the whole collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arity {
    /// Addressed by item id (`/{resource}/{item_id}`).
    Member,
    /// Addressed by resource (`/{resource}`).
    Collection,
}

/// Transaction policy for an operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Persist {
    /// Transactional unless the target is read-only.
    #[default]
    Default,
    /// Opens a transaction even for read-only targets.
    Always,
    /// Never opens a transaction.
    Skip,
}

/// HTTP methods the REST adapter routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// Parses a method name, case-insensitively.
    #[must_use]
    pub fn parse(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    /// The canonical uppercase method name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
