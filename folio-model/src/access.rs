//! Access predicates for collections and fields.

use folio_types::{Actor, DocumentId};
use std::fmt;
use std::sync::Arc;

/// Arguments handed to an access predicate.
#[derive(Debug, Clone, Copy)]
pub struct AccessArgs<'a> {
    pub actor: Option<&'a Actor>,
    /// The document being accessed, when there is one.
    pub id: Option<DocumentId>,
}

type AccessFn = dyn Fn(&AccessArgs<'_>) -> bool + Send + Sync;

/// A boolean access predicate `(actor, {id?}) -> bool`.
#[derive(Clone)]
pub struct Access(Arc<AccessFn>);

impl Access {
    pub fn new(predicate: impl Fn(&AccessArgs<'_>) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Grants access to everyone, including anonymous requests.
    pub fn anyone() -> Self {
        Self::new(|_| true)
    }

    /// Denies access unconditionally.
    pub fn nobody() -> Self {
        Self::new(|_| false)
    }

    /// Grants access to any authenticated actor.
    pub fn authenticated() -> Self {
        Self::new(|args| args.actor.is_some())
    }

    /// Grants access to actors holding `role`.
    pub fn role(role: impl Into<String>) -> Self {
        let role = role.into();
        Self::new(move |args| args.actor.is_some_and(|a| a.has_role(&role)))
    }

    pub fn allows(&self, args: &AccessArgs<'_>) -> bool {
        (self.0)(args)
    }
}

impl fmt::Debug for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Access(..)")
    }
}
