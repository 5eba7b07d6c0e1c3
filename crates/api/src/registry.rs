//! Registry contracts: where attr prototypes and app modules live.

use std::sync::Arc;

use plexus_types::tag::{Name, Uid};
use plexus_types::values::TagValue;
use plexus_types::{Result, Value};

use crate::app::AppModule;

/// Maps a value prototype to an explicit attr identity. The prototype is
/// cloned (via its `new_value` contract) whenever the attribute is
/// instantiated.
#[derive(Clone)]
pub struct AttrDef {
    /// The attr's canonic expression and UID.
    pub expr: Name,
    /// Cloned when this attribute is instantiated.
    pub prototype: Arc<dyn Value>,
}

impl AttrDef {
    /// The attr's UID.
    pub fn uid(&self) -> Uid {
        self.expr.id
    }
}

impl std::fmt::Debug for AttrDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AttrDef({})", self.expr.canonic)
    }
}

/// A snapshot of a registry's contents, used to seed another registry.
#[derive(Default)]
pub struct RegistryExport {
    /// Registered attr definitions.
    pub attrs: Vec<AttrDef>,
    /// Registered app modules.
    pub modules: Vec<Arc<AppModule>>,
}

/// Where apps and types are registered. Implementations are concurrency
/// safe: read-mostly behind a reader/writer lock.
pub trait Registry: Send + Sync {
    /// Registers a value prototype under its attr UID, rejecting a nil
    /// UID. This allows the value to be instantiated and unmarshaled
    /// whenever the attr UID is known.
    fn register_attr(&self, def: AttrDef) -> Result<()>;

    /// Registers an app module by UID and by all declared aliases. Later
    /// registrations overwrite earlier ones.
    fn register_module(&self, module: Arc<AppModule>) -> Result<()>;

    /// Selects the app module that best matches the given invocation tag:
    /// by UID when one is set, else by URI domain or alias.
    ///
    /// Returned modules are read-only; they are static and shared.
    fn get_app_module(&self, invoke: &TagValue) -> Result<Arc<AppModule>>;

    /// Instantiates a value for the given attr UID — typically followed by
    /// `Value::unmarshal`.
    fn make_value(&self, attr_id: Uid) -> Result<Box<dyn Value>>;

    /// Snapshots this registry's contents.
    fn export(&self) -> RegistryExport;

    /// Imports all types and apps from another registry. A new session's
    /// registry starts by importing the host's.
    fn import(&self, other: &dyn Registry) -> Result<()> {
        let snapshot = other.export();
        for def in snapshot.attrs {
            self.register_attr(def)?;
        }
        for module in snapshot.modules {
            self.register_module(module)?;
        }
        Ok(())
    }
}
