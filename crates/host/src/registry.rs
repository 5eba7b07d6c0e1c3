//! The stock registry: attr prototypes and app modules, read-mostly.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use plexus_api::{AppModule, AttrDef, Registry, RegistryExport};
use plexus_types::tag::Uid;
use plexus_types::values::TagValue;
use plexus_types::{Error, ErrorKind, Result, Value};

#[derive(Default)]
struct Maps {
    attr_defs: HashMap<Uid, AttrDef>,
    modules_by_uid: HashMap<Uid, Arc<AppModule>>,
    modules_by_invoke: HashMap<String, Arc<AppModule>>,
}

/// The stock [`Registry`]: a reader/writer-locked map set. Registration
/// happens at startup and import time; lookups dominate afterwards.
#[derive(Default)]
pub struct HostRegistry {
    maps: RwLock<Maps>,
}

impl HostRegistry {
    /// An empty registry.
    pub fn new() -> HostRegistry {
        HostRegistry::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Maps> {
        self.maps.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Maps> {
        self.maps.write().unwrap_or_else(|e| e.into_inner())
    }

    /// The module registered under `module_id`, if any.
    pub fn module_by_uid(&self, module_id: Uid) -> Result<Arc<AppModule>> {
        self.read()
            .modules_by_uid
            .get(&module_id)
            .cloned()
            .ok_or_else(|| Error::path_not_found(format!("app module {module_id} not found")))
    }
}

impl Registry for HostRegistry {
    fn register_attr(&self, def: AttrDef) -> Result<()> {
        if def.uid().is_nil() {
            return Err(ErrorKind::BadRequest.err("register_attr: missing attr UID"));
        }
        self.write().attr_defs.insert(def.uid(), def);
        Ok(())
    }

    fn register_module(&self, module: Arc<AppModule>) -> Result<()> {
        if module.uid().is_nil() {
            return Err(ErrorKind::BadRequest.err("register_module: missing module UID"));
        }
        let mut maps = self.write();
        maps.modules_by_uid.insert(module.uid(), module.clone());

        for alias in &module.invocations {
            if !alias.is_empty() {
                maps.modules_by_invoke.insert(alias.clone(), module.clone());
            }
        }
        // invoke by full module expression and by its leaf tag
        maps.modules_by_invoke
            .insert(module.spec.canonic.clone(), module.clone());
        let (_, leaf) = module.spec.leaf_tags(1);
        if !leaf.is_empty() {
            maps.modules_by_invoke.insert(leaf.to_string(), module);
        }
        Ok(())
    }

    fn get_app_module(&self, invoke: &TagValue) -> Result<Arc<AppModule>> {
        let maps = self.read();

        if invoke.uid.is_set() {
            if let Some(module) = maps.modules_by_uid.get(&invoke.uid) {
                return Ok(module.clone());
            }
        }

        // resolve by URI domain, then by raw text alias
        if !invoke.uri.is_empty() {
            let domain = invoke
                .uri
                .split("://")
                .last()
                .unwrap_or_default()
                .split(['/', '?'])
                .next()
                .unwrap_or_default();
            if let Some(module) = maps.modules_by_invoke.get(domain) {
                return Ok(module.clone());
            }
        }
        if !invoke.text.is_empty() {
            if let Some(module) = maps.modules_by_invoke.get(&invoke.text) {
                return Ok(module.clone());
            }
        }

        Err(Error::path_not_found(format!(
            "no app module for invocation {:?}",
            invoke.label()
        )))
    }

    fn make_value(&self, attr_id: Uid) -> Result<Box<dyn Value>> {
        let maps = self.read();
        let def = maps.attr_defs.get(&attr_id).ok_or_else(|| {
            Error::attr_not_found(format!("make_value: attr {attr_id} not found"))
        })?;
        Ok(def.prototype.new_value())
    }

    fn export(&self) -> RegistryExport {
        let maps = self.read();
        RegistryExport {
            attrs: maps.attr_defs.values().cloned().collect(),
            modules: maps.modules_by_uid.values().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_api::AppContext;
    use plexus_types::tag::Name;
    use plexus_types::values::TagValue;

    fn test_module(expr: &str, aliases: &[&str]) -> Arc<AppModule> {
        Arc::new(AppModule {
            spec: Name::from_expr(expr),
            desc: "test module".to_string(),
            version: "v0.1.0".to_string(),
            dependencies: Vec::new(),
            invocations: aliases.iter().map(|s| s.to_string()).collect(),
            new_instance: Arc::new(|_app: AppContext| {
                Err(ErrorKind::Unimplemented.err("test factory"))
            }),
        })
    }

    #[test]
    fn attr_registration_and_make_value() {
        let reg = HostRegistry::new();
        let some_attr = Name::from_expr("hello sailor");
        let spec = some_attr.with("av.Hello.World.Tag");
        assert_eq!(spec.canonic, "hello.sailor.av.hello.world.tag");

        reg.register_attr(AttrDef {
            expr: spec.clone(),
            prototype: Arc::new(TagValue::default()),
        })
        .unwrap();

        let value = reg.make_value(spec.id).unwrap();
        assert!(value.as_any().downcast_ref::<TagValue>().is_some());

        // commutation: the same tokens in another order resolve identically
        let alias = Name::from_expr("hello.sailor.World.Tag.Hello.av");
        assert_eq!(alias.id, spec.id);
        assert!(reg.make_value(alias.id).is_ok());

        let miss = reg.make_value(Uid([0, 404])).unwrap_err();
        assert_eq!(miss.kind, ErrorKind::ItemNotFound);
    }

    #[test]
    fn nil_attr_uid_rejected() {
        let reg = HostRegistry::new();
        let err = reg
            .register_attr(AttrDef {
                expr: Name::default(),
                prototype: Arc::new(TagValue::default()),
            })
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadRequest);
    }

    #[test]
    fn module_resolution_by_uid_alias_and_domain() {
        let reg = HostRegistry::new();
        let module = test_module("plexus.app.cabinets", &["cab"]);
        reg.register_module(module.clone()).unwrap();

        // by UID
        let invoke = TagValue::from_uid(module.uid());
        assert_eq!(reg.get_app_module(&invoke).unwrap().uid(), module.uid());

        // by declared alias in a URI domain
        let invoke = TagValue::from_uri("plexus://cab/open");
        assert_eq!(reg.get_app_module(&invoke).unwrap().uid(), module.uid());

        // by leaf tag of the module expression
        let invoke = TagValue::from_uri("plexus://cabinets/open");
        assert_eq!(reg.get_app_module(&invoke).unwrap().uid(), module.uid());

        // by full canonic expression as text
        let invoke = TagValue::from_text("plexus.app.cabinets");
        assert_eq!(reg.get_app_module(&invoke).unwrap().uid(), module.uid());

        let miss = reg.get_app_module(&TagValue::from_text("nope")).unwrap_err();
        assert_eq!(miss.kind, ErrorKind::ItemNotFound);
    }

    #[test]
    fn later_registration_overwrites() {
        let reg = HostRegistry::new();
        reg.register_module(test_module("plexus.app.files", &["fs"]))
            .unwrap();
        let newer = test_module("plexus.app.files.v2", &["fs"]);
        reg.register_module(newer.clone()).unwrap();

        let got = reg
            .get_app_module(&TagValue::from_uri("plexus://fs/x"))
            .unwrap();
        assert_eq!(got.uid(), newer.uid());
    }

    #[test]
    fn import_copies_everything() {
        let src = HostRegistry::new();
        src.register_module(test_module("plexus.app.chat", &[]))
            .unwrap();
        src.register_attr(AttrDef {
            expr: Name::from_expr("some.attr"),
            prototype: Arc::new(TagValue::default()),
        })
        .unwrap();

        let dst = HostRegistry::new();
        dst.import(&src).unwrap();
        assert!(dst
            .get_app_module(&TagValue::from_uri("plexus://chat/x"))
            .is_ok());
        assert!(dst.make_value(Name::from_expr("some.attr").id).is_ok());
    }
}
