//! Bound instance graphs
//!
//! Binding a `system` declaration produces a [`SystemGraph`]: an arena of
//! component instances addressed by integer id, plus a name table. Instances
//! reference each other through ids rather than pointers, so mutually
//! dependent (even cyclic) `uses` wiring is representable without ownership
//! ambiguity. Binding happens in two passes: allocate every instance with
//! placeholder bindings, then back-patch the `uses` slots by name lookup.

use crate::ast::{ComponentDecl, FileDecl, MethodDecl};
use crate::components::BuiltinKind;
use crate::error::{Result, SimError};
use crate::params::ParamValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Index into the instance arena
pub type InstanceId = usize;

/// What an instance executes when called: a built-in model or a user-defined
/// component's method ASTs.
#[derive(Debug, Clone)]
pub enum ComponentBody {
    Builtin(BuiltinKind),
    Defined(Arc<ComponentDecl>),
}

/// One bound component instance
#[derive(Debug, Clone)]
pub struct ComponentInstance {
    /// Instance name within the system
    pub name: String,
    /// Component type name
    pub type_name: String,
    pub body: ComponentBody,
    /// Declared parameters: component defaults overlaid with the instance
    /// declaration's assignments
    pub params: HashMap<String, ParamValue>,
    /// `uses` slot name → bound instance
    pub bindings: HashMap<String, InstanceId>,
}

impl ComponentInstance {
    /// Methods this instance exposes
    pub fn method_names(&self) -> Vec<String> {
        match &self.body {
            ComponentBody::Builtin(kind) => {
                kind.methods().iter().map(|m| (*m).to_string()).collect()
            }
            ComponentBody::Defined(decl) => {
                decl.methods.iter().map(|m| m.name.clone()).collect()
            }
        }
    }

    pub fn find_method(&self, name: &str) -> Option<&MethodDecl> {
        match &self.body {
            ComponentBody::Builtin(_) => None,
            ComponentBody::Defined(decl) => decl.find_method(name),
        }
    }

    pub fn has_method(&self, name: &str) -> bool {
        match &self.body {
            ComponentBody::Builtin(kind) => kind.methods().contains(&name),
            ComponentBody::Defined(decl) => decl.find_method(name).is_some(),
        }
    }
}

/// The root instance graph for one bound system declaration
#[derive(Debug, Clone)]
pub struct SystemGraph {
    pub name: String,
    instances: Vec<ComponentInstance>,
    by_name: HashMap<String, InstanceId>,
}

impl SystemGraph {
    /// Bind `system_name` from a parsed file.
    ///
    /// Fails with [`SimError::InstanceBinding`] when a `uses` slot names an
    /// instance that does not exist in the same system, and with
    /// [`SimError::UnknownComponent`] when an instance declaration names a
    /// type that is neither built-in nor declared in the file.
    pub fn bind(file: &FileDecl, system_name: &str) -> Result<SystemGraph> {
        let decl = file
            .find_system(system_name)
            .ok_or_else(|| SimError::UnknownSystem(system_name.to_string()))?;

        // Pass 1: allocate every instance with empty bindings.
        let mut instances = Vec::with_capacity(decl.instances.len());
        let mut by_name = HashMap::with_capacity(decl.instances.len());
        for inst in &decl.instances {
            let body = match BuiltinKind::from_type_name(&inst.component) {
                Some(kind) => ComponentBody::Builtin(kind),
                None => {
                    let component = file
                        .find_component(&inst.component)
                        .ok_or_else(|| SimError::UnknownComponent(inst.component.clone()))?;
                    ComponentBody::Defined(Arc::new(component.clone()))
                }
            };

            let mut params: HashMap<String, ParamValue> = match &body {
                ComponentBody::Defined(decl) => decl
                    .params
                    .iter()
                    .map(|p| (p.name.clone(), p.default.clone()))
                    .collect(),
                ComponentBody::Builtin(_) => HashMap::new(),
            };
            for (name, value) in &inst.params {
                params.insert(name.clone(), value.clone());
            }

            if by_name.contains_key(&inst.name) {
                return Err(SimError::InstanceBinding(format!(
                    "duplicate instance name: {}",
                    inst.name
                )));
            }
            by_name.insert(inst.name.clone(), instances.len());
            instances.push(ComponentInstance {
                name: inst.name.clone(),
                type_name: inst.component.clone(),
                body,
                params,
                bindings: HashMap::new(),
            });
        }

        // Pass 2: back-patch `uses` slots by name lookup.
        for inst in &decl.instances {
            let id = by_name[&inst.name];
            for (slot, target) in &inst.bindings {
                let target_id = *by_name.get(target).ok_or_else(|| {
                    SimError::InstanceBinding(format!(
                        "{}.{} refers to unknown instance {}",
                        inst.name, slot, target
                    ))
                })?;
                instances[id].bindings.insert(slot.clone(), target_id);
            }
            // Every declared slot of a user component must be wired.
            if let ComponentBody::Defined(component) = &instances[id].body {
                for slot in &component.uses {
                    if !instances[id].bindings.contains_key(&slot.binding) {
                        return Err(SimError::InstanceBinding(format!(
                            "{} leaves uses slot {} unbound",
                            inst.name, slot.binding
                        )));
                    }
                }
            }
        }

        Ok(SystemGraph {
            name: system_name.to_string(),
            instances,
            by_name,
        })
    }

    pub fn get(&self, id: InstanceId) -> &ComponentInstance {
        &self.instances[id]
    }

    pub fn lookup(&self, name: &str) -> Option<InstanceId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &ComponentInstance)> {
        self.instances.iter().enumerate()
    }

    /// Resolve `instance.method` into ids, verifying the method exists
    pub fn resolve_target(&self, target: &str) -> Result<(InstanceId, String)> {
        let (instance, method) = target
            .split_once('.')
            .ok_or_else(|| SimError::UnknownTarget(target.to_string()))?;
        let id = self
            .lookup(instance)
            .ok_or_else(|| SimError::UnknownTarget(target.to_string()))?;
        if !self.get(id).has_method(method) {
            return Err(SimError::UnknownTarget(target.to_string()));
        }
        Ok((id, method.to_string()))
    }

    /// Resolve a dotted parameter path (`instance[.slot...].Param`) to the
    /// owning instance and the bare parameter name.
    ///
    /// Intermediate segments traverse `uses` bindings, so `app.db.Capacity`
    /// reaches the instance wired into `app`'s `db` slot.
    pub fn resolve_param_path(&self, path: &str) -> Result<(InstanceId, String)> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.len() < 2 {
            return Err(SimError::UnknownParameter(path.to_string()));
        }
        let mut id = self
            .lookup(segments[0])
            .ok_or_else(|| SimError::UnknownParameter(path.to_string()))?;
        for slot in &segments[1..segments.len() - 1] {
            id = *self
                .get(id)
                .bindings
                .get(*slot)
                .ok_or_else(|| SimError::UnknownParameter(path.to_string()))?;
        }
        Ok((id, segments[segments.len() - 1].to_string()))
    }

    /// Canonical override key for a resolved parameter: the owning
    /// instance's system-level name plus the parameter name.
    pub fn canonical_param_path(&self, id: InstanceId, param: &str) -> String {
        format!("{}.{}", self.get(id).name, param)
    }

    /// Resolve a call receiver path from the viewpoint of `current`.
    ///
    /// An empty path targets `current` itself. The first segment checks
    /// `current`'s `uses` bindings before falling back to system-level
    /// instance names; later segments only traverse bindings.
    pub fn resolve_receiver(&self, current: InstanceId, path: &[String]) -> Option<InstanceId> {
        let mut segments = path.iter();
        let mut id = match segments.next() {
            None => return Some(current),
            Some(first) => match self.get(current).bindings.get(first) {
                Some(bound) => *bound,
                None => self.lookup(first)?,
            },
        };
        for segment in segments {
            id = *self.get(id).bindings.get(segment)?;
        }
        Some(id)
    }
}
