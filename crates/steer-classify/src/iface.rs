//! Interface bindings
//!
//! Maps each ingress interface to its default and error classes. The
//! default class is where rule evaluation starts; the error class
//! receives frames that fail header parsing. Packets from an unbound
//! interface are refused.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use steer_common::{ClassId, InterfaceId};

/// Default and error class pair for one interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// Class where rule evaluation starts when parsing succeeds
    pub default_class: ClassId,
    /// Class receiving frames that fail parsing
    pub error_class: ClassId,
}

/// Per-interface class bindings
///
/// Interface ids are interned from names, stable for the process
/// lifetime. Reads on the packet path are lock-free.
#[derive(Debug, Default)]
pub struct IfaceBindings {
    bindings: DashMap<InterfaceId, Binding>,
    names: DashMap<String, InterfaceId>,
    next_id: AtomicU32,
}

impl IfaceBindings {
    /// Empty binding table
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for an interface name, allocating one on first sight
    pub fn intern(&self, name: &str) -> InterfaceId {
        if let Some(id) = self.names.get(name) {
            return *id;
        }
        *self
            .names
            .entry(name.to_string())
            .or_insert_with(|| InterfaceId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    /// Id of an already-interned interface name
    pub fn id_of(&self, name: &str) -> Option<InterfaceId> {
        self.names.get(name).map(|id| *id)
    }

    /// Install a binding, returning the one it replaced
    pub fn bind(&self, iface: InterfaceId, binding: Binding) -> Option<Binding> {
        self.bindings.insert(iface, binding)
    }

    /// Binding for an interface
    #[inline]
    pub fn get(&self, iface: InterfaceId) -> Option<Binding> {
        self.bindings.get(&iface).map(|binding| *binding)
    }

    /// Remove a binding, returning it
    pub fn unbind(&self, iface: InterfaceId) -> Option<Binding> {
        self.bindings.remove(&iface).map(|(_, binding)| binding)
    }

    /// Number of bound interfaces
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// True when no interface is bound
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let ifaces = IfaceBindings::new();
        let eth0 = ifaces.intern("eth0");
        let eth1 = ifaces.intern("eth1");

        assert_ne!(eth0, eth1);
        assert_eq!(ifaces.intern("eth0"), eth0);
        assert_eq!(ifaces.id_of("eth0"), Some(eth0));
        assert_eq!(ifaces.id_of("eth9"), None);
    }

    #[test]
    fn test_bind_replace_unbind() {
        let ifaces = IfaceBindings::new();
        let eth0 = ifaces.intern("eth0");
        let first = Binding {
            default_class: ClassId(1),
            error_class: ClassId(2),
        };
        let second = Binding {
            default_class: ClassId(3),
            error_class: ClassId(3),
        };

        assert_eq!(ifaces.bind(eth0, first), None);
        assert_eq!(ifaces.get(eth0), Some(first));
        assert_eq!(ifaces.bind(eth0, second), Some(first));
        assert_eq!(ifaces.get(eth0), Some(second));
        assert_eq!(ifaces.unbind(eth0), Some(second));
        assert_eq!(ifaces.get(eth0), None);
        assert!(ifaces.is_empty());
    }
}
