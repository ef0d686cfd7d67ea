//! Classifier engine
//!
//! Ties the registry, rule table, and interface bindings into the
//! per-packet classify → dispatch path.
//!
//! ```text
//! RawPacket ──▶ binding lookup ──▶ parse ──▶ rule scan ──▶ ClassId ──▶ queue
//!                     │               │
//!                 unbound: error  parse failure: error class
//! ```
//!
//! Classification never mutates engine state: the same packet against
//! the same configuration always yields the same class. Control-plane
//! mutations serialize on a coarse lock that the packet path never
//! takes.

use std::sync::Arc;

use parking_lot::Mutex;
use steer_common::{
    parse_headers, AtomicCounter, ClassId, InterfaceId, MatchField, PoolId, RawPacket, RuleId,
    SteerError, SteerResult,
};

use crate::config::ClassifierSpec;
use crate::iface::{Binding, IfaceBindings};
use crate::queue::DispatchQueue;
use crate::registry::{CosParams, CosRegistry};
use crate::rules::{MatchRule, RuleTable};

/// Packet classification engine
pub struct Classifier {
    registry: CosRegistry,
    rules: RuleTable,
    ifaces: IfaceBindings,
    /// Serializes control-plane mutations against each other
    control: Mutex<()>,

    // Metrics
    classified: AtomicCounter,
    rule_hits: AtomicCounter,
    default_hits: AtomicCounter,
    parse_errors: AtomicCounter,
    unbound: AtomicCounter,
}

impl Classifier {
    /// Engine with no classes, rules, or bindings
    pub fn new() -> Self {
        Self::with_default_pool(steer_common::DEFAULT_POOL)
    }

    /// Engine whose classes bind to `pool` unless they name their own
    pub fn with_default_pool(pool: PoolId) -> Self {
        Self {
            registry: CosRegistry::with_default_pool(pool),
            rules: RuleTable::new(),
            ifaces: IfaceBindings::new(),
            control: Mutex::new(()),
            classified: AtomicCounter::new(0),
            rule_hits: AtomicCounter::new(0),
            default_hits: AtomicCounter::new(0),
            parse_errors: AtomicCounter::new(0),
            unbound: AtomicCounter::new(0),
        }
    }

    // ========================================================================
    // Control plane
    // ========================================================================

    /// Create a class with an owned unbounded queue
    pub fn create_class(&self, name: &str) -> SteerResult<ClassId> {
        let _control = self.control.lock();
        self.registry.create_class(name)
    }

    /// Create a class with explicit queue and pool parameters
    pub fn create_class_with(&self, name: &str, params: CosParams) -> SteerResult<ClassId> {
        let _control = self.control.lock();
        self.registry.create_class_with(name, params)
    }

    /// Create a class that dispatches into an existing queue
    pub fn create_class_with_queue(
        &self,
        name: &str,
        queue: Arc<DispatchQueue>,
    ) -> SteerResult<ClassId> {
        let _control = self.control.lock();
        self.registry.create_class_with_queue(name, queue)
    }

    /// Destroy a class
    ///
    /// Refused with [`SteerError::InUse`] while any rule or interface
    /// binding still references it.
    pub fn destroy_class(&self, id: ClassId) -> SteerResult<()> {
        let _control = self.control.lock();
        self.registry.destroy_class(id)
    }

    /// Id for an interface name, allocating one on first sight
    pub fn intern_interface(&self, name: &str) -> InterfaceId {
        let _control = self.control.lock();
        self.ifaces.intern(name)
    }

    /// Bind an interface's default and error classes
    ///
    /// Both classes must be live. Rebinding replaces the previous pair.
    pub fn bind_interface(
        &self,
        iface: InterfaceId,
        default_class: ClassId,
        error_class: ClassId,
    ) -> SteerResult<()> {
        let _control = self.control.lock();
        self.registry.retain(default_class)?;
        if let Err(err) = self.registry.retain(error_class) {
            self.registry.release(default_class);
            return Err(err);
        }
        let binding = Binding {
            default_class,
            error_class,
        };
        if let Some(old) = self.ifaces.bind(iface, binding) {
            self.registry.release(old.default_class);
            self.registry.release(old.error_class);
        }
        tracing::debug!(
            "bound {}: default {} error {}",
            iface,
            default_class,
            error_class
        );
        Ok(())
    }

    /// Remove an interface's bindings
    pub fn unbind_interface(&self, iface: InterfaceId) -> SteerResult<()> {
        let _control = self.control.lock();
        match self.ifaces.unbind(iface) {
            Some(old) => {
                self.registry.release(old.default_class);
                self.registry.release(old.error_class);
                Ok(())
            }
            None => Err(SteerError::UnboundInterface(iface)),
        }
    }

    /// Append a match rule steering `src_class` packets to `dst_class`
    ///
    /// The rule lands after the existing rules for `src_class`; earlier
    /// rules keep winning ties.
    pub fn add_rule(
        &self,
        field: MatchField,
        value: u64,
        mask: u64,
        src_class: ClassId,
        dst_class: ClassId,
    ) -> SteerResult<RuleId> {
        let _control = self.control.lock();
        self.registry.retain(src_class)?;
        if let Err(err) = self.registry.retain(dst_class) {
            self.registry.release(src_class);
            return Err(err);
        }
        match self.rules.insert(field, value, mask, src_class, dst_class) {
            Ok(id) => Ok(id),
            Err(err) => {
                self.registry.release(src_class);
                self.registry.release(dst_class);
                Err(err)
            }
        }
    }

    /// Remove a match rule
    pub fn remove_rule(&self, id: RuleId) -> SteerResult<()> {
        let _control = self.control.lock();
        let removed = self.rules.remove(id)?;
        self.registry.release(removed.src_class);
        self.registry.release(removed.dst_class);
        Ok(())
    }

    /// Apply a declarative spec: classes, then bindings, then rules
    ///
    /// Applied in listed order; the first failure aborts and leaves the
    /// already-applied items in place.
    pub fn apply_spec(&self, spec: &ClassifierSpec) -> SteerResult<()> {
        for class in &spec.classes {
            let params = CosParams {
                queue_capacity: class.queue_capacity,
                pool: class.pool.map(PoolId),
            };
            self.create_class_with(&class.name, params)?;
        }
        for binding in &spec.interfaces {
            let default_class = self.lookup_class(&binding.default_class)?;
            let error_class = match &binding.error_class {
                Some(name) => self.lookup_class(name)?,
                None => default_class,
            };
            let iface = self.intern_interface(&binding.interface);
            self.bind_interface(iface, default_class, error_class)?;
        }
        for rule in &spec.rules {
            let src = self.lookup_class(&rule.src_class)?;
            let dst = self.lookup_class(&rule.dst_class)?;
            let mask = rule.mask.unwrap_or(rule.field.full_mask());
            self.add_rule(rule.field, rule.value, mask, src, dst)?;
        }
        tracing::info!(
            "applied classifier spec: {} classes, {} bindings, {} rules",
            spec.classes.len(),
            spec.interfaces.len(),
            spec.rules.len()
        );
        Ok(())
    }

    /// Close every dispatch queue, waking all blocked consumers
    pub fn close_queues(&self) {
        self.registry.close_all();
    }

    // ========================================================================
    // Packet path
    // ========================================================================

    /// Classify a packet to its destination class
    ///
    /// Starts rule evaluation at the ingress interface's default class;
    /// a frame that fails header parsing goes to the error class. The
    /// packet itself is never modified.
    #[inline]
    pub fn classify(&self, pkt: &RawPacket) -> SteerResult<ClassId> {
        let binding = match self.ifaces.get(pkt.iface) {
            Some(binding) => binding,
            None => {
                self.unbound.inc();
                return Err(SteerError::UnboundInterface(pkt.iface));
            }
        };
        self.classified.inc();
        match parse_headers(&pkt.data) {
            Ok(headers) => {
                let dst = self.rules.evaluate(binding.default_class, &headers);
                if dst == binding.default_class {
                    self.default_hits.inc();
                } else {
                    self.rule_hits.inc();
                }
                Ok(dst)
            }
            Err(_) => {
                self.parse_errors.inc();
                Ok(binding.error_class)
            }
        }
    }

    /// Enqueue a packet on a class's dispatch queue
    #[inline]
    pub fn dispatch(&self, class: ClassId, pkt: RawPacket) -> SteerResult<()> {
        self.registry.queue_of(class)?.enqueue(pkt)
    }

    /// Classify and dispatch in one step, returning the class chosen
    #[inline]
    pub fn process(&self, pkt: RawPacket) -> SteerResult<ClassId> {
        let class = self.classify(&pkt)?;
        self.dispatch(class, pkt)?;
        Ok(class)
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Resolve a class name
    pub fn lookup_class(&self, name: &str) -> SteerResult<ClassId> {
        self.registry.lookup(name)
    }

    /// Dispatch queue of a class
    pub fn queue_of(&self, class: ClassId) -> SteerResult<Arc<DispatchQueue>> {
        self.registry.queue_of(class)
    }

    /// Rules scoped to `src_class`, in match order
    pub fn rules_for(&self, src_class: ClassId) -> Vec<MatchRule> {
        self.rules.rules_for(src_class)
    }

    /// Class registry
    pub fn registry(&self) -> &CosRegistry {
        &self.registry
    }

    /// Engine statistics
    pub fn stats(&self) -> ClassifierStats {
        let classified = self.classified.get();
        let rule_hits = self.rule_hits.get();
        ClassifierStats {
            classified,
            rule_hits,
            default_hits: self.default_hits.get(),
            parse_errors: self.parse_errors.get(),
            unbound_drops: self.unbound.get(),
            rule_hit_rate: if classified > 0 {
                rule_hits as f64 / classified as f64
            } else {
                0.0
            },
            classes: self.registry.len(),
            rules_loaded: self.rules.len(),
            rule_version: self.rules.version(),
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClassifierStats {
    /// Packets classified (bound interfaces only)
    pub classified: u64,
    /// Packets steered by a matching rule
    pub rule_hits: u64,
    /// Packets that fell through to the default class
    pub default_hits: u64,
    /// Packets routed to an error class after a parse failure
    pub parse_errors: u64,
    /// Packets refused for arriving on an unbound interface
    pub unbound_drops: u64,
    /// rule_hits / classified
    pub rule_hit_rate: f64,
    /// Live classes
    pub classes: usize,
    /// Rules currently in the table
    pub rules_loaded: usize,
    /// Rule table update generation
    pub rule_version: u64,
}
