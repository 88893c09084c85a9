//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Capability contracts, catalog discovery, and the command/event protocol."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Catalog discovery and the process-wide component registry.
//!
//! A catalog is built from a registration table exactly once per scope
//! key; the first caller's table wins and every later build request for
//! the same key receives the cached catalog untouched. Instances are
//! realised lazily on first resolution and shared from then on; a
//! constructor failure is never cached, so a later lookup retries.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, info};

use rch_common::error::codes;
use rch_common::{CapabilityKind, HostError, HostResult, Messages};

use crate::capability::{
    CapabilityDescriptor, EffectorFamily, Family, ProcessorFamily, Registration,
    RegistrationTable, RobotFamily, SensorFamily, TypeToken,
};
use crate::component::{Effector, Processor, Robot, Sensor};
use crate::factory::{EffectorFactory, ProcessorFactory, RobotFactory, SensorFactory};

/// Name of one catalog universe within the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey(String);

impl ScopeKey {
    /// Validate and wrap a scope name. Empty or whitespace-only names are
    /// rejected, failing at the point the author made the mistake.
    pub fn new(key: impl Into<String>) -> HostResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(HostError::discovery(
                codes::SCOPE_KEY_EMPTY,
                Messages::technical_and_user(
                    "scope key must not be empty",
                    "an internal component group was misnamed",
                ),
            ));
        }
        Ok(Self(key))
    }

    /// The key as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct CatalogEntry<C: ?Sized, F: Family> {
    descriptor: CapabilityDescriptor<F>,
    construct: Box<dyn Fn() -> HostResult<Arc<C>> + Send + Sync>,
    instance: OnceCell<Arc<C>>,
}

impl<C: ?Sized, F: Family> CatalogEntry<C, F> {
    /// Lazily construct on first resolution; failures leave the slot
    /// empty so the next resolution retries.
    fn resolve(&self) -> HostResult<Arc<C>> {
        Ok(self
            .instance
            .get_or_try_init(|| (self.construct)())?
            .clone())
    }
}

/// Ordered entries of one capability kind within one scope.
pub struct CapabilityCatalog<C: ?Sized, F: Family> {
    kind: CapabilityKind,
    scope: ScopeKey,
    entries: Vec<CatalogEntry<C, F>>,
}

impl<C: ?Sized, F: Family> CapabilityCatalog<C, F> {
    fn from_registrations(
        kind: CapabilityKind,
        scope: &ScopeKey,
        registrations: Vec<Registration<C, F>>,
    ) -> HostResult<Self> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut entries = Vec::with_capacity(registrations.len());
        for registration in registrations {
            let name = registration.descriptor.type_name().to_owned();
            if !seen.insert(name.clone()) {
                return Err(HostError::discovery(
                    codes::DUPLICATE_REGISTRATION,
                    Messages::new(
                        format!("duplicate {kind} registration `{name}` in scope `{scope}`"),
                        format!("duplicate registration `{name}`"),
                        "registrations within one kind and scope need distinct type names"
                            .to_owned(),
                        "the device table is invalid".to_owned(),
                    ),
                ));
            }
            entries.push(CatalogEntry {
                descriptor: registration.descriptor,
                construct: registration.construct,
                instance: OnceCell::new(),
            });
        }
        Ok(Self {
            kind,
            scope: scope.clone(),
            entries,
        })
    }

    /// Kind this catalog manages.
    pub fn kind(&self) -> CapabilityKind {
        self.kind
    }

    /// Scope this catalog belongs to.
    pub fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    /// Declared descriptors in discovery order.
    pub fn descriptors(&self) -> impl Iterator<Item = &CapabilityDescriptor<F>> + '_ {
        self.entries.iter().map(|entry| &entry.descriptor)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every instance whose declared family matches, in discovery order.
    /// An empty result is not an error.
    pub fn by_family(&self, family: F) -> HostResult<Vec<Arc<C>>> {
        let mut matches = Vec::new();
        for entry in &self.entries {
            if entry.descriptor.family().matches(family) {
                let instance = entry.resolve().map_err(|err| {
                    self.construction_failure(&entry.descriptor, codes::FACTORY_FAMILY_QUERY, err)
                })?;
                matches.push(instance);
            }
        }
        Ok(matches)
    }

    /// Every instance registered under `type_name`, in discovery order.
    pub fn by_type_name(&self, type_name: &str) -> HostResult<Vec<Arc<C>>> {
        let mut matches = Vec::new();
        for entry in &self.entries {
            if entry.descriptor.type_name() == type_name {
                let instance = entry.resolve().map_err(|err| {
                    self.construction_failure(&entry.descriptor, codes::FACTORY_TYPE_QUERY, err)
                })?;
                matches.push(instance);
            }
        }
        Ok(matches)
    }

    /// Every instance whose concrete type matches `token`.
    pub fn by_token(&self, token: TypeToken) -> HostResult<Vec<Arc<C>>> {
        let mut matches = Vec::new();
        for entry in &self.entries {
            if entry.descriptor.token().id() == token.id() {
                let instance = entry.resolve().map_err(|err| {
                    self.construction_failure(&entry.descriptor, codes::FACTORY_TYPE_QUERY, err)
                })?;
                matches.push(instance);
            }
        }
        Ok(matches)
    }

    /// First family match in discovery order. A miss is NotFound; a
    /// matched entry that fails to construct is a factory error.
    pub fn one_by_family(&self, family: F) -> HostResult<Arc<C>> {
        match self
            .entries
            .iter()
            .find(|entry| entry.descriptor.family().matches(family))
        {
            Some(entry) => entry.resolve().map_err(|err| {
                self.construction_failure(&entry.descriptor, codes::FACTORY_CONSTRUCTION, err)
            }),
            None => Err(HostError::not_found(
                self.kind,
                codes::FACTORY_FAMILY_NOT_FOUND,
                Messages::new(
                    format!(
                        "no {} of family `{family}` in scope `{}`",
                        self.kind, self.scope
                    ),
                    format!("no {} of family `{family}`", self.kind),
                    format!("register a {} under family `{family}`", self.kind),
                    "a required device kind is not installed".to_owned(),
                ),
            )),
        }
    }

    /// First entry registered under `type_name`.
    pub fn one_by_type_name(&self, type_name: &str) -> HostResult<Arc<C>> {
        match self
            .entries
            .iter()
            .find(|entry| entry.descriptor.type_name() == type_name)
        {
            Some(entry) => entry.resolve().map_err(|err| {
                self.construction_failure(&entry.descriptor, codes::FACTORY_CONSTRUCTION, err)
            }),
            None => Err(self.type_miss(type_name)),
        }
    }

    /// First entry whose concrete type matches `token`.
    pub fn one_by_token(&self, token: TypeToken) -> HostResult<Arc<C>> {
        match self
            .entries
            .iter()
            .find(|entry| entry.descriptor.token().id() == token.id())
        {
            Some(entry) => entry.resolve().map_err(|err| {
                self.construction_failure(&entry.descriptor, codes::FACTORY_CONSTRUCTION, err)
            }),
            None => Err(self.type_miss(token.name())),
        }
    }

    fn type_miss(&self, wanted: &str) -> HostError {
        HostError::not_found(
            self.kind,
            codes::FACTORY_TYPE_NOT_FOUND,
            Messages::new(
                format!("no {} `{wanted}` in scope `{}`", self.kind, self.scope),
                format!("{} `{wanted}` not registered", self.kind),
                format!("register `{wanted}` in the scope's device table"),
                "a configured device is not installed".to_owned(),
            ),
        )
    }

    fn construction_failure(
        &self,
        descriptor: &CapabilityDescriptor<F>,
        offset: u16,
        cause: HostError,
    ) -> HostError {
        HostError::factory(
            self.kind,
            offset,
            Messages::new(
                format!(
                    "{} {descriptor} in scope `{}` failed to construct: {cause}",
                    self.kind, self.scope
                ),
                format!("{} `{}` unavailable", self.kind, descriptor.type_name()),
                format!("inspect the `{}` constructor", descriptor.type_name()),
                "a required device could not be started".to_owned(),
            ),
            Some(anyhow::Error::new(cause)),
        )
    }
}

impl<C: ?Sized, F: Family> fmt::Debug for CapabilityCatalog<C, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityCatalog")
            .field("kind", &self.kind)
            .field("scope", &self.scope)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// The four catalogs of one scope, plus the typed factory views over
/// them.
#[derive(Debug)]
pub struct ScopeCatalog {
    scope: ScopeKey,
    robots: CapabilityCatalog<dyn Robot, RobotFamily>,
    sensors: CapabilityCatalog<dyn Sensor, SensorFamily>,
    effectors: CapabilityCatalog<dyn Effector, EffectorFamily>,
    processors: CapabilityCatalog<dyn Processor, ProcessorFamily>,
}

impl ScopeCatalog {
    fn from_table(scope: ScopeKey, table: RegistrationTable) -> HostResult<Self> {
        Ok(Self {
            robots: CapabilityCatalog::from_registrations(
                CapabilityKind::Robot,
                &scope,
                table.robots,
            )?,
            sensors: CapabilityCatalog::from_registrations(
                CapabilityKind::Sensor,
                &scope,
                table.sensors,
            )?,
            effectors: CapabilityCatalog::from_registrations(
                CapabilityKind::Effector,
                &scope,
                table.effectors,
            )?,
            processors: CapabilityCatalog::from_registrations(
                CapabilityKind::Processor,
                &scope,
                table.processors,
            )?,
            scope,
        })
    }

    /// Scope this catalog serves.
    pub fn scope(&self) -> &ScopeKey {
        &self.scope
    }

    /// Typed factory over the robot entries.
    pub fn robots(&self) -> RobotFactory<'_> {
        RobotFactory::new(&self.robots)
    }

    /// Typed factory over the sensor entries.
    pub fn sensors(&self) -> SensorFactory<'_> {
        SensorFactory::new(&self.sensors)
    }

    /// Typed factory over the effector entries.
    pub fn effectors(&self) -> EffectorFactory<'_> {
        EffectorFactory::new(&self.effectors)
    }

    /// Typed factory over the processor entries.
    pub fn processors(&self) -> ProcessorFactory<'_> {
        ProcessorFactory::new(&self.processors)
    }
}

/// Process-wide registry of built catalogs, keyed by scope.
///
/// Owned by the composition root and threaded through the host
/// explicitly. `build` is exactly-once per key: the first caller's table
/// is built and cached, later callers get the cached catalog and their
/// tables are discarded.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    inner: Mutex<IndexMap<ScopeKey, Arc<ScopeCatalog>>>,
}

impl ComponentRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build (or fetch) the catalog for `scope`.
    ///
    /// The lock is held across the build, serialising racing first
    /// callers; the build is pure in-memory table processing.
    pub fn build(&self, scope: ScopeKey, table: RegistrationTable) -> HostResult<Arc<ScopeCatalog>> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.get(&scope) {
            debug!(scope = %scope, "catalog already built, returning cached instance");
            return Ok(Arc::clone(existing));
        }
        let catalog = Arc::new(ScopeCatalog::from_table(scope.clone(), table)?);
        inner.insert(scope.clone(), Arc::clone(&catalog));
        info!(
            scope = %scope,
            robots = catalog.robots().len(),
            sensors = catalog.sensors().len(),
            effectors = catalog.effectors().len(),
            processors = catalog.processors().len(),
            "capability catalog built"
        );
        Ok(catalog)
    }

    /// Fetch an already-built catalog.
    pub fn get(&self, scope: &ScopeKey) -> Option<Arc<ScopeCatalog>> {
        self.inner.lock().get(scope).cloned()
    }

    /// Keys of every built catalog, in build order.
    pub fn scopes(&self) -> Vec<ScopeKey> {
        self.inner.lock().keys().cloned().collect()
    }
}
