//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Capability contracts, catalog discovery, and the command/event protocol."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Typed factory views over one scope's catalogs.
//!
//! A factory is a cheap borrow created on demand from a
//! [`ScopeCatalog`](crate::ScopeCatalog). It narrows the generic catalog
//! queries to one capability trait and adds concrete-type resolution
//! (`one_of`) on top of the family and name lookups.

use std::sync::Arc;

use rch_common::error::codes;
use rch_common::{CapabilityKind, HostError, HostResult, Messages};

use crate::capability::{
    CapabilityDescriptor, EffectorFamily, ProcessorFamily, RobotFamily, SensorFamily, TypeToken,
};
use crate::catalog::CapabilityCatalog;
use crate::component::{Effector, Processor, Robot, Sensor};

fn downcast_mismatch(kind: CapabilityKind, token: TypeToken) -> HostError {
    HostError::factory(
        kind,
        codes::FACTORY_TYPE_QUERY,
        Messages::new(
            format!("resolved {kind} does not downcast to `{token}`"),
            format!("{kind} type mismatch"),
            format!("the entry registered for `{token}` constructs a different type"),
            "a device wiring fault was detected".to_owned(),
        ),
        None,
    )
}

/// Typed view over a scope's robot catalog.
#[derive(Debug, Clone, Copy)]
pub struct RobotFactory<'a> {
    catalog: &'a CapabilityCatalog<dyn Robot, RobotFamily>,
}

impl<'a> RobotFactory<'a> {
    pub(crate) fn new(catalog: &'a CapabilityCatalog<dyn Robot, RobotFamily>) -> Self {
        Self { catalog }
    }

    /// Every robot whose family matches, in discovery order. Empty is
    /// not an error.
    pub fn by_family(&self, family: RobotFamily) -> HostResult<Vec<Arc<dyn Robot>>> {
        self.catalog.by_family(family)
    }

    /// Every robot registered under `type_name`.
    pub fn by_type_name(&self, type_name: &str) -> HostResult<Vec<Arc<dyn Robot>>> {
        self.catalog.by_type_name(type_name)
    }

    /// First robot whose family matches.
    pub fn one_by_family(&self, family: RobotFamily) -> HostResult<Arc<dyn Robot>> {
        self.catalog.one_by_family(family)
    }

    /// First robot registered under `type_name`.
    pub fn one_by_type_name(&self, type_name: &str) -> HostResult<Arc<dyn Robot>> {
        self.catalog.one_by_type_name(type_name)
    }

    /// Every robot whose concrete type is `T`.
    pub fn by_token<T: Robot + 'static>(&self) -> HostResult<Vec<Arc<dyn Robot>>> {
        self.catalog.by_token(TypeToken::of::<T>())
    }

    /// First robot whose concrete type is `T`, as the trait object.
    pub fn one_by_token<T: Robot + 'static>(&self) -> HostResult<Arc<dyn Robot>> {
        self.catalog.one_by_token(TypeToken::of::<T>())
    }

    /// Resolve the entry registered for `T` and hand it back typed.
    pub fn one_of<T: Robot + 'static>(&self) -> HostResult<Arc<T>> {
        let token = TypeToken::of::<T>();
        let instance = self.catalog.one_by_token(token)?;
        instance
            .as_any_arc()
            .downcast::<T>()
            .map_err(|_| downcast_mismatch(CapabilityKind::Robot, token))
    }

    /// Declared descriptors in discovery order.
    pub fn descriptors(&self) -> impl Iterator<Item = &'a CapabilityDescriptor<RobotFamily>> + 'a {
        self.catalog.descriptors()
    }

    /// Number of registered robots.
    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    /// True when no robot is registered.
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }
}

/// Typed view over a scope's sensor catalog.
#[derive(Debug, Clone, Copy)]
pub struct SensorFactory<'a> {
    catalog: &'a CapabilityCatalog<dyn Sensor, SensorFamily>,
}

impl<'a> SensorFactory<'a> {
    pub(crate) fn new(catalog: &'a CapabilityCatalog<dyn Sensor, SensorFamily>) -> Self {
        Self { catalog }
    }

    /// Every sensor of `family`, in discovery order. Empty is not an
    /// error.
    pub fn by_family(&self, family: SensorFamily) -> HostResult<Vec<Arc<dyn Sensor>>> {
        self.catalog.by_family(family)
    }

    /// Every sensor registered under `type_name`.
    pub fn by_type_name(&self, type_name: &str) -> HostResult<Vec<Arc<dyn Sensor>>> {
        self.catalog.by_type_name(type_name)
    }

    /// First sensor of `family`.
    pub fn one_by_family(&self, family: SensorFamily) -> HostResult<Arc<dyn Sensor>> {
        self.catalog.one_by_family(family)
    }

    /// First sensor registered under `type_name`.
    pub fn one_by_type_name(&self, type_name: &str) -> HostResult<Arc<dyn Sensor>> {
        self.catalog.one_by_type_name(type_name)
    }

    /// Every sensor whose concrete type is `T`.
    pub fn by_token<T: Sensor + 'static>(&self) -> HostResult<Vec<Arc<dyn Sensor>>> {
        self.catalog.by_token(TypeToken::of::<T>())
    }

    /// First sensor whose concrete type is `T`, as the trait object.
    pub fn one_by_token<T: Sensor + 'static>(&self) -> HostResult<Arc<dyn Sensor>> {
        self.catalog.one_by_token(TypeToken::of::<T>())
    }

    /// Resolve the entry registered for `T` and hand it back typed.
    pub fn one_of<T: Sensor + 'static>(&self) -> HostResult<Arc<T>> {
        let token = TypeToken::of::<T>();
        let instance = self.catalog.one_by_token(token)?;
        instance
            .as_any_arc()
            .downcast::<T>()
            .map_err(|_| downcast_mismatch(CapabilityKind::Sensor, token))
    }

    /// Declared descriptors in discovery order.
    pub fn descriptors(&self) -> impl Iterator<Item = &'a CapabilityDescriptor<SensorFamily>> + 'a {
        self.catalog.descriptors()
    }

    /// Number of registered sensors.
    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    /// True when no sensor is registered.
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }
}

/// Typed view over a scope's effector catalog.
#[derive(Debug, Clone, Copy)]
pub struct EffectorFactory<'a> {
    catalog: &'a CapabilityCatalog<dyn Effector, EffectorFamily>,
}

impl<'a> EffectorFactory<'a> {
    pub(crate) fn new(catalog: &'a CapabilityCatalog<dyn Effector, EffectorFamily>) -> Self {
        Self { catalog }
    }

    /// Every effector of `family`, in discovery order. Empty is not an
    /// error.
    pub fn by_family(&self, family: EffectorFamily) -> HostResult<Vec<Arc<dyn Effector>>> {
        self.catalog.by_family(family)
    }

    /// Every effector registered under `type_name`.
    pub fn by_type_name(&self, type_name: &str) -> HostResult<Vec<Arc<dyn Effector>>> {
        self.catalog.by_type_name(type_name)
    }

    /// First effector of `family`.
    pub fn one_by_family(&self, family: EffectorFamily) -> HostResult<Arc<dyn Effector>> {
        self.catalog.one_by_family(family)
    }

    /// First effector registered under `type_name`.
    pub fn one_by_type_name(&self, type_name: &str) -> HostResult<Arc<dyn Effector>> {
        self.catalog.one_by_type_name(type_name)
    }

    /// Every effector whose concrete type is `T`.
    pub fn by_token<T: Effector + 'static>(&self) -> HostResult<Vec<Arc<dyn Effector>>> {
        self.catalog.by_token(TypeToken::of::<T>())
    }

    /// First effector whose concrete type is `T`, as the trait object.
    pub fn one_by_token<T: Effector + 'static>(&self) -> HostResult<Arc<dyn Effector>> {
        self.catalog.one_by_token(TypeToken::of::<T>())
    }

    /// Resolve the entry registered for `T` and hand it back typed.
    pub fn one_of<T: Effector + 'static>(&self) -> HostResult<Arc<T>> {
        let token = TypeToken::of::<T>();
        let instance = self.catalog.one_by_token(token)?;
        instance
            .as_any_arc()
            .downcast::<T>()
            .map_err(|_| downcast_mismatch(CapabilityKind::Effector, token))
    }

    /// Declared descriptors in discovery order.
    pub fn descriptors(
        &self,
    ) -> impl Iterator<Item = &'a CapabilityDescriptor<EffectorFamily>> + 'a {
        self.catalog.descriptors()
    }

    /// Number of registered effectors.
    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    /// True when no effector is registered.
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }
}

/// Typed view over a scope's processor catalog.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorFactory<'a> {
    catalog: &'a CapabilityCatalog<dyn Processor, ProcessorFamily>,
}

impl<'a> ProcessorFactory<'a> {
    pub(crate) fn new(catalog: &'a CapabilityCatalog<dyn Processor, ProcessorFamily>) -> Self {
        Self { catalog }
    }

    /// Every processor of `family`, in discovery order. Empty is not an
    /// error.
    pub fn by_family(&self, family: ProcessorFamily) -> HostResult<Vec<Arc<dyn Processor>>> {
        self.catalog.by_family(family)
    }

    /// Every processor registered under `type_name`.
    pub fn by_type_name(&self, type_name: &str) -> HostResult<Vec<Arc<dyn Processor>>> {
        self.catalog.by_type_name(type_name)
    }

    /// First processor of `family`.
    pub fn one_by_family(&self, family: ProcessorFamily) -> HostResult<Arc<dyn Processor>> {
        self.catalog.one_by_family(family)
    }

    /// First processor registered under `type_name`.
    pub fn one_by_type_name(&self, type_name: &str) -> HostResult<Arc<dyn Processor>> {
        self.catalog.one_by_type_name(type_name)
    }

    /// Every processor whose concrete type is `T`.
    pub fn by_token<T: Processor + 'static>(&self) -> HostResult<Vec<Arc<dyn Processor>>> {
        self.catalog.by_token(TypeToken::of::<T>())
    }

    /// First processor whose concrete type is `T`, as the trait object.
    pub fn one_by_token<T: Processor + 'static>(&self) -> HostResult<Arc<dyn Processor>> {
        self.catalog.one_by_token(TypeToken::of::<T>())
    }

    /// Resolve the entry registered for `T` and hand it back typed.
    pub fn one_of<T: Processor + 'static>(&self) -> HostResult<Arc<T>> {
        let token = TypeToken::of::<T>();
        let instance = self.catalog.one_by_token(token)?;
        instance
            .as_any_arc()
            .downcast::<T>()
            .map_err(|_| downcast_mismatch(CapabilityKind::Processor, token))
    }

    /// Declared descriptors in discovery order.
    pub fn descriptors(
        &self,
    ) -> impl Iterator<Item = &'a CapabilityDescriptor<ProcessorFamily>> + 'a {
        self.catalog.descriptors()
    }

    /// Number of registered processors.
    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    /// True when no processor is registered.
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::capability::RegistrationTable;
    use crate::catalog::{ComponentRegistry, ScopeKey};
    use crate::command::EffectorCommand;
    use crate::lifecycle::{Lifecycle, LifecycleStage};
    use crate::testkit::{ProbeEffector, ProbeProcessor, ProbeRobot, ProbeSensor};

    fn registry_with(table: RegistrationTable) -> ComponentRegistry {
        let registry = ComponentRegistry::new();
        registry
            .build(ScopeKey::new("test").unwrap(), table)
            .unwrap();
        registry
    }

    fn catalog(registry: &ComponentRegistry) -> Arc<crate::ScopeCatalog> {
        registry.get(&ScopeKey::new("test").unwrap()).unwrap()
    }

    #[test]
    fn empty_family_query_is_ok_and_empty() {
        let registry = registry_with(RegistrationTable::new());
        let catalog = catalog(&registry);
        let robots = catalog.robots().by_family(RobotFamily::Any).unwrap();
        assert!(robots.is_empty());
        assert!(catalog.sensors().is_empty());
    }

    #[test]
    fn one_by_misses_carry_not_found_codes() {
        let registry = registry_with(RegistrationTable::new());
        let catalog = catalog(&registry);

        let err = catalog
            .sensors()
            .one_by_family(SensorFamily::Camera)
            .unwrap_err();
        assert_eq!(err.code(), 504);
        assert!(err.is_not_found());

        let err = catalog.robots().one_by_type_name("absent").unwrap_err();
        assert_eq!(err.code(), 405);
        assert!(err.is_not_found());

        let err = catalog
            .effectors()
            .one_by_family(EffectorFamily::Planar)
            .unwrap_err();
        assert_eq!(err.code(), 204);

        let err = catalog
            .processors()
            .one_by_type_name("absent")
            .unwrap_err();
        assert_eq!(err.code(), 305);
    }

    #[test]
    fn one_of_shares_the_instance_with_erased_lookups() {
        let constructions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&constructions);
        let registry = registry_with(RegistrationTable::new().effector(
            "arm",
            EffectorFamily::Planar,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(ProbeEffector::planar())
            },
        ));
        let catalog = catalog(&registry);

        let typed = catalog.effectors().one_of::<ProbeEffector>().unwrap();
        let erased = catalog.effectors().one_by_type_name("arm").unwrap();
        assert_eq!(constructions.load(Ordering::SeqCst), 1);

        typed.handle_command(EffectorCommand::halt()).unwrap();
        assert_eq!(typed.handled().len(), 1);
        assert_eq!(erased.state(), crate::command::EffectorState::Idle);
    }

    #[test]
    fn one_of_miss_is_not_found_by_type() {
        let registry = registry_with(RegistrationTable::new().sensor(
            "front",
            SensorFamily::Depth,
            || Ok(ProbeSensor::depth()),
        ));
        let err = catalog(&registry)
            .effectors()
            .one_of::<ProbeEffector>()
            .unwrap_err();
        assert_eq!(err.code(), 205);
        assert!(err.is_not_found());
    }

    #[test]
    fn token_lookups_match_the_concrete_type() {
        let registry = registry_with(
            RegistrationTable::new()
                .sensor("front", SensorFamily::Depth, || Ok(ProbeSensor::depth()))
                .sensor("rear", SensorFamily::Depth, || Ok(ProbeSensor::depth())),
        );
        let catalog = catalog(&registry);

        let all = catalog.sensors().by_token::<ProbeSensor>().unwrap();
        assert_eq!(all.len(), 2);
        let first = catalog.sensors().one_by_token::<ProbeSensor>().unwrap();
        assert!(Arc::ptr_eq(&first, &all[0]));
    }

    #[test]
    fn robot_any_family_matches_both_directions() {
        let registry = registry_with(
            RegistrationTable::new()
                .robot("sentry", RobotFamily::Static, || Ok(ProbeRobot::new(RobotFamily::Static)))
                .robot("drifter", RobotFamily::Any, || Ok(ProbeRobot::new(RobotFamily::Any))),
        );
        let catalog = catalog(&registry);

        // Any as the query matches everything; Any as the declaration
        // matches every query.
        assert_eq!(catalog.robots().by_family(RobotFamily::Any).unwrap().len(), 2);
        let mobile = catalog.robots().by_family(RobotFamily::Mobile).unwrap();
        assert_eq!(mobile.len(), 1);
        assert_eq!(mobile[0].family(), RobotFamily::Any);
    }

    #[test]
    fn resolved_robot_walks_the_host_handshake() {
        let registry = registry_with(RegistrationTable::new().robot(
            "probe",
            RobotFamily::Mobile,
            || Ok(ProbeRobot::mobile()),
        ));
        let catalog = catalog(&registry);
        let robot = catalog.robots().one_of::<ProbeRobot>().unwrap();

        let section = serde_json::json!({ "name": "explorer" });
        let config = robot.decode_config(&section).unwrap();
        robot.configure(config).unwrap();
        assert_eq!(robot.configured_name().as_deref(), Some("explorer"));

        robot.attach_resolver(Arc::clone(&catalog));
        assert!(robot.resolver().is_some());

        robot.initialise().unwrap();
        assert_eq!(robot.stage(), LifecycleStage::Active);
    }

    #[test]
    fn catalog_resolved_sensor_announces_batches() {
        let registry = registry_with(RegistrationTable::new().sensor(
            "front",
            SensorFamily::Depth,
            || Ok(ProbeSensor::depth()),
        ));
        let catalog = catalog(&registry);
        let sensor = catalog.sensors().one_of::<ProbeSensor>().unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let tally = Arc::clone(&seen);
        sensor.data_received().subscribe(move |event| {
            tally.fetch_add(event.data().len(), Ordering::SeqCst);
        });

        let delivered = ProbeSensor::emit_sample(&sensor, b"abc");
        assert_eq!(delivered, 1);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn processor_binds_through_typed_view() {
        let registry = registry_with(RegistrationTable::new().processor(
            "relay",
            ProcessorFamily::Sensor,
            || Ok(ProbeProcessor::sensor_stream()),
        ));
        let catalog = catalog(&registry);
        let relay = catalog.processors().one_of::<ProbeProcessor>().unwrap();
        assert!(!relay.is_bound());
        Arc::clone(&relay).bind(&catalog).unwrap();
        assert!(relay.is_bound());
    }
}
