//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Capability contracts, catalog discovery, and the command/event protocol."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Capability identity: families, type tokens, descriptors, and the
//! explicit registration table catalogs are built from.
//!
//! Discovery is declaration: whatever a crate wants resolvable it states
//! in a [`RegistrationTable`], and the declaration order is the discovery
//! order every query preserves.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use rch_common::HostResult;

use crate::component::{Effector, Processor, Robot, Sensor};

/// Unified runtime type identity: one lookup path for both name-driven
/// and generic type-driven resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeToken {
    id: TypeId,
    name: &'static str,
}

impl TypeToken {
    /// Token of a concrete type.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying `TypeId`.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full Rust path of the type, for diagnostics only.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Arc-preserving erasure seam behind the generic factory wrappers.
///
/// Blanket-implemented, so capability implementations get it for free.
pub trait AsAny: Send + Sync {
    /// Re-box the shared instance as `Any` for downcasting.
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Common bound for the family enums below.
pub trait Family: fmt::Debug + fmt::Display + Copy + Eq + Send + Sync + 'static {
    /// Whether an entry declared as `self` satisfies a query for `wanted`.
    fn matches(self, wanted: Self) -> bool {
        self == wanted
    }
}

/// Robot classification. `Any` is a wildcard on both sides of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotFamily {
    /// Self-propelled platform.
    Mobile,
    /// Fixed installation.
    Static,
    /// Matches every family.
    Any,
}

impl Family for RobotFamily {
    fn matches(self, wanted: Self) -> bool {
        self == RobotFamily::Any || wanted == RobotFamily::Any || self == wanted
    }
}

impl fmt::Display for RobotFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RobotFamily::Mobile => "mobile",
            RobotFamily::Static => "static",
            RobotFamily::Any => "any",
        })
    }
}

/// Sensor classification by the quantity measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorFamily {
    /// Image frames.
    Camera,
    /// Range to surroundings.
    Depth,
    /// Attitude and heading.
    Orientation,
    /// Linear acceleration.
    Acceleration,
    /// Linear velocity.
    Velocity,
    /// Travelled displacement.
    Displacement,
    /// Global position fixes.
    Gps,
}

impl Family for SensorFamily {}

impl fmt::Display for SensorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SensorFamily::Camera => "camera",
            SensorFamily::Depth => "depth",
            SensorFamily::Orientation => "orientation",
            SensorFamily::Acceleration => "acceleration",
            SensorFamily::Velocity => "velocity",
            SensorFamily::Displacement => "displacement",
            SensorFamily::Gps => "gps",
        })
    }
}

/// Effector classification by motion model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectorFamily {
    /// Moves freely in any planar direction.
    HolonomicMotion,
    /// Heading-constrained motion (differential drives and the like).
    NonHolonomicMotion,
    /// Articulated planar mechanism.
    Planar,
    /// Declared without a motion model.
    Unknown,
}

impl Family for EffectorFamily {}

impl fmt::Display for EffectorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EffectorFamily::HolonomicMotion => "holonomic_motion",
            EffectorFamily::NonHolonomicMotion => "non_holonomic_motion",
            EffectorFamily::Planar => "planar",
            EffectorFamily::Unknown => "unknown",
        })
    }
}

/// Processor classification by the stream it transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorFamily {
    /// Rewrites effector commands.
    Effector,
    /// Rewrites sensor streams.
    Sensor,
    /// Arbitrates between behaviour layers.
    Subsumption,
}

impl Family for ProcessorFamily {}

impl fmt::Display for ProcessorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProcessorFamily::Effector => "effector",
            ProcessorFamily::Sensor => "sensor",
            ProcessorFamily::Subsumption => "subsumption",
        })
    }
}

/// What one registration declares about an implementation.
#[derive(Debug, Clone)]
pub struct CapabilityDescriptor<F: Family> {
    family: F,
    type_name: String,
    token: TypeToken,
}

impl<F: Family> CapabilityDescriptor<F> {
    pub(crate) fn new(family: F, type_name: impl Into<String>, token: TypeToken) -> Self {
        Self {
            family,
            type_name: type_name.into(),
            token,
        }
    }

    /// Declared family.
    pub fn family(&self) -> F {
        self.family
    }

    /// Stable registration identifier, the name bundles refer to.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Runtime identity of the concrete type.
    pub fn token(&self) -> TypeToken {
        self.token
    }
}

impl<F: Family> fmt::Display for CapabilityDescriptor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` ({})", self.type_name, self.family)
    }
}

/// One declared implementation: its descriptor plus the deferred
/// constructor the catalog runs on first resolution.
pub struct Registration<C: ?Sized, F: Family> {
    pub(crate) descriptor: CapabilityDescriptor<F>,
    pub(crate) construct: Box<dyn Fn() -> HostResult<Arc<C>> + Send + Sync>,
}

impl<C: ?Sized, F: Family> Registration<C, F> {
    /// Descriptor of this registration.
    pub fn descriptor(&self) -> &CapabilityDescriptor<F> {
        &self.descriptor
    }
}

impl<C: ?Sized, F: Family> fmt::Debug for Registration<C, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Explicit registration table for one catalog scope.
///
/// Declaration order is preserved verbatim into the catalog; it is the
/// discovery order that family queries and first-match lookups honour.
#[derive(Debug, Default)]
pub struct RegistrationTable {
    pub(crate) robots: Vec<Registration<dyn Robot, RobotFamily>>,
    pub(crate) sensors: Vec<Registration<dyn Sensor, SensorFamily>>,
    pub(crate) effectors: Vec<Registration<dyn Effector, EffectorFamily>>,
    pub(crate) processors: Vec<Registration<dyn Processor, ProcessorFamily>>,
}

impl RegistrationTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a robot implementation under a stable `type_name`.
    ///
    /// Constructors hand back `Arc<T>` so implementations needing a weak
    /// self-reference (event sources) can build with `Arc::new_cyclic`.
    pub fn robot<T, B>(mut self, type_name: impl Into<String>, family: RobotFamily, build: B) -> Self
    where
        T: Robot + 'static,
        B: Fn() -> HostResult<Arc<T>> + Send + Sync + 'static,
    {
        self.robots.push(Registration {
            descriptor: CapabilityDescriptor::new(family, type_name, TypeToken::of::<T>()),
            construct: Box::new(move || build().map(|built| built as Arc<dyn Robot>)),
        });
        self
    }

    /// Declare a sensor implementation under a stable `type_name`.
    pub fn sensor<T, B>(
        mut self,
        type_name: impl Into<String>,
        family: SensorFamily,
        build: B,
    ) -> Self
    where
        T: Sensor + 'static,
        B: Fn() -> HostResult<Arc<T>> + Send + Sync + 'static,
    {
        self.sensors.push(Registration {
            descriptor: CapabilityDescriptor::new(family, type_name, TypeToken::of::<T>()),
            construct: Box::new(move || build().map(|built| built as Arc<dyn Sensor>)),
        });
        self
    }

    /// Declare an effector implementation under a stable `type_name`.
    pub fn effector<T, B>(
        mut self,
        type_name: impl Into<String>,
        family: EffectorFamily,
        build: B,
    ) -> Self
    where
        T: Effector + 'static,
        B: Fn() -> HostResult<Arc<T>> + Send + Sync + 'static,
    {
        self.effectors.push(Registration {
            descriptor: CapabilityDescriptor::new(family, type_name, TypeToken::of::<T>()),
            construct: Box::new(move || build().map(|built| built as Arc<dyn Effector>)),
        });
        self
    }

    /// Declare a processor implementation under a stable `type_name`.
    pub fn processor<T, B>(
        mut self,
        type_name: impl Into<String>,
        family: ProcessorFamily,
        build: B,
    ) -> Self
    where
        T: Processor + 'static,
        B: Fn() -> HostResult<Arc<T>> + Send + Sync + 'static,
    {
        self.processors.push(Registration {
            descriptor: CapabilityDescriptor::new(family, type_name, TypeToken::of::<T>()),
            construct: Box::new(move || build().map(|built| built as Arc<dyn Processor>)),
        });
        self
    }

    /// Append every registration of `other`, preserving both declaration
    /// orders (self first). Lets device crates contribute partial tables.
    pub fn merge(mut self, other: RegistrationTable) -> Self {
        self.robots.extend(other.robots);
        self.sensors.extend(other.sensors);
        self.effectors.extend(other.effectors);
        self.processors.extend(other.processors);
        self
    }

    /// Total number of registrations across all kinds.
    pub fn len(&self) -> usize {
        self.robots.len() + self.sensors.len() + self.effectors.len() + self.processors.len()
    }

    /// True when nothing has been declared.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_any_is_a_wildcard_in_both_directions() {
        assert!(RobotFamily::Any.matches(RobotFamily::Mobile));
        assert!(RobotFamily::Mobile.matches(RobotFamily::Any));
        assert!(RobotFamily::Mobile.matches(RobotFamily::Mobile));
        assert!(!RobotFamily::Mobile.matches(RobotFamily::Static));
    }

    #[test]
    fn plain_families_match_by_equality_only() {
        assert!(SensorFamily::Depth.matches(SensorFamily::Depth));
        assert!(!SensorFamily::Depth.matches(SensorFamily::Camera));
        assert!(EffectorFamily::Planar.matches(EffectorFamily::Planar));
        assert!(!EffectorFamily::Unknown.matches(EffectorFamily::Planar));
    }

    #[test]
    fn tokens_compare_by_type_identity() {
        assert_eq!(TypeToken::of::<String>(), TypeToken::of::<String>());
        assert_ne!(TypeToken::of::<String>(), TypeToken::of::<u32>());
        assert!(TypeToken::of::<String>().name().contains("String"));
    }
}
