//! ---
//! rch_section: "04-environment"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Coordinate and measurement value types shared by devices."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use rch_common::error::codes;
use rch_common::{HostError, HostResult, Messages};

/// One axis of a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateComponent {
    /// East/west axis.
    X,
    /// North/south axis.
    Y,
    /// Vertical axis.
    Z,
}

impl CoordinateComponent {
    /// All components in canonical order.
    pub const ALL: [CoordinateComponent; 3] = [
        CoordinateComponent::X,
        CoordinateComponent::Y,
        CoordinateComponent::Z,
    ];

    fn label(self) -> &'static str {
        match self {
            CoordinateComponent::X => "x",
            CoordinateComponent::Y => "y",
            CoordinateComponent::Z => "z",
        }
    }
}

impl fmt::Display for CoordinateComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse travel heading used in motion directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Positive y.
    North,
    /// Positive x.
    East,
    /// Negative y.
    South,
    /// Negative x.
    West,
    /// Positive z.
    Up,
    /// Negative z.
    Down,
}

impl Direction {
    /// Unit vector of this heading as `(x, y, z)`.
    pub fn unit_vector(self) -> (f64, f64, f64) {
        match self {
            Direction::North => (0.0, 1.0, 0.0),
            Direction::East => (1.0, 0.0, 0.0),
            Direction::South => (0.0, -1.0, 0.0),
            Direction::West => (-1.0, 0.0, 0.0),
            Direction::Up => (0.0, 0.0, 1.0),
            Direction::Down => (0.0, 0.0, -1.0),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Dimension-checked coordinate store.
///
/// Built with the set of components it permits; reads and writes outside
/// that set, and arithmetic across differently-shaped coordinates, are
/// environment errors rather than silent zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    permitted: Vec<CoordinateComponent>,
    values: IndexMap<CoordinateComponent, f64>,
}

impl Coordinate {
    /// Create an empty coordinate permitting exactly `permitted`.
    pub fn with_components(permitted: impl Into<Vec<CoordinateComponent>>) -> Self {
        Self {
            permitted: permitted.into(),
            values: IndexMap::new(),
        }
    }

    /// Components this coordinate permits, in dimension order.
    pub fn permitted(&self) -> &[CoordinateComponent] {
        &self.permitted
    }

    /// Number of permitted components.
    pub fn dimension(&self) -> usize {
        self.permitted.len()
    }

    /// True when the permitted component has been written.
    pub fn is_set(&self, component: CoordinateComponent) -> bool {
        self.values.contains_key(&component)
    }

    /// Write one component.
    pub fn set(&mut self, component: CoordinateComponent, value: f64) -> HostResult<()> {
        self.ensure_permitted(component)?;
        self.values.insert(component, value);
        Ok(())
    }

    /// Read one component.
    pub fn get(&self, component: CoordinateComponent) -> HostResult<f64> {
        self.ensure_permitted(component)?;
        match self.values.get(&component) {
            Some(value) => Ok(*value),
            None => Err(HostError::environment(
                codes::COORDINATE_ABSENT,
                Messages::technical_and_user(
                    format!("component `{component}` permitted but never set"),
                    "a position value was read before it was measured",
                ),
            )),
        }
    }

    /// New coordinate translated by `other`. Both coordinates must permit
    /// the same components and have every component set.
    pub fn offset_by(&self, other: &Coordinate) -> HostResult<Coordinate> {
        self.ensure_same_shape(other)?;
        let mut out = Coordinate::with_components(self.permitted.clone());
        for component in &self.permitted {
            out.set(*component, self.get(*component)? + other.get(*component)?)?;
        }
        Ok(out)
    }

    /// Euclidean distance to `other` over the permitted components.
    pub fn distance_to(&self, other: &Coordinate) -> HostResult<f64> {
        self.ensure_same_shape(other)?;
        let mut sum = 0.0;
        for component in &self.permitted {
            let delta = self.get(*component)? - other.get(*component)?;
            sum += delta * delta;
        }
        Ok(sum.sqrt())
    }

    fn ensure_permitted(&self, component: CoordinateComponent) -> HostResult<()> {
        if self.permitted.contains(&component) {
            return Ok(());
        }
        Err(HostError::environment(
            codes::COORDINATE_NOT_PERMITTED,
            Messages::technical_and_user(
                format!(
                    "component `{component}` not permitted by this {}-dimensional coordinate",
                    self.dimension()
                ),
                "a position value was used on an axis the device does not track",
            ),
        ))
    }

    fn ensure_same_shape(&self, other: &Coordinate) -> HostResult<()> {
        if self.permitted == other.permitted {
            return Ok(());
        }
        Err(HostError::environment(
            codes::COORDINATE_DIMENSION_MISMATCH,
            Messages::technical_and_user(
                format!(
                    "coordinate shapes differ: {:?} vs {:?}",
                    self.permitted, other.permitted
                ),
                "two positions with different axes cannot be combined",
            ),
        ))
    }
}

/// Infallible 3-axis coordinate used in command payloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartesianCoordinate {
    x: f64,
    y: f64,
    z: f64,
}

impl CartesianCoordinate {
    /// The origin.
    pub const ORIGIN: CartesianCoordinate = CartesianCoordinate {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Build from the three axis values.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// East/west position.
    pub fn x(&self) -> f64 {
        self.x
    }

    /// North/south position.
    pub fn y(&self) -> f64 {
        self.y
    }

    /// Vertical position.
    pub fn z(&self) -> f64 {
        self.z
    }

    /// Straight-line distance to `other`.
    pub fn distance_to(&self, other: &CartesianCoordinate) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// New position moved `magnitude` along `direction`.
    pub fn translated(&self, direction: Direction, magnitude: f64) -> Self {
        let (ux, uy, uz) = direction.unit_vector();
        Self {
            x: self.x + ux * magnitude,
            y: self.y + uy * magnitude,
            z: self.z + uz * magnitude,
        }
    }

    /// Bridge into the dimension-checked representation.
    pub fn to_coordinate(&self) -> Coordinate {
        let mut coordinate = Coordinate::with_components(CoordinateComponent::ALL.to_vec());
        // Writes through the permitted set cannot fail.
        let _ = coordinate.set(CoordinateComponent::X, self.x);
        let _ = coordinate.set(CoordinateComponent::Y, self.y);
        let _ = coordinate.set(CoordinateComponent::Z, self.z);
        coordinate
    }
}

impl fmt::Display for CartesianCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}
