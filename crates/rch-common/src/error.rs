//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Shared primitives and utilities for the host runtime."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Unified host error model.
//!
//! Every failure in the workspace is one [`HostError`]: a kind tag, a small
//! stable integer code identifying the failure point, the four-part
//! [`Messages`] rendering, a [`Severity`], and an optional source chain.
//! Context is captured at construction and the error is logged through
//! `tracing` the moment it is built, so a failure is recorded even when a
//! caller swallows the `Result`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Messages, Severity};

/// Workspace-wide result alias.
pub type HostResult<T> = std::result::Result<T, HostError>;

/// The four capability kinds a catalog scope manages.
///
/// Each kind owns a hundred-block of factory error codes; see
/// [`CapabilityKind::code_base`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Robot,
    Sensor,
    Effector,
    Processor,
}

impl CapabilityKind {
    /// Base of the factory code block for this kind. Offsets within the
    /// block are listed in [`codes`].
    pub const fn code_base(self) -> u16 {
        match self {
            CapabilityKind::Effector => 200,
            CapabilityKind::Processor => 300,
            CapabilityKind::Robot => 400,
            CapabilityKind::Sensor => 500,
        }
    }

    /// Lowercase label used in messages and log fields.
    pub const fn label(self) -> &'static str {
        match self {
            CapabilityKind::Robot => "robot",
            CapabilityKind::Sensor => "sensor",
            CapabilityKind::Effector => "effector",
            CapabilityKind::Processor => "processor",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tag classifying where in the host a failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bundle or section handling failed.
    Configuration,
    /// Registration table or catalog build rejected its input.
    Discovery,
    /// A lifecycle transition was attempted out of order.
    Lifecycle,
    /// A factory lookup or lazy construction failed.
    Factory(CapabilityKind),
    /// A single-result lookup matched nothing. Never used for a lookup
    /// whose candidate existed but failed to construct.
    NotFound(CapabilityKind),
    /// Bootstrap stage failure in the host orchestrator.
    Startup,
    /// Robot domain failure.
    Robot,
    /// Sensor domain failure.
    Sensor,
    /// Effector domain failure.
    Effector,
    /// Coordinate or measurement domain failure.
    Environment,
    /// Logging bring-up failure.
    Logging,
}

impl ErrorKind {
    /// True for the NotFound tag of any capability kind.
    pub fn is_not_found(self) -> bool {
        matches!(self, ErrorKind::NotFound(_))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Configuration => f.write_str("configuration"),
            ErrorKind::Discovery => f.write_str("discovery"),
            ErrorKind::Lifecycle => f.write_str("lifecycle"),
            ErrorKind::Factory(kind) => write!(f, "factory({kind})"),
            ErrorKind::NotFound(kind) => write!(f, "not_found({kind})"),
            ErrorKind::Startup => f.write_str("startup"),
            ErrorKind::Robot => f.write_str("robot"),
            ErrorKind::Sensor => f.write_str("sensor"),
            ErrorKind::Effector => f.write_str("effector"),
            ErrorKind::Environment => f.write_str("environment"),
            ErrorKind::Logging => f.write_str("logging"),
        }
    }
}

/// Stable error code registry.
///
/// Codes identify failure points and survive releases; new failure points
/// take new codes rather than reusing retired ones. Factory codes are
/// `CapabilityKind::code_base() + offset` with the offsets below, so e.g.
/// a robot single-by-family miss is `404` and a sensor construction
/// failure is `503`.
pub mod codes {
    /// Robot bootstrap failed (wraps the stage error).
    pub const ROBOT_START_FAILED: u16 = 100;
    /// The configured robot type is not available in the catalog.
    pub const ROBOT_TYPE_UNAVAILABLE: u16 = 102;
    /// Component handed a configuration payload of a foreign type.
    pub const COMPONENT_CONFIG_TYPE: u16 = 103;
    /// Bundle file missing or unparseable.
    pub const BUNDLE_LOAD_FAILED: u16 = 110;
    /// Named section absent from the active bundle.
    pub const SECTION_MISSING: u16 = 150;
    /// Section present but not decodable as the requested type.
    pub const SECTION_MALFORMED: u16 = 151;
    /// Host handed a configuration payload of a foreign type.
    pub const HOST_CONFIG_TYPE: u16 = 155;
    /// Output handed a configuration payload of a foreign type.
    pub const OUTPUT_CONFIG_TYPE: u16 = 156;
    /// Logging handed a configuration payload of a foreign type.
    pub const LOG_CONFIG_TYPE: u16 = 157;
    /// Logging pipeline could not be installed.
    pub const LOG_INIT_FAILED: u16 = 158;
    /// `initialise` called before any successful `configure`.
    pub const INITIALISE_BEFORE_CONFIGURE: u16 = 160;
    /// `initialise` called again on an active component.
    pub const INITIALISE_REPEATED: u16 = 161;
    /// Any lifecycle call on a deactivated component.
    pub const USED_AFTER_DEACTIVATE: u16 = 162;
    /// `configure` called while the component is active.
    pub const CONFIGURE_WHILE_ACTIVE: u16 = 163;
    /// A running-only operation was invoked on a non-active component.
    pub const OPERATION_REQUIRES_ACTIVE: u16 = 164;
    /// Two registrations in one scope share a kind and type name.
    pub const DUPLICATE_REGISTRATION: u16 = 600;
    /// Scope key is empty.
    pub const SCOPE_KEY_EMPTY: u16 = 601;
    /// Effector command exceeded a configured limit.
    pub const EFFECTOR_LIMIT_EXCEEDED: u16 = 700;
    /// Effector is stuck and refused a motion command.
    pub const EFFECTOR_STALLED: u16 = 701;
    /// Robot could not wire a required sub-component.
    pub const ROBOT_SUBCOMPONENT: u16 = 710;
    /// Coordinate written through a component it does not permit.
    pub const COORDINATE_NOT_PERMITTED: u16 = 901;
    /// Coordinate read through a permitted but unset component.
    pub const COORDINATE_ABSENT: u16 = 902;
    /// Arithmetic across coordinates of different dimensionality.
    pub const COORDINATE_DIMENSION_MISMATCH: u16 = 903;

    /// Factory offset: multi-result family query failed.
    pub const FACTORY_FAMILY_QUERY: u16 = 1;
    /// Factory offset: multi-result type query failed.
    pub const FACTORY_TYPE_QUERY: u16 = 2;
    /// Factory offset: lazy construction of a matched entry failed.
    pub const FACTORY_CONSTRUCTION: u16 = 3;
    /// Factory offset: single-result family query matched nothing.
    pub const FACTORY_FAMILY_NOT_FOUND: u16 = 4;
    /// Factory offset: single-result type query matched nothing.
    pub const FACTORY_TYPE_NOT_FOUND: u16 = 5;
}

/// The one error type of the host.
///
/// Built through the constructors below, never piecewise; construction
/// emits the failure through `tracing` at the level its severity maps to.
#[derive(Debug, thiserror::Error)]
#[error("{}", .messages.full)]
pub struct HostError {
    kind: ErrorKind,
    code: u16,
    severity: Severity,
    messages: Messages,
    #[source]
    source: Option<anyhow::Error>,
}

impl HostError {
    /// Root constructor: every other constructor funnels here.
    pub fn detailed(
        kind: ErrorKind,
        code: u16,
        messages: Messages,
        severity: Severity,
        source: Option<anyhow::Error>,
    ) -> Self {
        let err = Self {
            kind,
            code,
            severity,
            messages,
            source,
        };
        err.emit();
        err
    }

    /// Error-severity failure with no source chain.
    pub fn new(kind: ErrorKind, code: u16, messages: Messages) -> Self {
        Self::detailed(kind, code, messages, Severity::Error, None)
    }

    /// Error-severity failure wrapping an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        code: u16,
        messages: Messages,
        source: anyhow::Error,
    ) -> Self {
        Self::detailed(kind, code, messages, Severity::Error, Some(source))
    }

    /// Configuration failure (bundle, section, or config-type mismatch).
    pub fn configuration(code: u16, messages: Messages) -> Self {
        Self::new(ErrorKind::Configuration, code, messages)
    }

    /// Configuration failure with an underlying cause.
    pub fn configuration_with(code: u16, messages: Messages, source: anyhow::Error) -> Self {
        Self::with_source(ErrorKind::Configuration, code, messages, source)
    }

    /// Registration or catalog-build rejection.
    pub fn discovery(code: u16, messages: Messages) -> Self {
        Self::new(ErrorKind::Discovery, code, messages)
    }

    /// Out-of-order lifecycle transition.
    pub fn lifecycle(code: u16, messages: Messages) -> Self {
        Self::new(ErrorKind::Lifecycle, code, messages)
    }

    /// Factory failure for one capability kind; `offset` is one of the
    /// factory offsets in [`codes`] and is added to the kind's code base.
    pub fn factory(
        kind: CapabilityKind,
        offset: u16,
        messages: Messages,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::detailed(
            ErrorKind::Factory(kind),
            kind.code_base() + offset,
            messages,
            Severity::Error,
            source,
        )
    }

    /// Single-result lookup miss for one capability kind.
    pub fn not_found(kind: CapabilityKind, offset: u16, messages: Messages) -> Self {
        Self::new(ErrorKind::NotFound(kind), kind.code_base() + offset, messages)
    }

    /// Bootstrap stage failure; logged at critical severity.
    pub fn startup(code: u16, messages: Messages, source: Option<anyhow::Error>) -> Self {
        Self::detailed(ErrorKind::Startup, code, messages, Severity::Critical, source)
    }

    /// Coordinate/measurement domain failure.
    pub fn environment(code: u16, messages: Messages) -> Self {
        Self::new(ErrorKind::Environment, code, messages)
    }

    /// Where the failure originated.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Stable failure-point code.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Severity the failure was recorded at.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// The four-part message rendering.
    pub fn messages(&self) -> &Messages {
        &self.messages
    }

    /// True when this is a single-result lookup miss (as opposed to a
    /// matched entry that failed to construct).
    pub fn is_not_found(&self) -> bool {
        self.kind.is_not_found()
    }

    fn emit(&self) {
        let cause = self
            .source
            .as_ref()
            .map(|err| format!("{err:#}"))
            .unwrap_or_default();
        match self.severity.tracing_level() {
            tracing::Level::ERROR => tracing::error!(
                code = self.code,
                kind = %self.kind,
                severity = %self.severity,
                %cause,
                "{}",
                self.messages.full
            ),
            tracing::Level::WARN => tracing::warn!(
                code = self.code,
                kind = %self.kind,
                severity = %self.severity,
                %cause,
                "{}",
                self.messages.full
            ),
            tracing::Level::INFO => tracing::info!(
                code = self.code,
                kind = %self.kind,
                severity = %self.severity,
                %cause,
                "{}",
                self.messages.full
            ),
            tracing::Level::DEBUG => tracing::debug!(
                code = self.code,
                kind = %self.kind,
                severity = %self.severity,
                %cause,
                "{}",
                self.messages.full
            ),
            tracing::Level::TRACE => tracing::trace!(
                code = self.code,
                kind = %self.kind,
                severity = %self.severity,
                %cause,
                "{}",
                self.messages.full
            ),
        }
    }
}
