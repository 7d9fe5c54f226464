//! Constraint model: what a conditional feature declares and how each declaration evaluates.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Operating systems a platform constraint can target.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Os {
    Linux,
    MacOs,
    Windows,
    Ios,
    Android,
    FreeBsd,
}

impl Os {
    /// The OS this binary was compiled for, if it is one we model.
    #[must_use]
    pub const fn current() -> Option<Self> {
        if cfg!(target_os = "linux") {
            Some(Self::Linux)
        } else if cfg!(target_os = "macos") {
            Some(Self::MacOs)
        } else if cfg!(target_os = "windows") {
            Some(Self::Windows)
        } else if cfg!(target_os = "ios") {
            Some(Self::Ios)
        } else if cfg!(target_os = "android") {
            Some(Self::Android)
        } else if cfg!(target_os = "freebsd") {
            Some(Self::FreeBsd)
        } else {
            None
        }
    }
}

/// A `major.minor.patch` operating system version.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Rejected version string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version '{0}'")]
pub struct InvalidVersion(pub String);

impl FromStr for Version {
    type Err = InvalidVersion;

    /// Accepts `1`, `1.2` or `1.2.3`; anything after a `-` or `+` is ignored
    /// (`6.8.0-45-generic` parses as `6.8.0`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let core = s.trim().split(['-', '+']).next().unwrap_or_default();
        let mut parts = core.split('.');
        let mut next = |required: bool| -> Result<u32, InvalidVersion> {
            match parts.next() {
                Some(p) => p.parse().map_err(|_| InvalidVersion(s.to_owned())),
                None if required => Err(InvalidVersion(s.to_owned())),
                None => Ok(0),
            }
        };
        let version = Self { major: next(true)?, minor: next(false)?, patch: next(false)? };
        if parts.next().is_some() {
            return Err(InvalidVersion(s.to_owned()));
        }
        Ok(version)
    }
}

/// Version requirement attached to a platform constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "version", rename_all = "snake_case")]
pub enum VersionRequirement {
    /// Any version of the OS.
    Any,
    /// The OS version must be at least this one.
    AtLeast(Version),
    /// The feature is never available on this OS.
    Unsupported,
}

impl VersionRequirement {
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Any => true,
            Self::AtLeast(min) => version >= min,
            Self::Unsupported => false,
        }
    }
}

/// The platform the process is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub os: Os,
    pub version: Version,
}

/// Store product identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(Arc<str>);

impl ProductId {
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// How the products of a [`PurchaseRequirement`] combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchCriteria {
    /// Every product must be purchased.
    #[default]
    All,
    /// One purchased product is enough.
    Any,
}

/// Products that unlock a feature, optionally depending on further requirements
/// (e.g. an add-on that also needs the base subscription).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PurchaseRequirement {
    pub products: BTreeSet<ProductId>,
    pub criteria: MatchCriteria,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<PurchaseRequirement>,
}

impl PurchaseRequirement {
    /// A single product.
    #[must_use]
    pub fn product(id: impl Into<ProductId>) -> Self {
        Self::all_of([id.into()])
    }

    #[must_use]
    pub fn all_of(products: impl IntoIterator<Item = ProductId>) -> Self {
        Self {
            products: products.into_iter().collect(),
            criteria: MatchCriteria::All,
            dependencies: Vec::new(),
        }
    }

    #[must_use]
    pub fn any_of(products: impl IntoIterator<Item = ProductId>) -> Self {
        Self {
            products: products.into_iter().collect(),
            criteria: MatchCriteria::Any,
            dependencies: Vec::new(),
        }
    }

    /// Adds a requirement that must also be fulfilled.
    #[must_use]
    pub fn requiring(mut self, dependency: Self) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

/// Location access scope.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LocationUsage {
    WhenInUse,
    Always,
}

/// System permissions a feature can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "permission", rename_all = "snake_case")]
pub enum PermissionKind {
    Camera,
    Microphone,
    Photos,
    Contacts,
    Calendars,
    Reminders,
    Location { usage: LocationUsage },
    Motion,
    SpeechRecognition,
    Bluetooth,
    Notifications,
    MediaLibrary,
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera => f.write_str("camera"),
            Self::Microphone => f.write_str("microphone"),
            Self::Photos => f.write_str("photos"),
            Self::Contacts => f.write_str("contacts"),
            Self::Calendars => f.write_str("calendars"),
            Self::Reminders => f.write_str("reminders"),
            Self::Location { usage } => write!(f, "location({usage})"),
            Self::Motion => f.write_str("motion"),
            Self::SpeechRecognition => f.write_str("speech_recognition"),
            Self::Bluetooth => f.write_str("bluetooth"),
            Self::Notifications => f.write_str("notifications"),
            Self::MediaLibrary => f.write_str("media_library"),
        }
    }
}

/// Authorization state reported by a permission backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PermissionStatus {
    NotDetermined,
    Authorized,
    Denied,
    Restricted,
    Unsupported,
}

impl PermissionStatus {
    /// `None` while the user has not been asked yet.
    #[must_use]
    pub const fn fulfilment(self) -> Option<bool> {
        match self {
            Self::NotDetermined => None,
            Self::Authorized => Some(true),
            Self::Denied | Self::Restricted | Self::Unsupported => Some(false),
        }
    }
}

/// A single declared condition governing a feature's availability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Constraint {
    Platform { os: Os, version: VersionRequirement },
    /// Availability follows a user preference, `default` when no preference is stored.
    UserToggled { default: bool },
    /// Availability follows a flag flipped by the application at runtime.
    RuntimeEnabled,
    Purchase(PurchaseRequirement),
    Permission(PermissionKind),
}

impl Constraint {
    #[must_use]
    pub const fn kind(&self) -> ConstraintKinds {
        match self {
            Self::Platform { .. } => ConstraintKinds::PLATFORM,
            Self::UserToggled { .. } => ConstraintKinds::USER_TOGGLE,
            Self::RuntimeEnabled => ConstraintKinds::RUNTIME_TOGGLE,
            Self::Purchase(_) => ConstraintKinds::PURCHASE,
            Self::Permission(_) => ConstraintKinds::PERMISSION,
        }
    }

    #[must_use]
    pub const fn category(&self) -> ConstraintCategory {
        match self {
            Self::Platform { .. } => ConstraintCategory::Platform,
            Self::Permission(_) => ConstraintCategory::Permission,
            Self::UserToggled { .. } | Self::RuntimeEnabled | Self::Purchase(_) => {
                ConstraintCategory::Precondition
            },
        }
    }
}

/// The three typed collections constraints are grouped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ConstraintCategory {
    Platform,
    Precondition,
    Permission,
}

bitflags! {
    /// Set of constraint kinds, used to route constraints to evaluators and to
    /// decide cacheability.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ConstraintKinds: u8 {
        const PLATFORM = 1 << 0;
        const USER_TOGGLE = 1 << 1;
        const RUNTIME_TOGGLE = 1 << 2;
        const PURCHASE = 1 << 3;
        const PERMISSION = 1 << 4;

        /// Kinds whose results may never be cached.
        const UNCACHEABLE = Self::RUNTIME_TOGGLE.bits();
    }
}

/// Outcome of evaluating one constraint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConstraintStatus {
    /// Does not apply here (e.g. a platform constraint for another OS).
    NotActive,
    /// The backend has not answered yet.
    NotDetermined,
    NotSatisfied,
    Satisfied,
}

impl From<Option<bool>> for ConstraintStatus {
    fn from(fulfilled: Option<bool>) -> Self {
        match fulfilled {
            None => Self::NotDetermined,
            Some(false) => Self::NotSatisfied,
            Some(true) => Self::Satisfied,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstraintResult {
    pub constraint: Constraint,
    pub status: ConstraintStatus,
}
