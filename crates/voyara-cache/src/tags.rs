//! Invalidation tags.
//!
//! Tags are a closed set tied to [`Resource`], so the tag attached when an
//! entry is written and the tag used to invalidate it come from the same
//! type. `Custom` covers anything outside that set.

use crate::keys::Resource;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A label attached to cache entries for bulk invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CacheTag {
    Destinations,
    Experiences,
    Packages,
    Bookings,
    Users,
    Media,
    Settings,
    /// Entries shown on the landing pages across resources.
    Featured,
    /// Entries derived from one specific record, e.g. `destinations:42`.
    Entity { resource: Resource, id: String },
    /// Free-form tag.
    Custom(String),
}

impl CacheTag {
    /// The tag covering every entry of a resource.
    #[must_use]
    pub const fn for_resource(resource: Resource) -> Self {
        match resource {
            Resource::Destinations => Self::Destinations,
            Resource::Experiences => Self::Experiences,
            Resource::Packages => Self::Packages,
            Resource::Bookings => Self::Bookings,
            Resource::Users => Self::Users,
            Resource::Media => Self::Media,
            Resource::Settings => Self::Settings,
        }
    }

    /// The tag covering entries derived from one record.
    #[must_use]
    pub fn entity(resource: Resource, id: impl fmt::Display) -> Self {
        Self::Entity {
            resource,
            id: id.to_string(),
        }
    }

    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// The tag's wire name, used in the tag index key.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Featured => "featured".to_string(),
            Self::Entity { resource, id } => format!("{}:{}", resource, id),
            Self::Custom(name) => name.clone(),
            resource_tag => resource_tag
                .resource()
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
        }
    }

    /// The resource this tag belongs to, if any.
    #[must_use]
    pub fn resource(&self) -> Option<Resource> {
        match self {
            Self::Destinations => Some(Resource::Destinations),
            Self::Experiences => Some(Resource::Experiences),
            Self::Packages => Some(Resource::Packages),
            Self::Bookings => Some(Resource::Bookings),
            Self::Users => Some(Resource::Users),
            Self::Media => Some(Resource::Media),
            Self::Settings => Some(Resource::Settings),
            Self::Entity { resource, .. } => Some(*resource),
            Self::Featured | Self::Custom(_) => None,
        }
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<&str> for CacheTag {
    fn from(name: &str) -> Self {
        if name == "featured" {
            return Self::Featured;
        }
        if let Some(resource) = Resource::from_segment(name) {
            return Self::for_resource(resource);
        }
        if let Some((segment, id)) = name.split_once(':') {
            if let Some(resource) = Resource::from_segment(segment) {
                if !id.is_empty() {
                    return Self::entity(resource, id);
                }
            }
        }
        Self::Custom(name.to_string())
    }
}

impl From<String> for CacheTag {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<CacheTag> for String {
    fn from(tag: CacheTag) -> Self {
        tag.name()
    }
}

impl From<Resource> for CacheTag {
    fn from(resource: Resource) -> Self {
        Self::for_resource(resource)
    }
}
