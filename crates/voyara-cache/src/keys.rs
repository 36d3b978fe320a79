//! Cache key builders for consistent key naming.
//!
//! Keys have the shape `<resource>:<qualifier>[:<params>]`. The parameter
//! tail is the canonical JSON form of the parameters, so two filters that
//! differ only in field order produce the same key. The namespace prefix is
//! not part of these keys; the cache facade adds it.

use crate::error::CacheResult;
use crate::tags::CacheTag;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Parameter tails longer than this are replaced by their SHA-256 digest.
pub const MAX_TAIL_LEN: usize = 128;

/// Resource categories that own cached entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Destinations,
    Experiences,
    Packages,
    Bookings,
    Users,
    Media,
    Settings,
}

impl Resource {
    /// Every resource category.
    pub const ALL: [Resource; 7] = [
        Self::Destinations,
        Self::Experiences,
        Self::Packages,
        Self::Bookings,
        Self::Users,
        Self::Media,
        Self::Settings,
    ];

    /// The key segment for this resource.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Destinations => "destinations",
            Self::Experiences => "experiences",
            Self::Packages => "packages",
            Self::Bookings => "bookings",
            Self::Users => "users",
            Self::Media => "media",
            Self::Settings => "settings",
        }
    }

    /// Parses a key segment back into a resource.
    #[must_use]
    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == segment)
    }

    /// The key helpers for this resource.
    #[must_use]
    pub const fn keys(self) -> ResourceKeys {
        ResourceKeys { resource: self }
    }

    /// The tag that marks every entry of this resource.
    #[must_use]
    pub const fn tag(self) -> CacheTag {
        CacheTag::for_resource(self)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction for list keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Filter, sort and pagination parameters folded into a key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyParams {
    values: Map<String, Value>,
}

impl KeyParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds parameters from any serializable filter object.
    ///
    /// The value must serialize to a JSON object or to `null`.
    pub fn from_serializable<T: Serialize + ?Sized>(filter: &T) -> CacheResult<Self> {
        match serde_json::to_value(filter)? {
            Value::Object(values) => Ok(Self { values }),
            Value::Null => Ok(Self::default()),
            other => Err(crate::CacheError::SerializationFailure(format!(
                "key parameters must be an object, got {}",
                other
            ))),
        }
    }

    /// Adds a named parameter. `null` values are dropped so an absent
    /// optional filter and an explicit `None` share a key.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.values.insert(name.into(), value);
        }
        self
    }

    #[must_use]
    pub fn sort(self, field: &str, order: SortOrder) -> Self {
        self.with("sort", format!("{}:{}", field, order.as_str()))
    }

    #[must_use]
    pub fn limit(self, limit: u64) -> Self {
        self.with("limit", limit)
    }

    #[must_use]
    pub fn page(self, page: u64, size: u64) -> Self {
        self.with("page", page).with("size", size)
    }

    /// Adds a free-text search term, trimmed and lowercased.
    #[must_use]
    pub fn term(self, term: &str) -> Self {
        self.with("q", normalize(term))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Canonical JSON for these parameters.
    #[must_use]
    pub fn canonical(&self) -> String {
        serde_json_canonicalizer::to_vec(&self.values)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_else(|| Value::Object(self.values.clone()).to_string())
    }
}

/// Builds a key from a resource, a qualifier and parameters.
#[must_use]
pub fn build_key(resource: Resource, qualifier: &str, params: &KeyParams) -> String {
    if params.is_empty() {
        return format!("{}:{}", resource, qualifier);
    }
    format!("{}:{}:{}", resource, qualifier, compact_tail(params.canonical()))
}

fn compact_tail(tail: String) -> String {
    if tail.len() <= MAX_TAIL_LEN {
        return tail;
    }
    let digest = Sha256::digest(tail.as_bytes());
    format!("h:{}", hex::encode(digest))
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Key helpers for one resource category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceKeys {
    resource: Resource,
}

impl ResourceKeys {
    #[must_use]
    pub const fn resource(&self) -> Resource {
        self.resource
    }

    /// Key for the unfiltered collection.
    #[must_use]
    pub fn all(&self) -> String {
        build_key(self.resource, "all", &KeyParams::default())
    }

    /// Key for a filtered, sorted or paginated listing.
    #[must_use]
    pub fn list(&self, params: &KeyParams) -> String {
        build_key(self.resource, "list", params)
    }

    #[must_use]
    pub fn by_id(&self, id: impl fmt::Display) -> String {
        format!("{}:id:{}", self.resource, id)
    }

    #[must_use]
    pub fn by_slug(&self, slug: &str) -> String {
        format!("{}:slug:{}", self.resource, normalize(slug))
    }

    #[must_use]
    pub fn featured(&self, limit: Option<u64>) -> String {
        let params = match limit {
            Some(limit) => KeyParams::new().limit(limit),
            None => KeyParams::new(),
        };
        build_key(self.resource, "featured", &params)
    }

    #[must_use]
    pub fn search(&self, term: &str, params: &KeyParams) -> String {
        build_key(self.resource, "search", &params.clone().term(term))
    }

    /// Key for any other operation on this resource.
    #[must_use]
    pub fn custom(&self, qualifier: &str, params: &KeyParams) -> String {
        build_key(self.resource, qualifier, params)
    }
}

#[must_use]
pub const fn destinations() -> ResourceKeys {
    Resource::Destinations.keys()
}

#[must_use]
pub const fn experiences() -> ResourceKeys {
    Resource::Experiences.keys()
}

#[must_use]
pub const fn packages() -> ResourceKeys {
    Resource::Packages.keys()
}

#[must_use]
pub const fn bookings() -> ResourceKeys {
    Resource::Bookings.keys()
}

#[must_use]
pub const fn users() -> ResourceKeys {
    Resource::Users.keys()
}

#[must_use]
pub const fn media() -> ResourceKeys {
    Resource::Media.keys()
}

#[must_use]
pub const fn settings() -> ResourceKeys {
    Resource::Settings.keys()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[test]
    fn test_by_id_key() {
        assert_eq!(destinations().by_id(42), "destinations:id:42");
        assert_eq!(packages().by_id("pkg-7"), "packages:id:pkg-7");
    }

    #[test]
    fn test_slug_is_normalized() {
        assert_eq!(experiences().by_slug("  Lagos-Food-Tour "), "experiences:slug:lagos-food-tour");
    }

    #[test]
    fn test_all_and_featured_keys() {
        assert_eq!(destinations().all(), "destinations:all");
        assert_eq!(destinations().featured(None), "destinations:featured");
        assert_eq!(destinations().featured(Some(6)), r#"destinations:featured:{"limit":6}"#);
    }

    #[test]
    fn test_param_order_does_not_change_key() {
        let a = KeyParams::new().with("country", "NG").with("region", "west").limit(10);
        let b = KeyParams::new().limit(10).with("region", "west").with("country", "NG");
        assert_eq!(destinations().list(&a), destinations().list(&b));
    }

    #[test]
    fn test_different_params_different_keys() {
        let a = KeyParams::new().with("country", "NG");
        let b = KeyParams::new().with("country", "GH");
        assert_ne!(destinations().list(&a), destinations().list(&b));
        assert_ne!(destinations().list(&a), packages().list(&a));
    }

    #[test]
    fn test_search_term_normalized() {
        let params = KeyParams::new().page(1, 20);
        assert_eq!(
            packages().search("  Zanzibar ", &params),
            packages().search("zanzibar", &params)
        );
        assert!(packages().search("zanzibar", &params).starts_with("packages:search:"));
    }

    #[test]
    fn test_null_params_dropped() {
        let with_none = KeyParams::new().with("country", Option::<String>::None).limit(5);
        let without = KeyParams::new().limit(5);
        assert_eq!(with_none, without);
    }

    #[test]
    fn test_from_serializable_is_order_independent() {
        #[derive(Serialize)]
        struct Filter {
            min_price: u32,
            country: &'static str,
        }

        #[derive(Serialize)]
        struct SameFilterOtherOrder {
            country: &'static str,
            min_price: u32,
        }

        let a = KeyParams::from_serializable(&Filter { min_price: 100, country: "KE" }).unwrap();
        let b = KeyParams::from_serializable(&SameFilterOtherOrder { country: "KE", min_price: 100 }).unwrap();
        assert_eq!(a.canonical(), b.canonical());
        assert_eq!(a.canonical(), r#"{"country":"KE","min_price":100}"#);
    }

    #[test]
    fn test_canonical_sorts_nested_members() {
        let params = KeyParams::new()
            .with("sort", "price")
            .with("filter", serde_json::json!({"tier": "gold", "country": "KE"}))
            .limit(10);
        assert_eq!(
            params.canonical(),
            r#"{"filter":{"country":"KE","tier":"gold"},"limit":10,"sort":"price"}"#
        );
    }

    #[test]
    fn test_from_serializable_rejects_scalars() {
        assert!(KeyParams::from_serializable(&5).is_err());
        assert!(KeyParams::from_serializable(&Option::<u8>::None).unwrap().is_empty());
    }

    #[test]
    fn test_long_tail_is_hashed() {
        let long = "x".repeat(MAX_TAIL_LEN * 2);
        let key = destinations().list(&KeyParams::new().with("q", long.clone()));
        let tail = key.strip_prefix("destinations:list:h:").unwrap();
        assert_eq!(tail.len(), 64);

        let other = destinations().list(&KeyParams::new().with("q", format!("{}y", long)));
        assert_ne!(key, other);
    }

    #[test]
    fn test_resource_round_trip() {
        for resource in Resource::ALL {
            assert_eq!(Resource::from_segment(resource.as_str()), Some(resource));
        }
        assert_eq!(Resource::from_segment("tags"), None);
    }
}
