//! Attribute-backed entities.
//!
//! An entity wraps the attribute map of a response body. Fields are declared
//! once per type with [`entity!`](crate::entity), which generates a memoised
//! accessor and a presence predicate for every field plus a static dispatch
//! table used by [`Entity::get`].
//!
//! Accessors never fail on missing keys: scalars resolve to `None`,
//! predicates to `false` and nested entities to the shared null instance of
//! their type. The memo cache is never invalidated, so values read before an
//! [`Entity::update`] or [`Entity::delete`] stay cached.

use log::debug;
use serde_json::{Map, Value};
use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

use crate::http::{Response, Transport};

/// Raw attribute map of an entity.
pub type Attributes = Map<String, Value>;

/// Construction options.
#[derive(Clone, Default)]
pub struct Options {
    /// Transport the entity was fetched with.
    pub client: Option<Arc<dyn Transport>>,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("client", &self.client.as_ref().map(|c| c.api_url().to_string()))
            .finish()
    }
}

/// Error raised by a resolved field accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeError {
    /// A URI field holds a value that is neither an absolute URL nor a
    /// relative reference.
    InvalidUri {
        field: &'static str,
        value: String,
        source: url::ParseError,
    },
}

impl fmt::Display for AttributeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeError::InvalidUri {
                field,
                value,
                source,
            } => write!(f, "Invalid URI in {}: {:?} ({})", field, value, source),
        }
    }
}

impl std::error::Error for AttributeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttributeError::InvalidUri { source, .. } => Some(source),
        }
    }
}

/// Value of a URI field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Uri {
    /// An absolute URL.
    Absolute(Url),
    /// A relative reference, kept as written.
    Relative(String),
}

impl Uri {
    /// Parses an absolute URL or an RFC 3986 relative reference.
    pub fn parse(text: &str) -> Result<Self, url::ParseError> {
        match Url::parse(text) {
            Ok(url) => Ok(Uri::Absolute(url)),
            Err(url::ParseError::RelativeUrlWithoutBase) if is_relative_reference(text) => {
                Ok(Uri::Relative(text.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// The URI as written, or serialized if absolute.
    pub fn as_str(&self) -> &str {
        match self {
            Uri::Absolute(url) => url.as_str(),
            Uri::Relative(reference) => reference,
        }
    }

    /// The parsed URL, if the URI is absolute.
    pub fn as_url(&self) -> Option<&Url> {
        match self {
            Uri::Absolute(url) => Some(url),
            Uri::Relative(_) => None,
        }
    }

    /// Whether the URI is a relative reference.
    pub fn is_relative(&self) -> bool {
        matches!(self, Uri::Relative(_))
    }

    /// Resolves the URI against `base`.
    pub fn resolve(&self, base: &Url) -> Result<Url, url::ParseError> {
        match self {
            Uri::Absolute(url) => Ok(url.clone()),
            Uri::Relative(reference) => base.join(reference),
        }
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks `text` against the RFC 3986 `relative-ref` grammar: allowed
/// characters only, well-formed percent escapes, and no `:` in the first
/// path segment.
fn is_relative_reference(text: &str) -> bool {
    let first_segment_end = text.find(['/', '?', '#']).unwrap_or(text.len());
    if text[..first_segment_end].contains(':') {
        return false;
    }

    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            match bytes.get(i + 1..i + 3) {
                Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => i += 3,
                _ => return false,
            }
            continue;
        }
        if !(b.is_ascii_alphanumeric() || b"-._~!$&'()*+,;=:@/?#[]".contains(&b)) {
            return false;
        }
        i += 1;
    }
    true
}

/// One entry of an entity's dispatch table.
pub struct Field<E> {
    pub name: &'static str,
    pub read: fn(&E) -> Result<Option<Value>, AttributeError>,
}

type Slot = Arc<dyn Any + Send + Sync>;

/// Attribute store and memo cache shared by all entities.
pub struct Base {
    attrs: Attributes,
    client: Option<Arc<dyn Transport>>,
    memo: Mutex<HashMap<&'static str, Slot>>,
}

impl Base {
    /// Stores `attrs` (empty when `None`) and the client from `options`.
    pub fn new(attrs: Option<Attributes>, options: Options) -> Self {
        Self {
            attrs: attrs.unwrap_or_default(),
            client: options.client,
            memo: Mutex::default(),
        }
    }

    /// Raw attribute map.
    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    /// Same as [`Base::attrs`].
    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    /// Same as [`Base::attrs`].
    pub fn as_map(&self) -> &Attributes {
        &self.attrs
    }

    /// Transport captured at construction, if any.
    pub fn client(&self) -> Option<&Arc<dyn Transport>> {
        self.client.as_ref()
    }

    /// Merges `attrs` into the attribute map. Cached values are kept.
    pub fn update(&mut self, attrs: Attributes) {
        self.attrs.extend(attrs);
    }

    /// Removes `key` from the attribute map. Cached values are kept.
    pub fn delete(&mut self, key: &str) -> Option<Value> {
        self.attrs.remove(key)
    }

    /// Returns the cached value for `key`, computing and caching it first if
    /// the slot is empty.
    ///
    /// The slot is filled by the first writer; a concurrent computation for
    /// the same key returns the published value.
    pub fn memoize<T, F>(&self, key: &'static str, compute: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        if let Some(value) = self.cached(key) {
            return value;
        }
        let value = compute();
        self.publish(key, value)
    }

    /// Like [`Base::memoize`], but errors are returned without filling the
    /// slot.
    pub fn try_memoize<T, E, F>(&self, key: &'static str, compute: F) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.cached(key) {
            return Ok(value);
        }
        let value = compute()?;
        Ok(self.publish(key, value))
    }

    fn cached<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        let memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
        memo.get(key)
            .and_then(|slot| slot.downcast_ref::<T>())
            .cloned()
    }

    fn publish<T>(&self, key: &'static str, value: T) -> T
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = memo
            .entry(key)
            .or_insert_with(|| Arc::new(value.clone()) as Slot);
        slot.downcast_ref::<T>().cloned().unwrap_or(value)
    }

    /// Value of a scalar field. JSON `null` reads as absent.
    pub fn scalar(&self, key: &str) -> Option<Value> {
        self.attrs.get(key).filter(|v| !v.is_null()).cloned()
    }

    /// Whether `key` holds a truthy value (anything but `null` or `false`).
    pub fn is_present(&self, key: &str) -> bool {
        self.attrs.get(key).is_some_and(is_truthy)
    }

    /// Builds the nested entity stored under `key`.
    ///
    /// With a `context_key`, the nested attributes also receive a copy of
    /// this entity's other attributes under that key. Absent, falsy or
    /// non-object values yield `T::null()`.
    pub fn object<T: Entity>(&self, key: &str, context_key: Option<&str>) -> Arc<T> {
        let nested = match self.attrs.get(key) {
            Some(Value::Object(nested)) => nested,
            Some(value) if is_truthy(value) => {
                debug!(
                    "Attribute {} is not an object; using null {}",
                    key,
                    type_name::<T>()
                );
                return T::null();
            }
            _ => return T::null(),
        };

        let mut nested = nested.clone();
        if let Some(context_key) = context_key {
            let mut context = self.attrs.clone();
            context.remove(key);
            nested.insert(context_key.to_string(), Value::Object(context));
        }
        Arc::new(T::new(Some(nested), Options::default()))
    }

    /// Parses the URI stored under the url key paired with `uri_key`.
    ///
    /// Absolute URLs become [`Uri::Absolute`]; relative references such as
    /// `/images/7.png` become [`Uri::Relative`].
    pub fn uri(&self, uri_key: &'static str) -> Result<Option<Uri>, AttributeError> {
        let key = url_key(uri_key);
        let Some(value) = self.attrs.get(&key).filter(|v| is_truthy(v)) else {
            return Ok(None);
        };

        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Uri::parse(&text).map(Some).map_err(|source| AttributeError::InvalidUri {
            field: uri_key,
            value: text,
            source,
        })
    }

    /// Presence of the url key paired with `uri_key`.
    pub fn is_uri_present(&self, uri_key: &str) -> bool {
        self.is_present(&url_key(uri_key))
    }
}

impl fmt::Debug for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Base")
            .field("attrs", &self.attrs)
            .field("client", &self.client.is_some())
            .finish()
    }
}

impl AsRef<Attributes> for Base {
    fn as_ref(&self) -> &Attributes {
        &self.attrs
    }
}

/// Derives the attribute key holding a URI field's value: the first
/// `_`-separated `uri` token becomes `url` (`photo_uri` -> `photo_url`).
/// Names without such a token are returned unchanged.
pub fn url_key(uri_key: &str) -> String {
    let mut parts: Vec<&str> = uri_key.split('_').collect();
    if let Some(part) = parts.iter_mut().find(|p| **p == "uri") {
        *part = "url";
    }
    parts.join("_")
}

fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

/// Common surface of every declared entity type.
pub trait Entity: Send + Sync + Sized + 'static {
    fn new(attrs: Option<Attributes>, options: Options) -> Self;

    fn base(&self) -> &Base;

    fn base_mut(&mut self) -> &mut Base;

    /// Shared instance standing in for an absent entity of this type.
    ///
    /// Every entity type has its own null instance; the null values of two
    /// different types are distinct objects.
    fn null() -> Arc<Self>;

    /// Dispatch table of every accessor, predicate and alias.
    fn fields() -> &'static [Field<Self>];

    /// Builds an entity from a response body. Bodies that are not objects
    /// give an empty entity.
    fn from_response(response: &Response, options: Options) -> Self {
        let attrs = match response.body() {
            Some(Value::Object(body)) => Some(body.clone()),
            _ => None,
        };
        Self::new(attrs, options)
    }

    fn attrs(&self) -> &Attributes {
        self.base().attrs()
    }

    fn is_null(&self) -> bool {
        std::ptr::eq(self, Arc::as_ptr(&Self::null()))
    }

    /// Reads the field or predicate (`"name?"`) called `name`.
    ///
    /// Unknown names resolve to `Ok(None)`; errors raised by a known
    /// accessor are returned.
    fn get(&self, name: &str) -> Result<Option<Value>, AttributeError> {
        match Self::fields().iter().find(|field| field.name == name) {
            Some(field) => (field.read)(self),
            None => {
                debug!("{} has no field named {}", type_name::<Self>(), name);
                Ok(None)
            }
        }
    }

    fn update(&mut self, attrs: Attributes) {
        self.base_mut().update(attrs);
    }

    fn delete(&mut self, key: &str) -> Option<Value> {
        self.base_mut().delete(key)
    }

    /// Attributes as a JSON object, or `None` for the null instance.
    fn to_value(&self) -> Option<Value> {
        if self.is_null() {
            None
        } else {
            Some(Value::Object(self.attrs().clone()))
        }
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __context_key {
    () => {
        ::std::option::Option::None
    };
    ($key:literal) => {
        ::std::option::Option::Some($key)
    };
}

/// Declares an entity type and its fields.
///
/// ```ignore
/// thecity::entity! {
///     pub struct Tweet {
///         scalars: [id, text],
///         objects: [place: Place as "tweet"],
///         uris: [media_uri => media_url],
///     }
/// }
/// ```
///
/// For each scalar `x`: `x() -> Option<Value>` and `has_x() -> bool`.
/// For each object `x: T`: `x() -> Arc<T>` and `has_x()`; with `as "key"` the
/// nested entity receives the parent's remaining attributes under `key`.
/// For each `x_uri => x_url`: `x_uri()` parses `attributes["x_url"]`,
/// `has_x_uri()` checks it, and `x_url()` / `has_x_url()` are aliases.
#[macro_export]
macro_rules! entity {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(scalars: [$($scalar:ident),* $(,)?] $(,)?)?
            $(objects: [$($object:ident : $object_ty:ty $(as $context:literal)?),* $(,)?] $(,)?)?
            $(uris: [$($uri:ident => $url:ident),* $(,)?] $(,)?)?
        }
    ) => {
        $crate::__private::paste! {
            $(#[$meta])*
            #[derive(Debug)]
            $vis struct $name {
                base: $crate::base::Base,
            }

            #[allow(dead_code)]
            impl $name {
                $($(
                    pub fn $scalar(&self) -> ::std::option::Option<$crate::__private::Value> {
                        self.base
                            .memoize(stringify!($scalar), || self.base.scalar(stringify!($scalar)))
                    }

                    pub fn [<has_ $scalar>](&self) -> bool {
                        self.base.is_present(stringify!($scalar))
                    }
                )*)?

                $($(
                    pub fn $object(&self) -> $crate::__private::Arc<$object_ty> {
                        self.base.memoize(stringify!($object), || {
                            self.base.object::<$object_ty>(
                                stringify!($object),
                                $crate::__context_key!($($context)?),
                            )
                        })
                    }

                    pub fn [<has_ $object>](&self) -> bool {
                        self.base.is_present(stringify!($object))
                    }
                )*)?

                $($(
                    pub fn $uri(
                        &self,
                    ) -> ::std::result::Result<
                        ::std::option::Option<$crate::base::Uri>,
                        $crate::base::AttributeError,
                    > {
                        self.base
                            .try_memoize(stringify!($uri), || self.base.uri(stringify!($uri)))
                    }

                    pub fn [<has_ $uri>](&self) -> bool {
                        self.base.is_uri_present(stringify!($uri))
                    }

                    pub fn $url(
                        &self,
                    ) -> ::std::result::Result<
                        ::std::option::Option<$crate::base::Uri>,
                        $crate::base::AttributeError,
                    > {
                        debug_assert_eq!($crate::base::url_key(stringify!($uri)), stringify!($url));
                        self.$uri()
                    }

                    pub fn [<has_ $url>](&self) -> bool {
                        self.[<has_ $uri>]()
                    }
                )*)?
            }

            impl $crate::base::Entity for $name {
                fn new(
                    attrs: ::std::option::Option<$crate::base::Attributes>,
                    options: $crate::base::Options,
                ) -> Self {
                    Self {
                        base: $crate::base::Base::new(attrs, options),
                    }
                }

                fn base(&self) -> &$crate::base::Base {
                    &self.base
                }

                fn base_mut(&mut self) -> &mut $crate::base::Base {
                    &mut self.base
                }

                fn null() -> $crate::__private::Arc<Self> {
                    static NULL: $crate::__private::OnceLock<$crate::__private::Arc<$name>> =
                        $crate::__private::OnceLock::new();
                    NULL.get_or_init(|| {
                        $crate::__private::Arc::new(<$name as $crate::base::Entity>::new(
                            ::std::option::Option::None,
                            $crate::base::Options::default(),
                        ))
                    })
                    .clone()
                }

                fn fields() -> &'static [$crate::base::Field<Self>] {
                    const FIELDS: &[$crate::base::Field<$name>] = &[
                        $($(
                            $crate::base::Field {
                                name: stringify!($scalar),
                                read: |e: &$name| ::std::result::Result::Ok(e.$scalar()),
                            },
                            $crate::base::Field {
                                name: concat!(stringify!($scalar), "?"),
                                read: |e: &$name| {
                                    ::std::result::Result::Ok(::std::option::Option::Some(
                                        $crate::__private::Value::Bool(e.[<has_ $scalar>]()),
                                    ))
                                },
                            },
                        )*)?
                        $($(
                            $crate::base::Field {
                                name: stringify!($object),
                                read: |e: &$name| {
                                    ::std::result::Result::Ok(
                                        $crate::base::Entity::to_value(&*e.$object()),
                                    )
                                },
                            },
                            $crate::base::Field {
                                name: concat!(stringify!($object), "?"),
                                read: |e: &$name| {
                                    ::std::result::Result::Ok(::std::option::Option::Some(
                                        $crate::__private::Value::Bool(e.[<has_ $object>]()),
                                    ))
                                },
                            },
                        )*)?
                        $($(
                            $crate::base::Field {
                                name: stringify!($uri),
                                read: |e: &$name| {
                                    ::std::result::Result::Ok(e.$uri()?.map(|u| {
                                        $crate::__private::Value::String(u.as_str().to_owned())
                                    }))
                                },
                            },
                            $crate::base::Field {
                                name: concat!(stringify!($uri), "?"),
                                read: |e: &$name| {
                                    ::std::result::Result::Ok(::std::option::Option::Some(
                                        $crate::__private::Value::Bool(e.[<has_ $uri>]()),
                                    ))
                                },
                            },
                            $crate::base::Field {
                                name: stringify!($url),
                                read: |e: &$name| {
                                    ::std::result::Result::Ok(e.$url()?.map(|u| {
                                        $crate::__private::Value::String(u.as_str().to_owned())
                                    }))
                                },
                            },
                            $crate::base::Field {
                                name: concat!(stringify!($url), "?"),
                                read: |e: &$name| {
                                    ::std::result::Result::Ok(::std::option::Option::Some(
                                        $crate::__private::Value::Bool(e.[<has_ $url>]()),
                                    ))
                                },
                            },
                        )*)?
                    ];
                    FIELDS
                }
            }
        }
    };
}
