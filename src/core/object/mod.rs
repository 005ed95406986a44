use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// An untyped (JSON) Object from which [TypedParameters](TypedParameter) can be parsed.
///
/// Carries partial session updates as they arrive from loosely-typed callers.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UntypedObject(pub(crate) Map<String, Json>);

/// A strongly typed parameter stored under a fixed key of an [UntypedObject].
pub trait TypedParameter:
    TryFrom<Json, Error = anyhow::Error> + Into<Json> + Clone + std::fmt::Debug
{
    const KEY: &'static str;
}

impl UntypedObject {
    /// Get a [TypedParameter] from the Object.
    ///
    /// `null` is treated the same as an absent key. Note that this method clones the
    /// underlying data.
    pub fn get<T: TypedParameter>(&self) -> Option<Result<T>> {
        match self.0.get(T::KEY)? {
            Json::Null => None,
            value => Some(
                value
                    .clone()
                    .try_into()
                    .with_context(|| format!("'{}' could not be parsed", T::KEY)),
            ),
        }
    }

    /// Insert a [TypedParameter], returning the raw value previously stored under its key.
    pub fn insert<T: TypedParameter>(&mut self, t: T) -> Option<Json> {
        self.0.insert(T::KEY.to_owned(), t.into())
    }

    /// Whether `key` holds the empty string.
    pub fn is_empty_string(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(Json::String(s)) if s.is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl TryFrom<Json> for UntypedObject {
    type Error = anyhow::Error;

    fn try_from(value: Json) -> Result<Self> {
        match value {
            Json::Object(map) => Ok(Self(map)),
            other => anyhow::bail!("expected a JSON object, found {other}"),
        }
    }
}
