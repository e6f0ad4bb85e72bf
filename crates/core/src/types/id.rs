//! Newtype IDs for type-safe entity references.
//!
//! The backend is inconsistent about whether identifiers travel as JSON
//! numbers or strings, so every ID here is normalized to its string form.
//! Use the `define_id!` macro to create wrappers that prevent accidentally
//! mixing IDs from different entity types.

use thiserror::Error;

/// Error returned when an identifier cannot be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier contains a comma: {0}")]
    ContainsSeparator(String),
}

/// Normalize a raw identifier: trims whitespace and rejects values that
/// could not be sent in a comma-separated batch.
///
/// # Errors
///
/// Returns `IdError` if the trimmed value is empty or contains a comma.
pub fn normalize_id(raw: &str) -> Result<String, IdError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IdError::Empty);
    }
    if trimmed.contains(',') {
        return Err(IdError::ContainsSeparator(trimmed.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Macro to define a type-safe, string-normalized ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize` as a plain string, `Deserialize` from either a string or an integer
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `parse()` (validating) and `as_str()`
/// - `From<u64>` / `From<i64>` for numeric IDs
/// - `FromStr` and `Display`
///
/// # Example
///
/// ```rust
/// # use techshop_core::define_id;
/// define_id!(SkuId);
///
/// let a = SkuId::from(42_u64);
/// let b: SkuId = " 42 ".parse().unwrap();
/// assert_eq!(a, b);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Create an ID from a raw string, normalizing it.
            ///
            /// # Errors
            ///
            /// Returns `IdError` if the value is empty or contains a comma.
            pub fn parse(raw: &str) -> ::core::result::Result<Self, $crate::IdError> {
                $crate::normalize_id(raw).map(Self)
            }

            /// Get the normalized string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id.to_string())
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id.to_string())
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(
                &self,
                serializer: S,
            ) -> ::core::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(
                deserializer: D,
            ) -> ::core::result::Result<Self, D::Error> {
                let raw = <$crate::RawId as ::serde::Deserialize>::deserialize(deserializer)?;
                Self::parse(&raw.into_string()).map_err(::serde::de::Error::custom)
            }
        }
    };
}

/// Wire form of an identifier before normalization.
#[doc(hidden)]
#[derive(serde::Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl RawId {
    #[doc(hidden)]
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Signed(n) => n.to_string(),
            Self::Unsigned(n) => n.to_string(),
        }
    }
}

define_id!(ProductId);
define_id!(PreorderId);
define_id!(UserId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_and_string_ids_normalize_equal() {
        assert_eq!(ProductId::from(42_u64), ProductId::parse("42").unwrap());
        assert_eq!(ProductId::from(-3_i64).as_str(), "-3");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let id: ProductId = "  17 ".parse().unwrap();
        assert_eq!(id.as_str(), "17");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(ProductId::parse("   "), Err(IdError::Empty));
    }

    #[test]
    fn test_parse_rejects_comma() {
        assert!(matches!(
            ProductId::parse("1,2"),
            Err(IdError::ContainsSeparator(_))
        ));
    }

    #[test]
    fn test_deserialize_accepts_number_or_string() {
        let from_num: PreorderId = serde_json::from_str("9").unwrap();
        let from_str: PreorderId = serde_json::from_str("\"9\"").unwrap();
        assert_eq!(from_num, from_str);
    }

    #[test]
    fn test_serialize_as_string() {
        let id = PreorderId::from(9_u64);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"9\"");
    }

    #[test]
    fn test_deserialize_rejects_empty_string() {
        assert!(serde_json::from_str::<ProductId>("\"\"").is_err());
    }
}
