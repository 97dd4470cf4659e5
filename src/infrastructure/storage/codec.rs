//! JSON codec shared by both storage backends

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::domain::DomainError;

/// Encode a record or projection into its stored bytes
pub fn encode<T: Serialize>(operation: &str, key: &str, value: &T) -> Result<Vec<u8>, DomainError> {
    serde_json::to_vec(value).map_err(|e| DomainError::backend(operation, key, e))
}

/// Decode stored bytes into a record
pub fn decode<T: DeserializeOwned>(
    operation: &str,
    key: &str,
    bytes: &[u8],
) -> Result<T, DomainError> {
    serde_json::from_slice(bytes).map_err(|e| DomainError::backend(operation, key, e))
}

/// Primary key referenced by a unique index projection
pub fn projection_owner(
    operation: &str,
    key: &str,
    bytes: &[u8],
    key_field: &str,
) -> Result<String, DomainError> {
    let projection: Value = decode(operation, key, bytes)?;

    projection
        .get(key_field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            DomainError::backend(
                operation,
                key,
                format!("index projection is missing '{}'", key_field),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_projection_owner() {
        let bytes = encode("op", "k", &json!({"user_id": "user1", "password_hash": ""})).unwrap();
        assert_eq!(projection_owner("op", "k", &bytes, "user_id").unwrap(), "user1");
    }

    #[test]
    fn test_projection_owner_missing_field() {
        let bytes = encode("op", "k", &json!({"id": "t1"})).unwrap();
        let err = projection_owner("users/redb.get", "k", &bytes, "user_id").unwrap_err();
        assert!(matches!(err, DomainError::Backend { .. }));
    }

    #[test]
    fn test_decode_error_is_tagged() {
        let err = decode::<Value>("users/redb.get", "users/1", b"{oops").unwrap_err();
        match err {
            DomainError::Backend { operation, key, .. } => {
                assert_eq!(operation, "users/redb.get");
                assert_eq!(key, "users/1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
