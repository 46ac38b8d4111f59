//! Record traits.
//!
//! User types implement [`Model`]. Tables and indexes work with the
//! object-safe [`Record`] view of a model, which every `Model` gets for free.

use crate::error::{OrmError, OrmResult};
use crate::key::build_key_from_parts;
use crate::key::KeyPart;
use crate::types::RowId;
use kvorm_codec::{from_cbor, to_canonical_cbor};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::fmt::Debug;

/// A type that can be stored in a table.
///
/// Payloads are canonical CBOR by default, so equal values always encode to
/// equal bytes. Override [`Model::encode`] and [`Model::decode`] together to
/// use another deterministic format.
///
/// # Example
///
/// ```rust
/// use kvorm_core::{Model, OrmError, OrmResult};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Clone, Serialize, Deserialize)]
/// struct Group {
///     admin: String,
///     metadata: Vec<u8>,
/// }
///
/// impl Model for Group {
///     fn validate(&self) -> OrmResult<()> {
///         if self.admin.is_empty() {
///             return Err(OrmError::validation("admin must be set"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Model: Serialize + DeserializeOwned + Default + Debug + Send + Sync + 'static {
    /// Stateless validation run before every write.
    fn validate(&self) -> OrmResult<()> {
        Ok(())
    }

    /// Encodes the record payload.
    fn encode(&self) -> OrmResult<Vec<u8>> {
        Ok(to_canonical_cbor(self)?)
    }

    /// Decodes a record payload.
    fn decode(bytes: &[u8]) -> OrmResult<Self> {
        Ok(from_cbor(bytes)?)
    }
}

/// A model whose row id is derived from its own fields.
pub trait PrimaryKeyed: Model {
    /// Returns the ordered key parts of the primary key.
    ///
    /// The parts are combined with [`build_key_from_parts`], so every part
    /// except the last must be prefix-safe encodable.
    fn primary_key_fields(&self) -> Vec<KeyPart>;
}

/// Returns the encoded primary key of `obj`.
///
/// # Errors
///
/// Propagates key encoding errors.
pub fn primary_key<T: PrimaryKeyed + ?Sized>(obj: &T) -> OrmResult<RowId> {
    Ok(RowId::new(build_key_from_parts(&obj.primary_key_fields())?))
}

/// Object-safe view of a [`Model`].
pub trait Record: Debug + Send + Sync {
    /// Encodes the record.
    fn marshal(&self) -> OrmResult<Vec<u8>>;

    /// Replaces `self` with the decoded payload.
    fn unmarshal(&mut self, bytes: &[u8]) -> OrmResult<()>;

    /// Runs stateless validation.
    fn validate_basic(&self) -> OrmResult<()>;

    /// Returns the Rust type name of the record.
    fn type_name(&self) -> &'static str;

    /// Upcasts to `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Upcasts to `Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Model> Record for T {
    fn marshal(&self) -> OrmResult<Vec<u8>> {
        self.encode()
    }

    fn unmarshal(&mut self, bytes: &[u8]) -> OrmResult<()> {
        *self = T::decode(bytes)?;
        Ok(())
    }

    fn validate_basic(&self) -> OrmResult<()> {
        self.validate()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Runtime identity of the model type bound to a table.
#[derive(Debug, Clone, Copy)]
pub struct ModelType {
    type_id: TypeId,
    name: &'static str,
    new_instance: fn() -> Box<dyn Record>,
}

impl ModelType {
    /// Returns the model type of `T`.
    #[must_use]
    pub fn of<T: Model>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            new_instance: new_boxed::<T>,
        }
    }

    /// Returns the Rust type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if the model type is `T`.
    #[must_use]
    pub fn is<T: Model>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Returns `true` if `obj` is of this model type.
    #[must_use]
    pub fn matches(&self, obj: &dyn Record) -> bool {
        obj.as_any().type_id() == self.type_id
    }

    /// Checks that `obj` is of this model type.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::InvalidType`] on mismatch.
    pub fn check(&self, obj: &dyn Record) -> OrmResult<()> {
        if self.matches(obj) {
            Ok(())
        } else {
            Err(OrmError::invalid_type(self.name, obj.type_name()))
        }
    }

    /// Decodes `bytes` into a fresh boxed instance.
    pub(crate) fn decode(&self, bytes: &[u8]) -> OrmResult<Box<dyn Record>> {
        let mut obj = (self.new_instance)();
        obj.unmarshal(bytes)?;
        Ok(obj)
    }
}

impl PartialEq for ModelType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ModelType {}

fn new_boxed<T: Model>() -> Box<dyn Record> {
    Box::new(T::default())
}

/// Downcasts a record to `T`.
///
/// # Errors
///
/// Returns [`OrmError::InvalidType`] if `obj` is not a `T`.
pub fn downcast<T: Model>(obj: &dyn Record) -> OrmResult<&T> {
    obj.as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| OrmError::invalid_type(std::any::type_name::<T>(), obj.type_name()))
}

/// Downcasts a mutable record to `T`.
///
/// # Errors
///
/// Returns [`OrmError::InvalidType`] if `obj` is not a `T`.
pub fn downcast_mut<T: Model>(obj: &mut dyn Record) -> OrmResult<&mut T> {
    let actual = obj.type_name();
    obj.as_any_mut()
        .downcast_mut::<T>()
        .ok_or_else(|| OrmError::invalid_type(std::any::type_name::<T>(), actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Account {
        owner: String,
        balance: u64,
    }

    impl Model for Account {
        fn validate(&self) -> OrmResult<()> {
            if self.owner.is_empty() {
                return Err(OrmError::validation("owner is required"));
            }
            Ok(())
        }
    }

    impl PrimaryKeyed for Account {
        fn primary_key_fields(&self) -> Vec<KeyPart> {
            vec![KeyPart::from(self.owner.as_str())]
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Other;

    impl Model for Other {}

    #[test]
    fn record_roundtrip_through_trait_object() {
        let account = Account {
            owner: "alice".into(),
            balance: 10,
        };
        let bytes = (&account as &dyn Record).marshal().unwrap();

        let mut dest = Account::default();
        (&mut dest as &mut dyn Record).unmarshal(&bytes).unwrap();
        assert_eq!(dest, account);
    }

    #[test]
    fn validation_runs_through_record() {
        let account = Account::default();
        let err = (&account as &dyn Record).validate_basic().unwrap_err();
        assert!(matches!(err, OrmError::Validation { .. }));
    }

    #[test]
    fn model_type_checks() {
        let model = ModelType::of::<Account>();
        assert!(model.is::<Account>());
        assert!(!model.is::<Other>());
        assert!(model.check(&Account::default()).is_ok());
        assert!(model.check(&Other).unwrap_err().is_invalid_type());
    }

    #[test]
    fn model_type_decodes_fresh_instances() {
        let account = Account {
            owner: "bob".into(),
            balance: 3,
        };
        let decoded = ModelType::of::<Account>()
            .decode(&account.encode().unwrap())
            .unwrap();
        assert_eq!(downcast::<Account>(decoded.as_ref()).unwrap(), &account);
    }

    #[test]
    fn primary_key_of_single_field_is_raw() {
        let account = Account {
            owner: "carol".into(),
            balance: 0,
        };
        assert_eq!(primary_key(&account).unwrap().as_bytes(), b"carol");
    }

    #[test]
    fn downcast_mismatch_is_invalid_type() {
        assert!(downcast::<Account>(&Other).unwrap_err().is_invalid_type());
        let mut other = Other;
        assert!(downcast_mut::<Account>(&mut other).is_err());
    }
}
