//! Program-wide map types.
//!
//! A map's key and value types are established by its first use and widened
//! by later ones. Maps are global: every probe and subprogram shares the same
//! registry.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::{
    ast::types::{is_same_type, unify, MapKey, SizedType},
    Span,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MapInfo {
    pub value: Option<SizedType>,
    pub value_span: Span,
    pub key: Option<MapKey>,
    pub key_span: Span,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapTypeError {
    #[error("Type mismatch for {map}: trying to assign value of type '{new}' when map already contains a value of type '{old}'")]
    ValueMismatch {
        map: String,
        old: SizedType,
        new: SizedType,
        first: Span,
    },
    #[error("Argument mismatch for {map}: trying to access with arguments: '{new}' when map expects arguments: '{old}'")]
    KeyMismatch {
        map: String,
        old: MapKey,
        new: MapKey,
        first: Span,
    },
    #[error("{map}: invalid map key type '{ty}'")]
    InvalidKey { map: String, ty: SizedType },
}

impl MapTypeError {
    /// Location of the use that first established the conflicting type.
    pub fn first_site(&self) -> Option<&Span> {
        match self {
            MapTypeError::ValueMismatch { first, .. } | MapTypeError::KeyMismatch { first, .. } => {
                Some(first)
            }
            MapTypeError::InvalidKey { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct MapRegistry {
    maps: BTreeMap<String, MapInfo>,
}

impl MapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.maps.clear();
    }

    pub fn get(&self, ident: &str) -> Option<&MapInfo> {
        self.maps.get(ident)
    }

    pub fn idents(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(String::as_str)
    }

    pub fn get_map_type(&self, ident: &str) -> Option<&SizedType> {
        self.maps.get(ident)?.value.as_ref()
    }

    pub fn get_map_key_type(&self, ident: &str) -> Option<&MapKey> {
        self.maps.get(ident)?.key.as_ref()
    }

    /// Records a value assignment. Strings, buffers and integers widen;
    /// anything else must match the established type exactly.
    pub fn assign_map_type(
        &mut self,
        ident: &str,
        ty: &SizedType,
        span: &Span,
    ) -> Result<SizedType, MapTypeError> {
        let info = self.maps.entry(String::from(ident)).or_default();

        let current = match &info.value {
            Some(current) if !current.is_none() => current,
            _ => {
                info.value = Some(ty.clone());
                info.value_span = span.clone();
                return Ok(ty.clone());
            }
        };

        let unified = is_same_type(current, ty)
            .then(|| unify(current, ty))
            .flatten();

        match unified {
            Some(unified) => {
                info.value = Some(unified.clone());
                Ok(unified)
            }
            None => Err(MapTypeError::ValueMismatch {
                map: String::from(ident),
                old: current.clone(),
                new: ty.clone(),
                first: info.value_span.clone(),
            }),
        }
    }

    /// Builds the key for a list of key expression types. Integer
    /// components are stored as 64-bit.
    pub fn create_key_type(types: &[SizedType]) -> MapKey {
        let args = types
            .iter()
            .map(|ty| {
                if ty.is_intlike() {
                    SizedType::int(64, ty.is_signed)
                } else {
                    ty.clone()
                }
            })
            .collect();
        MapKey::new(args)
    }

    /// True if `new` has the same arity and component kinds as `current`.
    pub fn validate_new_key(current: &MapKey, new: &MapKey) -> bool {
        current.args.len() == new.args.len()
            && current
                .args
                .iter()
                .zip(&new.args)
                .all(|(old, new)| is_same_type(old, new))
    }

    /// Widens `current` component-wise with `new`. Never shrinks.
    pub fn update_current_key(current: &mut MapKey, new: &MapKey) {
        for (old, new) in current.args.iter_mut().zip(&new.args) {
            if let Some(unified) = unify(old, new) {
                *old = unified;
            }
        }
    }

    /// Records a key use.
    pub fn assign_key(
        &mut self,
        ident: &str,
        key: &MapKey,
        span: &Span,
    ) -> Result<MapKey, MapTypeError> {
        let info = self.maps.entry(String::from(ident)).or_default();

        let Some(current) = info.key.as_mut() else {
            info.key = Some(key.clone());
            info.key_span = span.clone();
            return Ok(key.clone());
        };

        if !Self::validate_new_key(current, key) {
            return Err(MapTypeError::KeyMismatch {
                map: String::from(ident),
                old: current.clone(),
                new: key.clone(),
                first: info.key_span.clone(),
            });
        }

        Self::update_current_key(current, key);
        Ok(current.clone())
    }

    /// Final check of an established key.
    pub fn validate_map_key(ident: &str, key: &MapKey) -> Result<(), MapTypeError> {
        match key
            .args
            .iter()
            .find(|arg| arg.has_none() || arg.is_void() || arg.is_aggregate())
        {
            Some(ty) => Err(MapTypeError::InvalidKey {
                map: String::from(ident),
                ty: ty.clone(),
            }),
            None => Ok(()),
        }
    }
}
