// used to keep the one-to-one mapping between names and their identities
use bimap::BiMap;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScgError};
use crate::triple::{AttributeHasher, Id};
use crate::variable::IdGenerator;

// ------------- Invariant -------------
/// Invariants an attribute imposes on the triples that use it.
///
/// - `unique`: an entity has at most one value for the attribute.
/// - `unique_inverse`: a value belongs to at most one entity.
/// - `is_link`: values are entities (identifiers or nested patterns), never literals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invariant {
    pub unique: bool,
    pub unique_inverse: bool,
    pub is_link: bool,
}

impl Invariant {
    pub fn plain() -> Self {
        Self::default()
    }
    pub fn link() -> Self {
        Self { is_link: true, ..Self::default() }
    }
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
    pub fn unique_inverse(mut self) -> Self {
        self.unique_inverse = true;
        self
    }
}

// ------------- Schema -------------
/// Names every identifier the grammar refers to. Attributes carry an
/// [`Invariant`]; other identifiers (concepts, lexical entries) are plain
/// named ids. An attribute may also be referred to through an inverse alias,
/// in which case patterns using the alias have entity and value flipped.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    ids: IdGenerator,
    names: BiMap<String, Id>,
    invariants: HashMap<Id, Invariant, AttributeHasher>,
    inverses: HashMap<String, Id>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }
    /// Declares an attribute. Declaring the same name twice is an error.
    pub fn define(&mut self, name: &str, invariant: Invariant) -> Result<Id> {
        if self.names.contains_left(name) || self.inverses.contains_key(name) {
            return Err(ScgError::Schema(format!("'{}' is already defined", name)));
        }
        let id = self.ids.generate();
        self.names.insert(name.to_string(), id);
        self.invariants.insert(id, invariant);
        Ok(id)
    }
    /// Declares `alias` as the inverse of the attribute `of`.
    pub fn define_inverse(&mut self, alias: &str, of: &str) -> Result<Id> {
        if self.names.contains_left(alias) || self.inverses.contains_key(alias) {
            return Err(ScgError::Schema(format!("'{}' is already defined", alias)));
        }
        let id = self
            .attribute(of)
            .ok_or_else(|| ScgError::Schema(format!("'{}' is not an attribute", of)))?;
        self.inverses.insert(alias.to_string(), id);
        Ok(id)
    }
    /// Interns a plain named identifier, returning the existing id if the name
    /// is already known.
    pub fn concept(&mut self, name: &str) -> Id {
        if let Some(id) = self.names.get_by_left(name) {
            return *id;
        }
        let id = self.ids.generate();
        self.names.insert(name.to_string(), id);
        id
    }
    /// Resolves an attribute name or inverse alias to the attribute id and
    /// whether the alias is inverted.
    pub fn resolve(&self, name: &str) -> Option<(Id, bool)> {
        if let Some(id) = self.attribute(name) {
            return Some((id, false));
        }
        self.inverses.get(name).map(|id| (*id, true))
    }
    pub fn attribute(&self, name: &str) -> Option<Id> {
        self.names
            .get_by_left(name)
            .filter(|id| self.invariants.contains_key(id))
            .copied()
    }
    pub fn invariant(&self, attribute: Id) -> Option<Invariant> {
        self.invariants.get(&attribute).copied()
    }
    pub fn is_unique(&self, attribute: Id) -> bool {
        self.invariant(attribute).is_some_and(|i| i.unique)
    }
    pub fn is_unique_inverse(&self, attribute: Id) -> bool {
        self.invariant(attribute).is_some_and(|i| i.unique_inverse)
    }
    pub fn id(&self, name: &str) -> Option<Id> {
        self.names.get_by_left(name).copied()
    }
    pub fn name(&self, id: Id) -> Option<&str> {
        self.names.get_by_right(&id).map(String::as_str)
    }
}
