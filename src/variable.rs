// used to share variable names cheaply between fresh copies
use std::sync::Arc;

// renamings are hashmaps keyed by variables
use core::hash::{BuildHasherDefault, Hash, Hasher};
use seahash::SeaHasher;
use std::collections::HashMap;

// custom made ordering for variables
use std::cmp::Ordering;

// used to print out readable forms of a variable
use std::fmt;

use serde::{Deserialize, Serialize};

// ------------- Ident -------------
pub type Ident = u64;

pub type VarHasher = BuildHasherDefault<SeaHasher>;

pub const GENESIS: Ident = 0;

/// Hands out strictly increasing identities. Identities are never reused, so
/// the order in which they were generated is also their numeric order.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    lower_bound: Ident,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { lower_bound: GENESIS }
    }
    pub fn generate(&mut self) -> Ident {
        self.lower_bound += 1;
        self.lower_bound
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- Variable -------------
pub const ANONYMOUS: &str = "_";

/// A placeholder that can be bound to other variables or atomic values during
/// unification. Only the id carries identity; the name is there for humans and
/// for matching knowledge-base records against named variables.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Variable {
    id: Ident,
    name: Arc<str>,
}

impl Variable {
    pub fn id(&self) -> Ident {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn is_named(&self) -> bool {
        &*self.name != ANONYMOUS
    }
}
impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Variable {}
impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
impl Ord for Variable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}
impl PartialOrd for Variable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "?{}:{}", self.name, self.id)
    }
}

pub type Renaming = HashMap<Variable, Variable, VarHasher>;

// ------------- VariableAllocator -------------
/// The single source of fresh variables. It is threaded explicitly through
/// pattern compilation, grammar precomputation and the search space, so that
/// no two variables ever share an id.
#[derive(Debug, Clone, Default)]
pub struct VariableAllocator {
    ids: IdGenerator,
}

impl VariableAllocator {
    pub fn new() -> Self {
        Self { ids: IdGenerator::new() }
    }
    pub fn named(&mut self, name: &str) -> Variable {
        Variable { id: self.ids.generate(), name: Arc::from(name) }
    }
    pub fn anonymous(&mut self) -> Variable {
        self.named(ANONYMOUS)
    }
    /// A new variable with the same name but a new identity.
    pub fn fresh(&mut self, variable: &Variable) -> Variable {
        Variable { id: self.ids.generate(), name: Arc::clone(&variable.name) }
    }
    /// Freshens every variable in order, returning the new variables together
    /// with the renaming that maps old onto new.
    pub fn freshen(&mut self, variables: &[Variable]) -> (Vec<Variable>, Renaming) {
        let mut renaming = Renaming::default();
        let fresh: Vec<Variable> = variables
            .iter()
            .map(|v| {
                let f = self.fresh(v);
                renaming.insert(v.clone(), f.clone());
                f
            })
            .collect();
        (fresh, renaming)
    }
}
