//! Typed entity patterns and their compilation into flat triples.
//!
//! A pattern is a tree of [`EntityPattern`]s. Named variables have to be
//! declared on a [`PatternScope`] before any pattern may refer to them, and
//! nested entities without an explicit identity get an anonymous variable.
//! Compiling yields a [`TripleIndex`] and a baseline [`Binding`] holding the
//! attribute constraints implied by unique and unique-inverse attributes.

// used to keep the one-to-one mapping between names and declared variables
use bimap::BiMap;

use crate::binding::Binding;
use crate::error::{Result, ScgError};
use crate::schema::Schema;
use crate::triple::{Id, Literal, Term, Triple, TripleIndex};
use crate::variable::{ANONYMOUS, Variable, VariableAllocator};

// ------------- Position -------------
#[derive(Debug, Clone, PartialEq)]
pub enum Position {
    Var(String),
    Id(Id),
    Lit(Literal),
    Entity(Box<EntityPattern>),
}

impl Position {
    pub fn var(name: &str) -> Self {
        Position::Var(name.to_string())
    }
    pub fn id(id: Id) -> Self {
        Position::Id(id)
    }
    pub fn lit(literal: impl Into<Literal>) -> Self {
        Position::Lit(literal.into())
    }
}
impl From<EntityPattern> for Position {
    fn from(pattern: EntityPattern) -> Self {
        Position::Entity(Box::new(pattern))
    }
}
impl From<Literal> for Position {
    fn from(literal: Literal) -> Self {
        Position::Lit(literal)
    }
}

// ------------- EntityPattern -------------
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityPattern {
    identity: Option<Position>,
    attributes: Vec<(String, Position)>,
}

impl EntityPattern {
    /// An entity whose identity is an anonymous variable.
    pub fn new() -> Self {
        Self::default()
    }
    /// An entity identified by a declared variable.
    pub fn var(name: &str) -> Self {
        Self { identity: Some(Position::var(name)), attributes: Vec::new() }
    }
    /// An entity identified by a known identifier.
    pub fn id(id: Id) -> Self {
        Self { identity: Some(Position::Id(id)), attributes: Vec::new() }
    }
    pub fn identified_by(position: Position) -> Self {
        Self { identity: Some(position), attributes: Vec::new() }
    }
    pub fn attr(mut self, attribute: &str, value: impl Into<Position>) -> Self {
        self.attributes.push((attribute.to_string(), value.into()));
        self
    }
    pub fn attributes(&self) -> &[(String, Position)] {
        &self.attributes
    }
}

// ------------- PatternScope -------------
/// The symbol table of one compilation. Every variable created through the
/// scope is recorded in creation order, named or not.
pub struct PatternScope<'a> {
    allocator: &'a mut VariableAllocator,
    named: BiMap<String, Variable>,
    variables: Vec<Variable>,
    constraints: Binding,
}

impl<'a> PatternScope<'a> {
    pub fn new(allocator: &'a mut VariableAllocator) -> Self {
        Self { allocator, named: BiMap::new(), variables: Vec::new(), constraints: Binding::new() }
    }
    pub fn declare(&mut self, name: &str) -> Result<Variable> {
        if name == ANONYMOUS || name.is_empty() {
            return Err(ScgError::pattern(format!("'{}' is not a valid variable name", name)));
        }
        if self.named.contains_left(name) {
            return Err(ScgError::pattern(format!("variable '{}' is declared twice", name)));
        }
        let variable = self.allocator.named(name);
        self.named.insert(name.to_string(), variable.clone());
        self.variables.push(variable.clone());
        Ok(variable)
    }
    pub fn lookup(&self, name: &str) -> Result<Variable> {
        self.named
            .get_by_left(name)
            .cloned()
            .ok_or_else(|| ScgError::pattern(format!("variable '{}' is not declared", name)))
    }
    pub fn anonymous(&mut self) -> Variable {
        let variable = self.allocator.anonymous();
        self.variables.push(variable.clone());
        variable
    }
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }
    /// Declares that `lower <= upper` under the literal order.
    pub fn leq(&mut self, lower: &Position, upper: &Position) -> Result<()> {
        let lower = self.scalar(lower)?;
        let upper = self.scalar(upper)?;
        let constrained = self.constraints.constrain_bounds(&lower, &upper);
        if let Some(error) = constrained.error() {
            return Err(ScgError::pattern(format!("bounds declaration {} <= {} failed: {}", lower, upper, error)));
        }
        self.constraints = constrained;
        Ok(())
    }
    /// Declares that no two of the positions may ever be unified.
    pub fn all_different(&mut self, positions: &[Position]) -> Result<()> {
        let terms = positions.iter().map(|p| self.scalar(p)).collect::<Result<Vec<Term>>>()?;
        let constrained = self.constraints.all_different(&terms);
        if let Some(error) = constrained.error() {
            return Err(ScgError::pattern(format!("disequality declaration failed: {}", error)));
        }
        self.constraints = constrained;
        Ok(())
    }

    fn scalar(&self, position: &Position) -> Result<Term> {
        match position {
            Position::Var(name) => Ok(Term::Var(self.lookup(name)?)),
            Position::Id(id) => Ok(Term::Id(*id)),
            Position::Lit(literal) => Ok(Term::Lit(literal.clone())),
            Position::Entity(_) => Err(ScgError::pattern("a nested pattern cannot be constrained")),
        }
    }

    /// Flattens the patterns into triples and folds the uniqueness invariants
    /// of their attributes into a baseline binding.
    pub fn compile(&mut self, schema: &Schema, patterns: &[EntityPattern]) -> Result<(TripleIndex, Binding)> {
        let mut triples = Vec::new();
        for pattern in patterns {
            self.entity(schema, pattern, &mut triples)?;
        }
        let index: TripleIndex = triples.into_iter().collect();

        let mut binding = Binding::new();
        for t in &index {
            if schema.is_unique(t.a) {
                binding = binding.attribute_constrained(t.a, &t.e, &t.v);
            }
            if schema.is_unique_inverse(t.a) {
                binding = binding.attribute_constrained(t.a, &t.v, &t.e);
            }
        }
        if let Some(error) = binding.error() {
            return Err(ScgError::pattern(format!("pattern contradicts its own invariants: {}", error)));
        }
        Ok((index, binding))
    }

    fn entity(&mut self, schema: &Schema, pattern: &EntityPattern, triples: &mut Vec<Triple>) -> Result<Term> {
        let identity = match &pattern.identity {
            None if pattern.attributes.is_empty() => {
                return Err(ScgError::pattern("an anonymous entity needs at least one attribute"));
            }
            None => Term::Var(self.anonymous()),
            Some(Position::Var(name)) => Term::Var(self.lookup(name)?),
            Some(Position::Id(id)) => Term::Id(*id),
            Some(Position::Lit(literal)) => {
                return Err(ScgError::pattern(format!("literal {} in entity position", literal)));
            }
            Some(Position::Entity(_)) => {
                return Err(ScgError::pattern("nested pattern in entity position"));
            }
        };

        for (name, position) in &pattern.attributes {
            let (attribute, inverted) = schema
                .resolve(name)
                .ok_or_else(|| ScgError::pattern(format!("unknown attribute '{}'", name)))?;
            let is_link = schema.invariant(attribute).is_some_and(|i| i.is_link);
            let value = match position {
                Position::Var(var) => Term::Var(self.lookup(var)?),
                Position::Id(id) => Term::Id(*id),
                Position::Lit(literal) if is_link || inverted => {
                    return Err(ScgError::pattern(format!(
                        "literal {} given to link attribute '{}'",
                        literal, name
                    )));
                }
                Position::Lit(literal) => Term::Lit(literal.clone()),
                Position::Entity(nested) if is_link || inverted => self.entity(schema, nested, triples)?,
                Position::Entity(_) => {
                    return Err(ScgError::pattern(format!(
                        "nested pattern given to non-link attribute '{}'",
                        name
                    )));
                }
            };
            let triple = if inverted {
                Triple { e: value, a: attribute, v: identity.clone() }
            } else {
                Triple { e: identity.clone(), a: attribute, v: value }
            };
            triples.push(triple);
        }
        Ok(identity)
    }

    /// Ends the scope, handing back the variables it created together with
    /// the bounds and disequality declarations.
    pub fn finish(self) -> (Vec<Variable>, Binding) {
        (self.variables, self.constraints)
    }
}
