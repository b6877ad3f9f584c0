//! The unification algebra.
//!
//! A [`Binding`] is a union-find over [`Term`]s together with three kinds of
//! constraints that are checked whenever classes are joined:
//!
//! - attribute constraints, `if --attribute--> then`, which express that two
//!   unified if-endpoints force their then-endpoints to unify as well. Unique
//!   and unique-inverse attributes are compiled into these.
//! - bounds constraints, `lower <= upper` edges between terms together with the
//!   literal lower and upper bound currently known for every representative.
//! - disequalities, `left != right`, which forbid two classes from ever being
//!   joined.
//!
//! Every public operation is pure and returns a new binding. Failure never
//! raises; it yields a binding carrying a [`BindingError`], and any further
//! operation on it returns it unchanged.

use core::hash::BuildHasherDefault;
use seahash::SeaHasher;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

// custom made ordering for unifiers
use std::cmp::Ordering;

// used to print out readable forms of a binding error
use std::fmt;

use crate::triple::{Id, Literal, Term, Triple};
use crate::variable::Renaming;

pub const DOES_NOT_UNIFY: &str = "Does not unify.";
pub const INCONSISTENT_BOUNDS: &str = "Inconsistent bounds.";
pub const INCONSISTENT_BOUNDS_CONSTRAINT: &str = "Couldn't add inconsistent bounds constraint.";
pub const DISJOINT_ENTITIES: &str = "Unification of disjoint entities.";
pub const DISEQUALITY_VIOLATION: &str = "Disequality violation.";

pub type TermHasher = BuildHasherDefault<SeaHasher>;
type TermMap<V> = HashMap<Term, V, TermHasher>;
type TermSet = BTreeSet<Term>;

// ------------- ordering -------------
/// Imposes an order on unifiers. Variables order by id and sort below every
/// constant. Equal constants are equal, and distinct constants are
/// incomparable, meaning they do not unify.
pub fn order_unifier(left: &Term, right: &Term) -> Option<Ordering> {
    match (left, right) {
        (Term::Var(l), Term::Var(r)) => Some(l.cmp(r)),
        (Term::Var(_), _) => Some(Ordering::Less),
        (_, Term::Var(_)) => Some(Ordering::Greater),
        (l, r) if l == r => Some(Ordering::Equal),
        _ => None,
    }
}

// Total within a single class, since a valid class holds at most one constant.
fn rank(term: &Term) -> (u8, u64) {
    match term {
        Term::Var(v) => (0, v.id()),
        _ => (1, 0),
    }
}

// ------------- BindingError -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingError {
    pub message: &'static str,
    pub left: Option<Term>,
    pub right: Option<Term>,
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)?;
        match (&self.left, &self.right) {
            (Some(l), Some(r)) => write!(f, " ({} / {})", l, r),
            (Some(t), None) | (None, Some(t)) => write!(f, " ({})", t),
            (None, None) => Ok(()),
        }
    }
}

// ------------- Binding -------------
#[derive(Debug, Clone, Default)]
pub struct Binding {
    error: Option<BindingError>,
    mapping: TermMap<Term>,
    attribute_constraints: TermMap<BTreeMap<Id, Term>>,
    bounds_by_lower: TermMap<TermSet>,
    bounds_by_upper: TermMap<TermSet>,
    lower_bounds: TermMap<Literal>,
    upper_bounds: TermMap<Literal>,
    disequalities: TermMap<TermSet>,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------- inspection -------------
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
    pub fn error(&self) -> Option<&BindingError> {
        self.error.as_ref()
    }
    /// Follows the union-find chain to the representative of the term.
    pub fn walk(&self, term: &Term) -> Term {
        let mut current = term;
        while let Some(next) = self.mapping.get(current) {
            current = next;
        }
        current.clone()
    }
    pub fn walk_triple(&self, triple: &Triple) -> Triple {
        Triple { e: self.walk(&triple.e), a: triple.a, v: self.walk(&triple.v) }
    }
    pub fn same(&self, left: &Term, right: &Term) -> bool {
        self.walk(left) == self.walk(right)
    }
    /// True when the two terms may never be unified. Distinct constants are
    /// always distinct; other classes only through a disequality.
    pub fn distinct(&self, left: &Term, right: &Term) -> bool {
        let (left, right) = (self.walk(left), self.walk(right));
        order_unifier(&left, &right).is_none()
            || self.disequalities.get(&left).is_some_and(|others| others.iter().any(|o| self.walk(o) == right))
    }
    pub fn lower_bound(&self, term: &Term) -> Option<Literal> {
        self.lower_of(&self.walk(term))
    }
    pub fn upper_bound(&self, term: &Term) -> Option<Literal> {
        self.upper_of(&self.walk(term))
    }
    /// The then-endpoint constrained on the term's class for the attribute.
    pub fn then_of(&self, term: &Term, attribute: Id) -> Option<Term> {
        self.attribute_constraints
            .get(&self.walk(term))
            .and_then(|m| m.get(&attribute))
            .map(|t| self.walk(t))
    }
    /// Every term that has been unified with something else.
    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.mapping.iter().flat_map(|(k, v)| [k, v])
    }
    /// True when every constraint and bounds key is the representative of its class.
    pub fn is_normalized(&self) -> bool {
        let is_rep = |t: &Term| !self.mapping.contains_key(t);
        self.attribute_constraints.keys().all(is_rep)
            && self.bounds_by_lower.keys().all(is_rep)
            && self.bounds_by_upper.keys().all(is_rep)
            && self.lower_bounds.keys().all(is_rep)
            && self.upper_bounds.keys().all(is_rep)
            && self.disequalities.keys().all(is_rep)
    }

    fn lower_of(&self, rep: &Term) -> Option<Literal> {
        match rep {
            Term::Lit(l) => Some(l.clone()),
            _ => self.lower_bounds.get(rep).cloned(),
        }
    }
    fn upper_of(&self, rep: &Term) -> Option<Literal> {
        match rep {
            Term::Lit(l) => Some(l.clone()),
            _ => self.upper_bounds.get(rep).cloned(),
        }
    }

    // ------------- composition -------------
    /// Returns an invalid copy of this binding carrying the given cause.
    pub fn poison(&self, message: &'static str, left: Option<Term>, right: Option<Term>) -> Binding {
        if !self.is_valid() {
            return self.clone();
        }
        let mut poisoned = self.clone();
        poisoned.error = Some(BindingError { message, left, right });
        poisoned
    }
    pub fn unify(&self, left: &Term, right: &Term) -> Binding {
        self.unify_all([(left.clone(), right.clone())])
    }
    pub fn unify_all(&self, pairs: impl IntoIterator<Item = (Term, Term)>) -> Binding {
        if !self.is_valid() {
            return self.clone();
        }
        let mut next = self.clone();
        next.unify_mut(pairs.into_iter().collect());
        next
    }
    pub fn unify_triple(&self, left: &Triple, right: &Triple) -> Binding {
        if !self.is_valid() {
            return self.clone();
        }
        if left.a != right.a {
            return self.poison(DOES_NOT_UNIFY, Some(Term::Id(left.a)), Some(Term::Id(right.a)));
        }
        self.unify_all([(left.e.clone(), right.e.clone()), (left.v.clone(), right.v.clone())])
    }
    pub fn attribute_constrained(&self, attribute: Id, if_unifier: &Term, then_unifier: &Term) -> Binding {
        if !self.is_valid() {
            return self.clone();
        }
        let mut next = self.clone();
        next.attribute_constrained_mut(attribute, if_unifier, then_unifier);
        next
    }
    pub fn constrain_bounds(&self, lower: &Term, upper: &Term) -> Binding {
        if !self.is_valid() {
            return self.clone();
        }
        let mut next = self.clone();
        next.constrain_bounds_mut(lower, upper);
        next
    }

    /// Forbids the two terms from ever being unified.
    pub fn constrain_distinct(&self, left: &Term, right: &Term) -> Binding {
        if !self.is_valid() {
            return self.clone();
        }
        let mut next = self.clone();
        next.constrain_distinct_mut(left, right);
        next
    }
    /// Pairwise disequalities between all of the terms.
    pub fn all_different(&self, terms: &[Term]) -> Binding {
        if !self.is_valid() {
            return self.clone();
        }
        let mut next = self.clone();
        for (i, left) in terms.iter().enumerate() {
            for right in &terms[i + 1..] {
                next.constrain_distinct_mut(left, right);
            }
        }
        next
    }

    /// Merges bindings into one that holds all their unifications and
    /// constraints. The first invalid input is returned as is.
    pub fn merge<'a>(bindings: impl IntoIterator<Item = &'a Binding>) -> Binding {
        let bindings: Vec<&Binding> = bindings.into_iter().collect();
        if let Some(invalid) = bindings.iter().find(|b| !b.is_valid()) {
            return (*invalid).clone();
        }
        let mut merged = Binding::new();
        for binding in &bindings {
            let pairs = binding.mapping.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            merged.unify_mut(pairs);
        }
        for binding in &bindings {
            for (left, others) in &binding.disequalities {
                for right in others {
                    merged.constrain_distinct_mut(left, right);
                }
            }
        }
        for binding in &bindings {
            for (if_unifier, constraints) in &binding.attribute_constraints {
                for (attribute, then_unifier) in constraints {
                    merged.attribute_constrained_mut(*attribute, if_unifier, then_unifier);
                }
            }
        }
        for binding in &bindings {
            for (lower, uppers) in &binding.bounds_by_lower {
                for upper in uppers {
                    merged.constrain_bounds_mut(lower, upper);
                }
            }
        }
        merged.normalize();
        merged
    }

    /// Substitutes variables. Only meant for renamings onto fresh variables
    /// that introduce no additional unification.
    pub fn rename(&self, renaming: &Renaming) -> Binding {
        if !self.is_valid() {
            return self.clone();
        }
        let substitute = |t: &Term| t.rename(renaming);

        let mut unions: TermMap<TermSet> = TermMap::default();
        for term in self.terms() {
            unions.entry(self.walk(term)).or_default().insert(term.clone());
        }
        for (replaced, replacer) in renaming {
            let replaced = Term::Var(replaced.clone());
            if let Some(union) = unions.get_mut(&self.walk(&replaced)) {
                if union.remove(&replaced) {
                    union.insert(Term::Var(replacer.clone()));
                }
            }
        }
        let mut renamed = Binding::new();
        for union in unions.values() {
            if let Some(rep) = union.iter().max_by_key(|t| rank(t)) {
                for member in union.iter().filter(|t| *t != rep) {
                    renamed.mapping.insert(member.clone(), rep.clone());
                }
            }
        }

        for (if_unifier, constraints) in &self.attribute_constraints {
            let key = renamed.walk(&substitute(if_unifier));
            let entry = renamed.attribute_constraints.entry(key).or_default();
            for (attribute, then_unifier) in constraints {
                entry.insert(*attribute, substitute(then_unifier));
            }
        }
        for (source, target) in [
            (&self.bounds_by_lower, &mut renamed.bounds_by_lower),
            (&self.bounds_by_upper, &mut renamed.bounds_by_upper),
            (&self.disequalities, &mut renamed.disequalities),
        ] {
            for (key, others) in source {
                let key = Self::walk_in(&renamed.mapping, &substitute(key));
                let entry = target.entry(key).or_default();
                entry.extend(others.iter().map(|o| Self::walk_in(&renamed.mapping, &substitute(o))));
            }
        }
        for (key, bound) in &self.lower_bounds {
            renamed.lower_bounds.insert(renamed.walk(&substitute(key)), bound.clone());
        }
        for (key, bound) in &self.upper_bounds {
            renamed.upper_bounds.insert(renamed.walk(&substitute(key)), bound.clone());
        }
        renamed
    }

    fn walk_in(mapping: &TermMap<Term>, term: &Term) -> Term {
        let mut current = term;
        while let Some(next) = mapping.get(current) {
            current = next;
        }
        current.clone()
    }

    // ------------- in-place operations -------------
    fn fail(&mut self, message: &'static str, left: &Term, right: &Term) {
        self.error = Some(BindingError { message, left: Some(left.clone()), right: Some(right.clone()) });
    }

    fn unify_mut(&mut self, mut queue: VecDeque<(Term, Term)>) {
        while let Some((u, v)) = queue.pop_front() {
            if !self.is_valid() {
                return;
            }
            let mut ru = self.walk(&u);
            let mut rv = self.walk(&v);
            match order_unifier(&ru, &rv) {
                None => return self.fail(DOES_NOT_UNIFY, &ru, &rv),
                Some(Ordering::Equal) => continue,
                Some(Ordering::Greater) => std::mem::swap(&mut ru, &mut rv),
                Some(Ordering::Less) => {}
            }
            // From here on ru < rv, so rv represents the joined class.
            if self.disequalities.get(&ru).is_some_and(|others| others.iter().any(|o| self.walk(o) == rv)) {
                return self.fail(DISEQUALITY_VIOLATION, &ru, &rv);
            }

            let mut absorbed = self.attribute_constraints.remove(&ru).unwrap_or_default();
            let mut kept = self.attribute_constraints.remove(&rv).unwrap_or_default();
            if absorbed.len() > kept.len() {
                std::mem::swap(&mut absorbed, &mut kept);
            }
            for (attribute, then_unifier) in absorbed {
                match kept.get(&attribute) {
                    Some(existing) => queue.push_back((then_unifier, existing.clone())),
                    None => {
                        kept.insert(attribute, then_unifier);
                    }
                }
            }
            if !kept.is_empty() {
                self.attribute_constraints.insert(rv.clone(), kept);
            }

            self.mapping.insert(ru.clone(), rv.clone());
            Self::rekey(&mut self.bounds_by_lower, &self.mapping, &ru, &rv);
            Self::rekey(&mut self.bounds_by_upper, &self.mapping, &ru, &rv);
            Self::rekey(&mut self.disequalities, &self.mapping, &ru, &rv);

            let lower = max_bound(self.lower_of(&ru), self.lower_of(&rv));
            let upper = min_bound(self.upper_of(&ru), self.upper_of(&rv));
            self.lower_bounds.remove(&ru);
            self.upper_bounds.remove(&ru);
            if let (Some(l), Some(h)) = (&lower, &upper) {
                if l > h {
                    return self.fail(INCONSISTENT_BOUNDS, &ru, &rv);
                }
            }
            if !matches!(rv, Term::Lit(_)) {
                if let Some(l) = lower {
                    self.lower_bounds.insert(rv.clone(), l);
                }
                if let Some(h) = upper {
                    self.upper_bounds.insert(rv.clone(), h);
                }
            }
            if !self.settle(&rv) {
                return self.fail(INCONSISTENT_BOUNDS, &ru, &rv);
            }
        }
    }

    // Moves the edges of `from` onto `to`, walking the other endpoints and
    // dropping edges that became loops.
    fn rekey(edges: &mut TermMap<TermSet>, mapping: &TermMap<Term>, from: &Term, to: &Term) {
        let Some(moved) = edges.remove(from) else { return };
        let mut joined = edges.remove(to).unwrap_or_default();
        joined.extend(moved);
        let joined: TermSet = joined
            .iter()
            .map(|t| Self::walk_in(mapping, t))
            .filter(|t| t != to)
            .collect();
        if !joined.is_empty() {
            edges.insert(to.clone(), joined);
        }
    }

    // Pushes the bounds of a representative to its neighbours along the edges.
    fn settle(&mut self, rep: &Term) -> bool {
        if let Some(lower) = self.lower_of(rep) {
            let uppers: Vec<Term> = self.bounds_by_lower.get(rep).into_iter().flatten().cloned().collect();
            for upper in uppers {
                if !self.propagate_lower(upper, &lower) {
                    return false;
                }
            }
        }
        if let Some(upper) = self.upper_of(rep) {
            let lowers: Vec<Term> = self.bounds_by_upper.get(rep).into_iter().flatten().cloned().collect();
            for lower in lowers {
                if !self.propagate_upper(lower, &upper) {
                    return false;
                }
            }
        }
        true
    }

    fn propagate_lower(&mut self, root: Term, bound: &Literal) -> bool {
        let mut work = vec![root];
        while let Some(term) = work.pop() {
            let current = self.walk(&term);
            if self.upper_of(&current).is_some_and(|upper| *bound > upper) {
                return false;
            }
            if self.lower_of(&current).is_none_or(|lower| *bound > lower) {
                // The bound has become tighter, so everything above has to move.
                work.extend(self.bounds_by_lower.get(&current).into_iter().flatten().cloned());
                self.lower_bounds.insert(current, bound.clone());
            }
        }
        true
    }

    fn propagate_upper(&mut self, root: Term, bound: &Literal) -> bool {
        let mut work = vec![root];
        while let Some(term) = work.pop() {
            let current = self.walk(&term);
            if self.lower_of(&current).is_some_and(|lower| lower > *bound) {
                return false;
            }
            if self.upper_of(&current).is_none_or(|upper| upper > *bound) {
                work.extend(self.bounds_by_upper.get(&current).into_iter().flatten().cloned());
                self.upper_bounds.insert(current, bound.clone());
            }
        }
        true
    }

    fn attribute_constrained_mut(&mut self, attribute: Id, if_unifier: &Term, then_unifier: &Term) {
        if !self.is_valid() {
            return;
        }
        let rep = self.walk(if_unifier);
        let existing = self.attribute_constraints.get(&rep).and_then(|m| m.get(&attribute)).cloned();
        match existing {
            Some(existing) => self.unify_mut(VecDeque::from([(existing, then_unifier.clone())])),
            None => {
                self.attribute_constraints.entry(rep).or_default().insert(attribute, then_unifier.clone());
            }
        }
    }

    fn constrain_distinct_mut(&mut self, left: &Term, right: &Term) {
        if !self.is_valid() {
            return;
        }
        let left_rep = self.walk(left);
        let right_rep = self.walk(right);
        if left_rep == right_rep {
            return self.fail(DISEQUALITY_VIOLATION, left, right);
        }
        self.disequalities.entry(left_rep.clone()).or_default().insert(right_rep.clone());
        self.disequalities.entry(right_rep).or_default().insert(left_rep);
    }

    fn constrain_bounds_mut(&mut self, lower: &Term, upper: &Term) {
        if !self.is_valid() {
            return;
        }
        let lower_rep = self.walk(lower);
        let upper_rep = self.walk(upper);
        if lower_rep == upper_rep {
            return;
        }
        self.bounds_by_lower.entry(lower_rep.clone()).or_default().insert(upper_rep.clone());
        self.bounds_by_upper.entry(upper_rep.clone()).or_default().insert(lower_rep.clone());

        let consistent = match self.upper_of(&upper_rep) {
            Some(bound) => self.propagate_upper(lower_rep.clone(), &bound),
            None => true,
        } && match self.lower_of(&lower_rep) {
            Some(bound) => self.propagate_lower(upper_rep.clone(), &bound),
            None => true,
        };
        if !consistent {
            self.fail(INCONSISTENT_BOUNDS_CONSTRAINT, lower, upper);
        }
    }

    // Re-applies every constraint whose key is no longer a representative.
    fn normalize(&mut self) {
        if !self.is_valid() || self.is_normalized() {
            return;
        }
        let stale: Vec<Term> = self
            .attribute_constraints
            .keys()
            .filter(|k| self.mapping.contains_key(*k))
            .cloned()
            .collect();
        for key in stale {
            if let Some(constraints) = self.attribute_constraints.remove(&key) {
                for (attribute, then_unifier) in constraints {
                    self.attribute_constrained_mut(attribute, &key, &then_unifier);
                }
            }
        }
        let stale: Vec<Term> = self
            .bounds_by_lower
            .keys()
            .chain(self.bounds_by_upper.keys())
            .filter(|k| self.mapping.contains_key(*k))
            .cloned()
            .collect();
        for key in stale {
            let uppers = self.bounds_by_lower.remove(&key).unwrap_or_default();
            let lowers = self.bounds_by_upper.remove(&key).unwrap_or_default();
            for upper in uppers {
                self.constrain_bounds_mut(&key, &upper);
            }
            for lower in lowers {
                self.constrain_bounds_mut(&lower, &key);
            }
        }
        let stale: Vec<Term> = self.disequalities.keys().filter(|k| self.mapping.contains_key(*k)).cloned().collect();
        for key in stale {
            for other in self.disequalities.remove(&key).unwrap_or_default() {
                self.constrain_distinct_mut(&key, &other);
            }
        }
        for bounds in [&mut self.lower_bounds, &mut self.upper_bounds] {
            bounds.retain(|k, _| !self.mapping.contains_key(k));
        }
    }

    // ------------- equality -------------
    fn canonical(&self) -> Canonical {
        let mut classes = BTreeSet::new();
        for term in self.terms() {
            let rep = self.walk(term);
            if &rep != term {
                classes.insert((term.clone(), rep));
            }
        }
        let constraints = self
            .attribute_constraints
            .iter()
            .map(|(k, m)| (self.walk(k), m.iter().map(|(a, t)| (*a, self.walk(t))).collect()))
            .filter(|(_, m): &(Term, BTreeMap<Id, Term>)| !m.is_empty())
            .collect();
        let edges = self
            .bounds_by_lower
            .iter()
            .flat_map(|(l, us)| us.iter().map(move |u| (l, u)))
            .map(|(l, u)| (self.walk(l), self.walk(u)))
            .filter(|(l, u)| l != u)
            .collect();
        let walked = |bounds: &TermMap<Literal>| {
            bounds.iter().map(|(k, b)| (self.walk(k), b.clone())).collect::<BTreeMap<_, _>>()
        };
        let disequalities = self
            .disequalities
            .iter()
            .flat_map(|(l, rs)| rs.iter().map(move |r| (l, r)))
            .map(|(l, r)| {
                let (l, r) = (self.walk(l), self.walk(r));
                if l < r { (l, r) } else { (r, l) }
            })
            .collect();
        Canonical {
            classes,
            constraints,
            edges,
            disequalities,
            lower: walked(&self.lower_bounds),
            upper: walked(&self.upper_bounds),
        }
    }
}

#[derive(PartialEq)]
struct Canonical {
    classes: BTreeSet<(Term, Term)>,
    constraints: BTreeMap<Term, BTreeMap<Id, Term>>,
    edges: BTreeSet<(Term, Term)>,
    disequalities: BTreeSet<(Term, Term)>,
    lower: BTreeMap<Term, Literal>,
    upper: BTreeMap<Term, Literal>,
}

/// Semantic equality: invalid bindings compare by their error, valid ones by
/// what they entail regardless of how it is stored.
impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        match (&self.error, &other.error) {
            (None, None) => self.canonical() == other.canonical(),
            (l, r) => l == r,
        }
    }
}

fn max_bound(a: Option<Literal>, b: Option<Literal>) -> Option<Literal> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn min_bound(a: Option<Literal>, b: Option<Literal>) -> Option<Literal> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
