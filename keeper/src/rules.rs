//! Ordered rule lists, evaluated either first-match (propagation strategies) or any-match
//! (rebuild selection).

pub trait Predicate<S: ?Sized> {
    type Error;

    fn holds(&self, subject: &S) -> Result<bool, Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule<P, A> {
    pub when: P,
    pub then: A,
}

/// The action of the first rule whose predicate holds. Later predicates are not evaluated.
pub fn first_match<'r, S, P, A>(
    rules: &'r [Rule<P, A>],
    subject: &S,
) -> Result<Option<&'r A>, P::Error>
where
    S: ?Sized,
    P: Predicate<S>,
{
    for rule in rules {
        if rule.when.holds(subject)? {
            return Ok(Some(&rule.then));
        }
    }
    Ok(None)
}

/// Whether any predicate holds, stopping at the first that does.
pub fn any_match<S, P>(predicates: &[P], subject: &S) -> Result<bool, P::Error>
where
    S: ?Sized,
    P: Predicate<S>,
{
    for predicate in predicates {
        if predicate.holds(subject)? {
            return Ok(true);
        }
    }
    Ok(false)
}
