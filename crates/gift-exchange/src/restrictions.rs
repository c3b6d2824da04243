//! Directional giver restrictions.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Receivers each giver must not be assigned to.
///
/// Restrictions are directional: forbidding Alice from giving to Bob says
/// nothing about Bob giving to Alice. Use [`Restrictions::forbid_pair`] to
/// insert both directions.
///
/// # Example
///
/// ```
/// use gift_exchange::Restrictions;
///
/// let mut restrictions = Restrictions::new();
/// restrictions.forbid("Alice", "Bob");
///
/// assert!(restrictions.is_forbidden("Alice", "Bob"));
/// assert!(!restrictions.is_forbidden("Bob", "Alice"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Restrictions {
    by_giver: BTreeMap<String, BTreeSet<String>>,
}

impl Restrictions {
    /// Creates an empty restriction map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forbids `giver` from being assigned to `receiver`.
    pub fn forbid(&mut self, giver: impl Into<String>, receiver: impl Into<String>) {
        self.by_giver
            .entry(giver.into())
            .or_default()
            .insert(receiver.into());
    }

    /// Forbids `first` and `second` from being assigned to each other.
    pub fn forbid_pair(&mut self, first: &str, second: &str) {
        self.forbid(first, second);
        self.forbid(second, first);
    }

    /// Replaces every restriction for `giver`; an empty set clears the entry.
    pub fn set_for_giver<I, S>(&mut self, giver: impl Into<String>, receivers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let giver_name = giver.into();
        let set: BTreeSet<String> = receivers.into_iter().map(Into::into).collect();
        if set.is_empty() {
            self.by_giver.remove(&giver_name);
        } else {
            self.by_giver.insert(giver_name, set);
        }
    }

    /// Returns `true` if `giver` may not be assigned to `receiver`.
    #[must_use]
    pub fn is_forbidden(&self, giver: &str, receiver: &str) -> bool {
        self.by_giver
            .get(giver)
            .is_some_and(|receivers| receivers.contains(receiver))
    }

    /// Returns the receivers forbidden for `giver`, if any are recorded.
    #[must_use]
    pub fn for_giver(&self, giver: &str) -> Option<&BTreeSet<String>> {
        self.by_giver.get(giver)
    }

    /// Iterates over givers and their forbidden receivers in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.by_giver
            .iter()
            .map(|(giver, receivers)| (giver.as_str(), receivers))
    }

    /// Returns `true` if no restrictions are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_giver.is_empty()
    }

    /// Returns a copy keeping only entries where both names satisfy `keep`.
    ///
    /// Givers left with no receivers are dropped.
    #[must_use]
    pub fn retained<F>(&self, keep: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let by_giver = self
            .by_giver
            .iter()
            .filter(|(giver, _)| keep(giver))
            .filter_map(|(giver, receivers)| {
                let kept: BTreeSet<String> = receivers
                    .iter()
                    .filter(|receiver| keep(receiver))
                    .cloned()
                    .collect();
                (!kept.is_empty()).then(|| (giver.clone(), kept))
            })
            .collect();
        Self { by_giver }
    }

    /// Removes `name` both as a giver and as a receiver.
    pub fn remove_participant(&mut self, name: &str) {
        self.by_giver.remove(name);
        for receivers in self.by_giver.values_mut() {
            receivers.remove(name);
        }
        self.by_giver.retain(|_, receivers| !receivers.is_empty());
    }
}

impl<G, R> FromIterator<(G, R)> for Restrictions
where
    G: Into<String>,
    R: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (G, R)>>(iter: T) -> Self {
        let mut restrictions = Self::new();
        for (giver, receiver) in iter {
            restrictions.forbid(giver, receiver);
        }
        restrictions
    }
}
