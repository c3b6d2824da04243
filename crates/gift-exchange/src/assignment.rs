//! Completed draw results.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::AssignmentViolation;
use crate::restrictions::Restrictions;

/// A complete giver-to-receiver mapping produced by one draw.
///
/// Values are built whole by the generator and never mutated afterwards;
/// presentation code reads single entries through
/// [`Assignments::receiver_for`].
///
/// # Example
///
/// ```
/// use gift_exchange::{Restrictions, generate_seeded_assignments};
///
/// let names = vec!["Alice".to_owned(), "Bob".to_owned(), "Carol".to_owned()];
/// let assignments =
///     generate_seeded_assignments(&names, &Restrictions::new(), 7).expect("draw");
///
/// let receiver = assignments.receiver_for("Alice").expect("Alice gives");
/// assert_ne!(receiver, "Alice");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assignments {
    by_giver: BTreeMap<String, String>,
}

impl Assignments {
    pub(crate) const fn from_map(by_giver: BTreeMap<String, String>) -> Self {
        Self { by_giver }
    }

    /// Returns the receiver assigned to `giver`.
    #[must_use]
    pub fn receiver_for(&self, giver: &str) -> Option<&str> {
        self.by_giver.get(giver).map(String::as_str)
    }

    /// Iterates over `(giver, receiver)` pairs in giver name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_giver
            .iter()
            .map(|(giver, receiver)| (giver.as_str(), receiver.as_str()))
    }

    /// Returns the number of givers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_giver.len()
    }

    /// Returns `true` if no assignments are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_giver.is_empty()
    }

    /// Checks every invariant a completed draw must satisfy.
    ///
    /// # Errors
    ///
    /// Returns the first [`AssignmentViolation`] found: a participant without
    /// an entry, an entry outside the participant list, a self-assignment, a
    /// restricted pair, or a receiver used twice.
    pub fn verify(
        &self,
        participants: &[String],
        restrictions: &Restrictions,
    ) -> Result<(), AssignmentViolation> {
        let known: BTreeSet<&str> = participants.iter().map(String::as_str).collect();

        if let Some(missing) = participants
            .iter()
            .find(|name| !self.by_giver.contains_key(name.as_str()))
        {
            return Err(AssignmentViolation::MissingGiver {
                giver: missing.clone(),
            });
        }

        let mut received = BTreeSet::new();
        for (giver, receiver) in self.iter() {
            if !known.contains(giver) {
                return Err(AssignmentViolation::UnknownGiver {
                    giver: giver.to_owned(),
                });
            }
            if !known.contains(receiver) {
                return Err(AssignmentViolation::UnknownReceiver {
                    giver: giver.to_owned(),
                    receiver: receiver.to_owned(),
                });
            }
            if giver == receiver {
                return Err(AssignmentViolation::SelfAssignment {
                    giver: giver.to_owned(),
                });
            }
            if restrictions.is_forbidden(giver, receiver) {
                return Err(AssignmentViolation::RestrictedPair {
                    giver: giver.to_owned(),
                    receiver: receiver.to_owned(),
                });
            }
            if !received.insert(receiver) {
                return Err(AssignmentViolation::DuplicateReceiver {
                    receiver: receiver.to_owned(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn names() -> Vec<String> {
        ["Alice", "Bob", "Carol"]
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    fn assignments(pairs: &[(&str, &str)]) -> Assignments {
        Assignments::from_map(
            pairs
                .iter()
                .map(|(g, r)| ((*g).to_owned(), (*r).to_owned()))
                .collect(),
        )
    }

    #[test]
    fn accepts_a_valid_cycle() {
        let cycle = assignments(&[("Alice", "Bob"), ("Bob", "Carol"), ("Carol", "Alice")]);
        assert_eq!(cycle.verify(&names(), &Restrictions::new()), Ok(()));
    }

    #[rstest]
    #[case::missing_giver(
        &[("Alice", "Bob"), ("Bob", "Alice")],
        AssignmentViolation::MissingGiver { giver: "Carol".to_owned() }
    )]
    #[case::unknown_giver(
        &[("Alice", "Bob"), ("Bob", "Carol"), ("Carol", "Alice"), ("Dave", "Alice")],
        AssignmentViolation::UnknownGiver { giver: "Dave".to_owned() }
    )]
    #[case::unknown_receiver(
        &[("Alice", "Zed"), ("Bob", "Carol"), ("Carol", "Alice")],
        AssignmentViolation::UnknownReceiver { giver: "Alice".to_owned(), receiver: "Zed".to_owned() }
    )]
    #[case::self_assignment(
        &[("Alice", "Alice"), ("Bob", "Carol"), ("Carol", "Bob")],
        AssignmentViolation::SelfAssignment { giver: "Alice".to_owned() }
    )]
    #[case::duplicate_receiver(
        &[("Alice", "Bob"), ("Bob", "Alice"), ("Carol", "Alice")],
        AssignmentViolation::DuplicateReceiver { receiver: "Alice".to_owned() }
    )]
    fn rejects_broken_maps(
        #[case] pairs: &[(&str, &str)],
        #[case] expected: AssignmentViolation,
    ) {
        let result = assignments(pairs).verify(&names(), &Restrictions::new());
        assert_eq!(result, Err(expected));
    }

    #[test]
    fn rejects_restricted_pair() {
        let cycle = assignments(&[("Alice", "Bob"), ("Bob", "Carol"), ("Carol", "Alice")]);
        let restrictions: Restrictions = [("Bob", "Carol")].into_iter().collect();

        assert_eq!(
            cycle.verify(&names(), &restrictions),
            Err(AssignmentViolation::RestrictedPair {
                giver: "Bob".to_owned(),
                receiver: "Carol".to_owned(),
            })
        );
    }

    #[test]
    fn serializes_keyed_by_giver() {
        let cycle = assignments(&[("Alice", "Bob"), ("Bob", "Carol"), ("Carol", "Alice")]);
        let json = serde_json::to_string(&cycle).expect("serialize");
        assert_eq!(json, r#"{"Alice":"Bob","Bob":"Carol","Carol":"Alice"}"#);
    }
}
