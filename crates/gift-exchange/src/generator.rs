//! Randomized retry construction of gift exchange assignments.
//!
//! Each attempt walks the givers in input order and picks a receiver
//! uniformly from whoever is still available, not the giver, and not
//! restricted for that giver. An attempt that strands a giver is abandoned
//! and the next one starts from a fresh pool. The search is greedy per
//! attempt, so results favour matchings reachable in the input order rather
//! than being uniform over every valid derangement.

use std::collections::BTreeMap;

use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::assignment::Assignments;
use crate::error::DrawError;
use crate::restrictions::Restrictions;
use crate::validation::validate_draw_inputs;

/// Default number of attempts before a draw is reported as unsatisfiable.
pub const DEFAULT_MAX_ATTEMPTS: usize = 1000;

/// Assignment generator with a configurable attempt budget.
///
/// # Example
///
/// ```
/// use gift_exchange::{AssignmentGenerator, Restrictions};
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
///
/// let names: Vec<String> = ["Alice", "Bob", "Carol", "Dave"]
///     .into_iter()
///     .map(str::to_owned)
///     .collect();
/// let mut restrictions = Restrictions::new();
/// restrictions.forbid("Alice", "Bob");
///
/// let generator = AssignmentGenerator::new().with_max_attempts(50);
/// let mut rng = ChaCha8Rng::seed_from_u64(2026);
/// let assignments = generator
///     .generate(&names, &restrictions, &mut rng)
///     .expect("draw succeeds");
///
/// assert_ne!(assignments.receiver_for("Alice"), Some("Bob"));
/// assert!(assignments.verify(&names, &restrictions).is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentGenerator {
    max_attempts: usize,
}

impl Default for AssignmentGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl AssignmentGenerator {
    /// Creates a generator using [`DEFAULT_MAX_ATTEMPTS`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Overrides the attempt budget.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Returns the attempt budget.
    #[must_use]
    pub const fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Generates a complete assignment or reports why none was produced.
    ///
    /// The inputs are only borrowed; each attempt drains its own copy of the
    /// receiver pool. Given the same random stream the output is identical.
    ///
    /// # Errors
    ///
    /// Returns [`DrawError::NoValidAssignmentFound`] when the budget runs out,
    /// and the other [`DrawError`] variants, without searching, when the
    /// inputs are malformed.
    pub fn generate<R>(
        &self,
        participants: &[String],
        restrictions: &Restrictions,
        rng: &mut R,
    ) -> Result<Assignments, DrawError>
    where
        R: Rng + ?Sized,
    {
        validate_draw_inputs(participants, restrictions)?;

        for attempt in 1..=self.max_attempts {
            if let Some(by_giver) = attempt_assignment(participants, restrictions, rng) {
                debug!(
                    attempt,
                    participant_count = participants.len(),
                    "assignment draw succeeded"
                );
                return Ok(Assignments::from_map(by_giver));
            }
        }

        warn!(
            max_attempts = self.max_attempts,
            participant_count = participants.len(),
            "assignment draw exhausted its attempt budget"
        );
        Err(DrawError::NoValidAssignmentFound {
            max_attempts: self.max_attempts,
        })
    }
}

/// Generates assignments with the default attempt budget.
///
/// # Errors
///
/// See [`AssignmentGenerator::generate`].
pub fn generate_assignments<R>(
    participants: &[String],
    restrictions: &Restrictions,
    rng: &mut R,
) -> Result<Assignments, DrawError>
where
    R: Rng + ?Sized,
{
    AssignmentGenerator::new().generate(participants, restrictions, rng)
}

/// Generates assignments from a `u64` seed.
///
/// The same seed and inputs always produce the same assignments.
///
/// # Errors
///
/// See [`AssignmentGenerator::generate`].
///
/// # Example
///
/// ```
/// use gift_exchange::{Restrictions, generate_seeded_assignments};
///
/// let names = vec!["Alice".to_owned(), "Bob".to_owned(), "Carol".to_owned()];
/// let first = generate_seeded_assignments(&names, &Restrictions::new(), 42).expect("draw");
/// let second = generate_seeded_assignments(&names, &Restrictions::new(), 42).expect("draw");
///
/// assert_eq!(first, second);
/// ```
pub fn generate_seeded_assignments(
    participants: &[String],
    restrictions: &Restrictions,
    seed: u64,
) -> Result<Assignments, DrawError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    generate_assignments(participants, restrictions, &mut rng)
}

/// Runs a single greedy attempt, returning `None` if a giver is stranded.
fn attempt_assignment<R>(
    participants: &[String],
    restrictions: &Restrictions,
    rng: &mut R,
) -> Option<BTreeMap<String, String>>
where
    R: Rng + ?Sized,
{
    let mut available: Vec<&str> = participants.iter().map(String::as_str).collect();
    let mut by_giver = BTreeMap::new();

    for giver in participants {
        let valid: Vec<&str> = available
            .iter()
            .copied()
            .filter(|receiver| {
                *receiver != giver.as_str() && !restrictions.is_forbidden(giver, receiver)
            })
            .collect();

        let receiver = *valid.choose(rng)?;
        let position = available.iter().position(|r| *r == receiver)?;
        available.remove(position);
        by_giver.insert(giver.clone(), receiver.to_owned());
    }

    Some(by_giver)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rand::RngCore;
    use rstest::{fixture, rstest};

    use super::*;

    fn names(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|n| (*n).to_owned()).collect()
    }

    #[fixture]
    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    /// Asserts the keys and values of `assignments` both equal `participants`.
    fn assert_bijection(assignments: &Assignments, participants: &[String]) {
        let expected: BTreeSet<&str> = participants.iter().map(String::as_str).collect();
        let givers: BTreeSet<&str> = assignments.iter().map(|(g, _)| g).collect();
        let mut receivers: Vec<&str> = assignments.iter().map(|(_, r)| r).collect();
        receivers.sort_unstable();
        let sorted: Vec<&str> = expected.iter().copied().collect();

        assert_eq!(givers, expected);
        assert_eq!(receivers, sorted);
    }

    #[rstest]
    fn three_participants_form_a_derangement(mut rng: ChaCha8Rng) {
        let participants = names(&["Alice", "Bob", "Carol"]);
        let assignments =
            generate_assignments(&participants, &Restrictions::new(), &mut rng).expect("draw");

        assert_bijection(&assignments, &participants);
        for (giver, receiver) in assignments.iter() {
            assert_ne!(giver, receiver);
        }
    }

    #[rstest]
    fn restricted_receiver_is_never_assigned(mut rng: ChaCha8Rng) {
        let participants = names(&["Alice", "Bob", "Carol", "Dave"]);
        let restrictions: Restrictions = [("Alice", "Bob")].into_iter().collect();

        for _ in 0..200 {
            let assignments =
                generate_assignments(&participants, &restrictions, &mut rng).expect("draw");
            assert_ne!(assignments.receiver_for("Alice"), Some("Bob"));
            assert_eq!(assignments.verify(&participants, &restrictions), Ok(()));
        }
    }

    #[rstest]
    fn unrestricted_draws_always_succeed(mut rng: ChaCha8Rng) {
        let participants = names(&["Alice", "Bob", "Carol", "Dave", "Erin"]);

        for _ in 0..1000 {
            let assignments = generate_assignments(&participants, &Restrictions::new(), &mut rng)
                .expect("unrestricted draw must succeed");
            assert_eq!(
                assignments.verify(&participants, &Restrictions::new()),
                Ok(())
            );
        }
    }

    #[rstest]
    fn giver_restricted_from_everyone_exhausts_budget(mut rng: ChaCha8Rng) {
        let participants = names(&["A", "B", "C"]);
        let restrictions: Restrictions = [("A", "B"), ("A", "C")].into_iter().collect();

        let result = generate_assignments(&participants, &restrictions, &mut rng);

        assert_eq!(
            result,
            Err(DrawError::NoValidAssignmentFound {
                max_attempts: DEFAULT_MAX_ATTEMPTS
            })
        );
    }

    #[rstest]
    fn below_minimum_fails_without_consuming_randomness() {
        let participants = names(&["Alice", "Bob"]);
        let mut untouched = ChaCha8Rng::seed_from_u64(9);
        let reference = ChaCha8Rng::seed_from_u64(9);

        let result = generate_assignments(&participants, &Restrictions::new(), &mut untouched);

        assert_eq!(
            result,
            Err(DrawError::InsufficientParticipants {
                count: 2,
                minimum: 3
            })
        );
        assert_eq!(untouched, reference);
    }

    #[test]
    fn zero_budget_reports_exhaustion() {
        let participants = names(&["Alice", "Bob", "Carol"]);
        let generator = AssignmentGenerator::new().with_max_attempts(0);

        let result = generator.generate(
            &participants,
            &Restrictions::new(),
            &mut ChaCha8Rng::seed_from_u64(1),
        );

        assert_eq!(
            result,
            Err(DrawError::NoValidAssignmentFound { max_attempts: 0 })
        );
    }

    #[test]
    fn seeded_generation_is_deterministic() {
        let participants = names(&["Alice", "Bob", "Carol", "Dave", "Erin", "Frank"]);
        let restrictions: Restrictions = [("Alice", "Bob"), ("Carol", "Dave")]
            .into_iter()
            .collect();

        let first = generate_seeded_assignments(&participants, &restrictions, 2026).expect("draw");
        let second = generate_seeded_assignments(&participants, &restrictions, 2026).expect("draw");

        assert_eq!(first, second);
    }

    /// Random source that always yields zero, so every choice takes index 0.
    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0);
        }
    }

    #[test]
    fn greedy_order_can_miss_an_existing_solution() {
        // Alice takes Bob and Bob takes Alice, stranding Carol on every
        // attempt even though Alice -> Carol -> Bob -> Alice is valid.
        let participants = names(&["Alice", "Bob", "Carol"]);
        let generator = AssignmentGenerator::new().with_max_attempts(10);

        let result = generator.generate(&participants, &Restrictions::new(), &mut ZeroRng);

        assert_eq!(
            result,
            Err(DrawError::NoValidAssignmentFound { max_attempts: 10 })
        );
    }

    #[test]
    fn zero_stream_follows_input_order() {
        let participants = names(&["Alice", "Bob", "Carol"]);
        let restrictions: Restrictions = [("Alice", "Bob")].into_iter().collect();

        let assignments =
            generate_assignments(&participants, &restrictions, &mut ZeroRng).expect("draw");

        assert_eq!(assignments.receiver_for("Alice"), Some("Carol"));
        assert_eq!(assignments.receiver_for("Bob"), Some("Alice"));
        assert_eq!(assignments.receiver_for("Carol"), Some("Bob"));
    }

    #[test]
    fn does_not_mutate_inputs() {
        let participants = names(&["Alice", "Bob", "Carol", "Dave"]);
        let restrictions: Restrictions = [("Alice", "Bob")].into_iter().collect();
        let participants_before = participants.clone();
        let restrictions_before = restrictions.clone();

        let assignments =
            generate_seeded_assignments(&participants, &restrictions, 5).expect("draw");

        assert_eq!(assignments.len(), participants.len());
        assert_eq!(participants, participants_before);
        assert_eq!(restrictions, restrictions_before);
    }

    #[test]
    fn reports_malformed_input_before_searching() {
        let participants = names(&["Alice", "Bob", "Bob"]);
        let result = generate_seeded_assignments(&participants, &Restrictions::new(), 1);

        assert_eq!(
            result,
            Err(DrawError::DuplicateParticipant {
                name: "Bob".to_owned()
            })
        );
    }
}
