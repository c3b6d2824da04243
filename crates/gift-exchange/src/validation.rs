//! Participant name rules and defensive draw input checks.
//!
//! Participant names double as keys in the session store (restrictions and
//! assignments are keyed by giver name), so they must be usable as document
//! keys.
//!
//! # Validation Rules
//!
//! - Length: 1 to 64 characters
//! - No leading or trailing whitespace
//! - None of `.`, `#`, `$`, `[`, `]`, `/`

use std::collections::BTreeSet;

use crate::error::DrawError;
use crate::restrictions::Restrictions;

/// Maximum allowed length for a participant name.
pub const PARTICIPANT_NAME_MAX: usize = 64;

/// Minimum number of participants accepted by a draw.
pub const MIN_PARTICIPANTS: usize = 3;

const RESERVED_KEY_CHARS: [char; 6] = ['.', '#', '$', '[', ']', '/'];

/// Validates a participant name against the store key constraints.
///
/// # Examples
///
/// ```
/// use gift_exchange::is_valid_participant_name;
///
/// assert!(is_valid_participant_name("Ada Lovelace"));
/// assert!(is_valid_participant_name("O'Brien"));
/// assert!(!is_valid_participant_name(""));
/// assert!(!is_valid_participant_name(" Ada"));      // Surrounding whitespace
/// assert!(!is_valid_participant_name("a.b"));       // Reserved key character
/// ```
#[must_use]
pub fn is_valid_participant_name(name: &str) -> bool {
    let length = name.chars().count();
    if !(1..=PARTICIPANT_NAME_MAX).contains(&length) {
        return false;
    }
    if name.trim() != name {
        return false;
    }
    !name.chars().any(is_reserved_key_char)
}

fn is_reserved_key_char(c: char) -> bool {
    RESERVED_KEY_CHARS.contains(&c) || c.is_control()
}

/// Checks draw inputs before any attempt is made.
///
/// Rejects lists below [`MIN_PARTICIPANTS`], duplicate names, and
/// restrictions that mention anyone outside the participant list.
pub(crate) fn validate_draw_inputs(
    participants: &[String],
    restrictions: &Restrictions,
) -> Result<(), DrawError> {
    if participants.len() < MIN_PARTICIPANTS {
        return Err(DrawError::InsufficientParticipants {
            count: participants.len(),
            minimum: MIN_PARTICIPANTS,
        });
    }

    let mut seen = BTreeSet::new();
    for name in participants {
        if !seen.insert(name.as_str()) {
            return Err(DrawError::DuplicateParticipant { name: name.clone() });
        }
    }

    for (giver, receivers) in restrictions.iter() {
        if !seen.contains(giver) {
            return Err(DrawError::UnknownRestrictionGiver {
                giver: giver.to_owned(),
            });
        }
        if let Some(receiver) = receivers.iter().find(|r| !seen.contains(r.as_str())) {
            return Err(DrawError::UnknownRestrictedReceiver {
                giver: giver.to_owned(),
                receiver: receiver.clone(),
            });
        }
    }

    Ok(())
}
