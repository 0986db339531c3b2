//! Role-to-part authorization policy.
//!
//! # Invariants
//! - The mapping from part to authorized role is static.
//! - Email comparison is case-insensitive and ignores surrounding whitespace.
//! - Missing session always yields `SignInRequired`, regardless of pair.

use crate::model::part::PartName;
use crate::model::roster::{Role, RosterPair};

/// Effective access of one viewer to one part of one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartAccess {
    /// No authenticated session; nothing is shown.
    SignInRequired,
    /// Authenticated but not the part's role; fields render disabled.
    ReadOnly,
    /// Authenticated as the part's role.
    Editable,
}

impl PartAccess {
    pub fn can_edit(self) -> bool {
        matches!(self, Self::Editable)
    }

    pub fn can_view(self) -> bool {
        !matches!(self, Self::SignInRequired)
    }
}

/// Returns the role allowed to edit `part`.
pub fn role_for_part(part: PartName) -> Role {
    match part {
        PartName::Part1 => Role::Educator,
        PartName::Part2 | PartName::Part4 => Role::Evaluator,
        PartName::Part3 => Role::Resolution,
    }
}

/// Returns whether `email` is the editor of `part` on `pair`.
pub fn is_part_editor(pair: &RosterPair, part: PartName, email: &str) -> bool {
    let expected = pair.email_for(role_for_part(part)).trim();
    let actual = email.trim();
    !expected.is_empty() && expected.to_lowercase() == actual.to_lowercase()
}

/// Evaluates access for `viewer` (session email) on `part` of `pair`.
///
/// An unknown or unselected pair degrades to read-only for signed-in users.
pub fn evaluate_access(
    viewer: Option<&str>,
    pair: Option<&RosterPair>,
    part: PartName,
) -> PartAccess {
    let Some(email) = viewer.filter(|value| !value.trim().is_empty()) else {
        return PartAccess::SignInRequired;
    };
    match pair {
        Some(pair) if is_part_editor(pair, part, email) => PartAccess::Editable,
        _ => PartAccess::ReadOnly,
    }
}

#[cfg(test)]
mod tests {
    use super::{evaluate_access, role_for_part, PartAccess};
    use crate::model::part::PartName;
    use crate::model::roster::{Role, RosterPair};

    fn pair() -> RosterPair {
        RosterPair {
            pair_id: "P1".to_string(),
            educator_email: "a@x.org".to_string(),
            evaluator_email: "Eval@X.org".to_string(),
            resolution_email: "res@x.org".to_string(),
            ..RosterPair::default()
        }
    }

    #[test]
    fn mapping_matches_workflow_roles() {
        assert_eq!(role_for_part(PartName::Part1), Role::Educator);
        assert_eq!(role_for_part(PartName::Part2), Role::Evaluator);
        assert_eq!(role_for_part(PartName::Part3), Role::Resolution);
        assert_eq!(role_for_part(PartName::Part4), Role::Evaluator);
    }

    #[test]
    fn grants_edit_only_to_mapped_role_for_every_part() {
        let pair = pair();
        let viewers = ["a@x.org", "eval@x.org", "res@x.org", "b@x.org"];
        for part in PartName::ALL {
            for viewer in viewers {
                let expected = pair.email_for(role_for_part(part)).to_lowercase() == viewer;
                let access = evaluate_access(Some(viewer), Some(&pair), part);
                assert_eq!(access.can_edit(), expected, "{viewer} on {part}");
                assert!(access.can_view());
            }
        }
    }

    #[test]
    fn comparison_ignores_case() {
        assert_eq!(
            evaluate_access(Some("EVAL@x.ORG"), Some(&pair()), PartName::Part4),
            PartAccess::Editable
        );
    }

    #[test]
    fn missing_session_requires_sign_in() {
        assert_eq!(
            evaluate_access(None, Some(&pair()), PartName::Part1),
            PartAccess::SignInRequired
        );
        assert_eq!(
            evaluate_access(Some("  "), Some(&pair()), PartName::Part1),
            PartAccess::SignInRequired
        );
    }

    #[test]
    fn blank_role_email_never_matches() {
        let mut pair = pair();
        pair.resolution_email.clear();
        assert_eq!(
            evaluate_access(Some(""), Some(&pair), PartName::Part3),
            PartAccess::SignInRequired
        );
        assert_eq!(
            evaluate_access(Some("res@x.org"), Some(&pair), PartName::Part3),
            PartAccess::ReadOnly
        );
    }

    #[test]
    fn unknown_pair_is_read_only() {
        assert_eq!(
            evaluate_access(Some("a@x.org"), None, PartName::Part1),
            PartAccess::ReadOnly
        );
    }
}
