//! Roster pair model and role lookup.

use serde::{Deserialize, Serialize};

/// Participant role within one roster pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Educator setting the goals.
    Educator,
    /// Evaluator reviewing goals and year-end outcomes.
    Evaluator,
    /// Resolution staff settling disagreements.
    Resolution,
}

impl Role {
    /// Stable lowercase label used in logs and UI envelopes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Educator => "educator",
            Self::Evaluator => "evaluator",
            Self::Resolution => "resolution",
        }
    }
}

/// One provisioned educator/evaluator/resolution triple.
///
/// Rows are provisioned administratively and never mutated by the record
/// controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterPair {
    pub pair_id: String,
    pub school_name: String,
    pub educator_email: String,
    pub educator_name: String,
    pub evaluator_email: String,
    pub evaluator_name: String,
    pub resolution_email: String,
    pub resolution_name: String,
}

impl RosterPair {
    /// Returns the email registered for `role` on this pair.
    pub fn email_for(&self, role: Role) -> &str {
        match role {
            Role::Educator => &self.educator_email,
            Role::Evaluator => &self.evaluator_email,
            Role::Resolution => &self.resolution_email,
        }
    }

    /// Returns the display name registered for `role`, falling back to the
    /// role title when blank.
    pub fn display_name_for(&self, role: Role) -> &str {
        let name = match role {
            Role::Educator => self.educator_name.trim(),
            Role::Evaluator => self.evaluator_name.trim(),
            Role::Resolution => self.resolution_name.trim(),
        };
        if !name.is_empty() {
            return name;
        }
        match role {
            Role::Educator => "Educator",
            Role::Evaluator => "Evaluator",
            Role::Resolution => "Resolution",
        }
    }

    /// Human-readable label for pair pickers.
    pub fn label(&self) -> String {
        format!(
            "{} (Educator) - {} (Evaluator) - {} (Resolution)",
            self.display_name_for(Role::Educator),
            self.display_name_for(Role::Evaluator),
            self.display_name_for(Role::Resolution),
        )
    }

    /// Roles `email` holds on this pair, compared case-insensitively.
    pub fn roles_of(&self, email: &str) -> Vec<Role> {
        let needle = email.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        [Role::Educator, Role::Evaluator, Role::Resolution]
            .into_iter()
            .filter(|role| self.email_for(*role).trim().to_lowercase() == needle)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Role, RosterPair};

    fn pair() -> RosterPair {
        RosterPair {
            pair_id: "P1".to_string(),
            educator_email: "Ed@X.org".to_string(),
            educator_name: "Ada".to_string(),
            evaluator_email: "ev@x.org".to_string(),
            resolution_email: "ev@x.org".to_string(),
            ..RosterPair::default()
        }
    }

    #[test]
    fn roles_of_matches_case_insensitively() {
        assert_eq!(pair().roles_of(" ed@x.ORG "), vec![Role::Educator]);
        assert_eq!(
            pair().roles_of("ev@x.org"),
            vec![Role::Evaluator, Role::Resolution]
        );
        assert!(pair().roles_of("").is_empty());
    }

    #[test]
    fn label_falls_back_to_role_titles() {
        assert_eq!(
            pair().label(),
            "Ada (Educator) - Evaluator (Evaluator) - Resolution (Resolution)"
        );
    }
}
