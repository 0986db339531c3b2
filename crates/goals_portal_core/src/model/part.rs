//! Part record model.
//!
//! # Responsibility
//! - Define the four part names and the per-part field groups.
//! - Provide merge, normalization and validation helpers used by the store
//!   and the record controller.
//!
//! # Invariants
//! - One record per `(pair_id, part_name)`.
//! - A record only carries fields owned by its own part.
//! - Blank text is equivalent to an unset field after normalization.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Number of goal slots carried by goal-oriented parts.
pub const GOAL_SLOTS: usize = 3;

/// Maximum characters accepted for one text field.
pub const MAX_TEXT_CHARS: usize = 10_000;

/// One of the four sequential sections of an evaluation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PartName {
    Part1,
    Part2,
    Part3,
    Part4,
}

impl PartName {
    /// All parts in workflow order.
    pub const ALL: [PartName; 4] = [Self::Part1, Self::Part2, Self::Part3, Self::Part4];

    /// Stable storage/wire value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Part1 => "Part1",
            Self::Part2 => "Part2",
            Self::Part3 => "Part3",
            Self::Part4 => "Part4",
        }
    }

    /// Parses a storage/wire value. Exact match only.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Part1" => Some(Self::Part1),
            "Part2" => Some(Self::Part2),
            "Part3" => Some(Self::Part3),
            "Part4" => Some(Self::Part4),
            _ => None,
        }
    }
}

impl Display for PartName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Year-end attainment status for one goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttainmentStatus {
    Met,
    PartiallyMet,
    NotMet,
}

impl AttainmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Met => "met",
            Self::PartiallyMet => "partially_met",
            Self::NotMet => "not_met",
        }
    }
}

/// Part1 goal box.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalSlot {
    pub goal_statement: Option<String>,
    pub why_goal: Option<String>,
    pub measure: Option<String>,
    pub why_measure: Option<String>,
    pub monitoring_plan: Option<String>,
    pub success_criteria: Option<String>,
    pub timeline: Option<String>,
}

impl GoalSlot {
    fn text_fields(&self) -> [(&'static str, &Option<String>); 7] {
        [
            ("goal_statement", &self.goal_statement),
            ("why_goal", &self.why_goal),
            ("measure", &self.measure),
            ("why_measure", &self.why_measure),
            ("monitoring_plan", &self.monitoring_plan),
            ("success_criteria", &self.success_criteria),
            ("timeline", &self.timeline),
        ]
    }

    fn text_fields_mut(&mut self) -> [&mut Option<String>; 7] {
        [
            &mut self.goal_statement,
            &mut self.why_goal,
            &mut self.measure,
            &mut self.why_measure,
            &mut self.monitoring_plan,
            &mut self.success_criteria,
            &mut self.timeline,
        ]
    }
}

/// Part2 evaluator box for one goal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalReview {
    pub feedback: Option<String>,
    pub revised_goal: Option<String>,
}

/// Flexible, mostly-optional field set of a part record.
///
/// All parts share one shape so partial updates can be expressed as another
/// `PartFields` value; `validate_for` rejects values owned by other parts.
///
/// Goal arrays may be given with fewer than `GOAL_SLOTS` entries; missing
/// trailing slots are left unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartFields {
    // Part1
    #[serde(deserialize_with = "goal_slots")]
    pub goals: [GoalSlot; GOAL_SLOTS],
    // Part2
    pub conversation_summary: Option<String>,
    pub key_evidence: Option<String>,
    pub p2_choice: Option<String>,
    #[serde(deserialize_with = "goal_slots")]
    pub goal_reviews: [GoalReview; GOAL_SLOTS],
    // Part3
    pub resolution_decision: Option<String>,
    pub resolution_rationale: Option<String>,
    // Part4
    pub outcome_summary: Option<String>,
    pub goal_evidence: Option<String>,
    #[serde(deserialize_with = "goal_slots")]
    pub goal_attainment: [Option<AttainmentStatus>; GOAL_SLOTS],
    /// Patch-only: attainment slots to unset on `merge`. Never stored.
    #[serde(skip_serializing_if = "no_slot_marked", deserialize_with = "goal_slots")]
    pub clear_attainment: [bool; GOAL_SLOTS],
}

/// One flattened field, as exported and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEntry {
    /// Part owning this field.
    pub part: PartName,
    /// Flat column name (`goal_statement1`, `p2_choice`, ...).
    pub column: String,
    pub value: Option<String>,
}

impl PartFields {
    /// Returns goal slot `index` (zero-based), if in range.
    pub fn goal(&self, index: usize) -> Option<&GoalSlot> {
        self.goals.get(index)
    }

    /// Returns mutable goal slot `index` (zero-based), if in range.
    pub fn goal_mut(&mut self, index: usize) -> Option<&mut GoalSlot> {
        self.goals.get_mut(index)
    }

    /// Overlays every field set in `patch` onto `self`.
    ///
    /// Unset fields in `patch` leave the current value untouched. Clearing a
    /// text field is expressed with an empty string, which normalization
    /// turns into an unset value. Attainment slots are cleared through
    /// `clear_attainment`.
    pub fn merge(&mut self, patch: &PartFields) {
        for (target, source) in self.goals.iter_mut().zip(patch.goals.iter()) {
            for (slot, value) in target
                .text_fields_mut()
                .into_iter()
                .zip(source.text_fields().into_iter())
            {
                overlay(slot, value.1);
            }
        }
        overlay(&mut self.conversation_summary, &patch.conversation_summary);
        overlay(&mut self.key_evidence, &patch.key_evidence);
        overlay(&mut self.p2_choice, &patch.p2_choice);
        for (target, source) in self.goal_reviews.iter_mut().zip(patch.goal_reviews.iter()) {
            overlay(&mut target.feedback, &source.feedback);
            overlay(&mut target.revised_goal, &source.revised_goal);
        }
        overlay(&mut self.resolution_decision, &patch.resolution_decision);
        overlay(&mut self.resolution_rationale, &patch.resolution_rationale);
        overlay(&mut self.outcome_summary, &patch.outcome_summary);
        overlay(&mut self.goal_evidence, &patch.goal_evidence);
        for ((target, source), clear) in self
            .goal_attainment
            .iter_mut()
            .zip(patch.goal_attainment.iter())
            .zip(patch.clear_attainment)
        {
            if clear {
                *target = None;
            } else {
                overlay(target, source);
            }
        }
    }

    /// Trims every text value and unsets blank ones. Drops any clear marks.
    pub fn normalize(&mut self) {
        self.clear_attainment = [false; GOAL_SLOTS];
        for goal in &mut self.goals {
            for slot in goal.text_fields_mut() {
                normalize_text(slot);
            }
        }
        for review in &mut self.goal_reviews {
            normalize_text(&mut review.feedback);
            normalize_text(&mut review.revised_goal);
        }
        for slot in [
            &mut self.conversation_summary,
            &mut self.key_evidence,
            &mut self.p2_choice,
            &mut self.resolution_decision,
            &mut self.resolution_rationale,
            &mut self.outcome_summary,
            &mut self.goal_evidence,
        ] {
            normalize_text(slot);
        }
    }

    /// Returns whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.entries().iter().all(|entry| entry.value.is_none())
    }

    /// Flattens all fields in stable column order.
    pub fn entries(&self) -> Vec<FieldEntry> {
        let mut entries = Vec::new();
        for (index, goal) in self.goals.iter().enumerate() {
            for (name, value) in goal.text_fields() {
                push_entry(&mut entries, PartName::Part1, name, Some(index), value.clone());
            }
        }
        push_entry(
            &mut entries,
            PartName::Part2,
            "conversation_summary",
            None,
            self.conversation_summary.clone(),
        );
        push_entry(
            &mut entries,
            PartName::Part2,
            "key_evidence",
            None,
            self.key_evidence.clone(),
        );
        push_entry(
            &mut entries,
            PartName::Part2,
            "p2_choice",
            None,
            self.p2_choice.clone(),
        );
        for (index, review) in self.goal_reviews.iter().enumerate() {
            push_entry(
                &mut entries,
                PartName::Part2,
                "goal_feedback",
                Some(index),
                review.feedback.clone(),
            );
            push_entry(
                &mut entries,
                PartName::Part2,
                "revised_goal",
                Some(index),
                review.revised_goal.clone(),
            );
        }
        push_entry(
            &mut entries,
            PartName::Part3,
            "resolution_decision",
            None,
            self.resolution_decision.clone(),
        );
        push_entry(
            &mut entries,
            PartName::Part3,
            "resolution_rationale",
            None,
            self.resolution_rationale.clone(),
        );
        push_entry(
            &mut entries,
            PartName::Part4,
            "outcome_summary",
            None,
            self.outcome_summary.clone(),
        );
        push_entry(
            &mut entries,
            PartName::Part4,
            "goal_evidence",
            None,
            self.goal_evidence.clone(),
        );
        for (index, status) in self.goal_attainment.iter().enumerate() {
            push_entry(
                &mut entries,
                PartName::Part4,
                "goal_attainment",
                Some(index),
                status.map(|value| value.as_str().to_string()),
            );
        }
        entries
    }

    /// Checks that only fields owned by `part` are set and text stays within
    /// `MAX_TEXT_CHARS`.
    pub fn validate_for(&self, part: PartName) -> Result<(), PartValidationError> {
        if part != PartName::Part4 {
            if let Some(index) = self.clear_attainment.iter().position(|clear| *clear) {
                return Err(PartValidationError::FieldNotInPart {
                    column: format!("goal_attainment{}", index + 1),
                    part,
                });
            }
        }
        for entry in self.entries() {
            let Some(value) = entry.value.as_deref() else {
                continue;
            };
            if entry.part != part {
                return Err(PartValidationError::FieldNotInPart {
                    column: entry.column,
                    part,
                });
            }
            if value.chars().count() > MAX_TEXT_CHARS {
                return Err(PartValidationError::TextTooLong {
                    column: entry.column,
                    max_chars: MAX_TEXT_CHARS,
                });
            }
        }
        Ok(())
    }
}

/// Part record keyed by `(pair_id, part_name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartRecord {
    pub pair_id: String,
    pub part_name: PartName,
    pub fields: PartFields,
    /// Epoch milliseconds of the last store write. `None` until persisted.
    pub updated_at: Option<i64>,
    /// Normalized email of the last writer.
    pub updated_by: Option<String>,
}

impl PartRecord {
    /// Creates the conceptual empty record used before the first save.
    pub fn empty(pair_id: impl Into<String>, part_name: PartName) -> Self {
        Self {
            pair_id: pair_id.into(),
            part_name,
            fields: PartFields::default(),
            updated_at: None,
            updated_by: None,
        }
    }

    /// Returns whether this record came from the store.
    pub fn is_persisted(&self) -> bool {
        self.updated_at.is_some()
    }

    /// Validates identifiers and field ownership.
    pub fn validate(&self) -> Result<(), PartValidationError> {
        if self.pair_id.trim().is_empty() {
            return Err(PartValidationError::BlankPairId);
        }
        self.fields.validate_for(self.part_name)
    }
}

/// Validation failures for part records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartValidationError {
    BlankPairId,
    FieldNotInPart { column: String, part: PartName },
    TextTooLong { column: String, max_chars: usize },
}

impl Display for PartValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankPairId => write!(f, "pair_id must not be blank"),
            Self::FieldNotInPart { column, part } => {
                write!(f, "field `{column}` does not belong to {part}")
            }
            Self::TextTooLong { column, max_chars } => {
                write!(f, "field `{column}` exceeds {max_chars} characters")
            }
        }
    }
}

impl Error for PartValidationError {}

fn overlay<T: Clone>(target: &mut Option<T>, patch: &Option<T>) {
    if let Some(value) = patch {
        *target = Some(value.clone());
    }
}

fn no_slot_marked(marks: &[bool; GOAL_SLOTS]) -> bool {
    !marks.iter().any(|mark| *mark)
}

fn goal_slots<'de, D, T>(deserializer: D) -> Result<[T; GOAL_SLOTS], D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let values = Vec::<T>::deserialize(deserializer)?;
    if values.len() > GOAL_SLOTS {
        return Err(D::Error::invalid_length(values.len(), &"at most 3 goal slots"));
    }
    let mut slots: [T; GOAL_SLOTS] = Default::default();
    for (slot, value) in slots.iter_mut().zip(values) {
        *slot = value;
    }
    Ok(slots)
}

fn normalize_text(slot: &mut Option<String>) {
    *slot = slot
        .take()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
}

fn push_entry(
    entries: &mut Vec<FieldEntry>,
    part: PartName,
    name: &str,
    slot: Option<usize>,
    value: Option<String>,
) {
    // Flat columns number goal slots from 1.
    let column = match slot {
        Some(index) => format!("{name}{}", index + 1),
        None => name.to_string(),
    };
    entries.push(FieldEntry {
        part,
        column,
        value,
    });
}
