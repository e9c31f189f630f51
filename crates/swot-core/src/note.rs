//! Note document and version store
//!
//! The note is the artifact training improves: an ordered list of question
//! types, each carrying tips the solver reads before answering. Edits are a
//! closed set of typed commands applied by one interpreter.
//!
//! # Invariants
//! - Every merge that changes the note produces a fresh [`VersionTag`]
//! - Merges apply to a clone and swap it in; readers never see a half-applied note

use crate::error::NoteEditError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, unique note version tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionTag(pub String);

impl VersionTag {
    /// Generate a fresh tag
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for VersionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A category of questions and the advice gathered for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionType {
    /// Stable id referenced by edits
    pub id: String,
    /// Display name
    pub name: String,
    /// How to recognise this kind of question
    pub description: String,
    /// Ordered solving tips
    #[serde(default)]
    pub tips: Vec<String>,
}

/// The note document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Question types in display order
    #[serde(default)]
    pub question_types: Vec<QuestionType>,
}

impl Note {
    /// Create an empty note
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a question type
    #[must_use]
    pub fn question_type(&self, id: &str) -> Option<&QuestionType> {
        self.question_types.iter().find(|qt| qt.id == id)
    }

    /// Total number of tips across question types
    #[must_use]
    pub fn tip_count(&self) -> usize {
        self.question_types.iter().map(|qt| qt.tips.len()).sum()
    }

    /// Whether the note holds nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.question_types.is_empty()
    }

    /// Render as markdown for display and oracle prompts
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for qt in &self.question_types {
            out.push_str("## ");
            out.push_str(&qt.name);
            out.push('\n');
            if !qt.description.is_empty() {
                out.push('\n');
                out.push_str(&qt.description);
                out.push('\n');
            }
            if !qt.tips.is_empty() {
                out.push('\n');
                for tip in &qt.tips {
                    out.push_str("- ");
                    out.push_str(tip);
                    out.push('\n');
                }
            }
            out.push('\n');
        }
        out
    }

    /// Apply one edit in place
    ///
    /// # Errors
    /// Returns `NoteEditError` when the edit does not fit the current note;
    /// the note is unchanged in that case.
    pub fn apply(&mut self, edit: &NoteEdit) -> Result<(), NoteEditError> {
        match edit {
            NoteEdit::CreateQuestionType {
                id,
                name,
                description,
            } => {
                if id.is_empty() {
                    return Err(NoteEditError::EmptyValue("id"));
                }
                if self.question_type(id).is_some() {
                    return Err(NoteEditError::QuestionTypeExists(id.clone()));
                }
                self.question_types.push(QuestionType {
                    id: id.clone(),
                    name: name.clone(),
                    description: description.clone(),
                    tips: Vec::new(),
                });
            }
            NoteEdit::UpdateQuestionType {
                id,
                name,
                description,
            } => {
                let qt = self.question_type_mut(id)?;
                if let Some(name) = name {
                    qt.name.clone_from(name);
                }
                if let Some(description) = description {
                    qt.description.clone_from(description);
                }
            }
            NoteEdit::DeleteQuestionType { id } => {
                let idx = self
                    .question_types
                    .iter()
                    .position(|qt| &qt.id == id)
                    .ok_or_else(|| NoteEditError::QuestionTypeNotFound(id.clone()))?;
                self.question_types.remove(idx);
            }
            NoteEdit::AppendTip {
                question_type_id,
                tip,
            } => {
                if tip.trim().is_empty() {
                    return Err(NoteEditError::EmptyValue("tip"));
                }
                self.question_type_mut(question_type_id)?.tips.push(tip.clone());
            }
            NoteEdit::UpdateTip {
                question_type_id,
                index,
                tip,
            } => {
                if tip.trim().is_empty() {
                    return Err(NoteEditError::EmptyValue("tip"));
                }
                let qt = self.question_type_mut(question_type_id)?;
                let len = qt.tips.len();
                let slot = qt.tips.get_mut(*index).ok_or_else(|| NoteEditError::TipOutOfRange {
                    question_type_id: question_type_id.clone(),
                    index: *index,
                    len,
                })?;
                slot.clone_from(tip);
            }
            NoteEdit::DeleteTip {
                question_type_id,
                index,
            } => {
                let qt = self.question_type_mut(question_type_id)?;
                if *index >= qt.tips.len() {
                    return Err(NoteEditError::TipOutOfRange {
                        question_type_id: question_type_id.clone(),
                        index: *index,
                        len: qt.tips.len(),
                    });
                }
                qt.tips.remove(*index);
            }
        }
        Ok(())
    }

    fn question_type_mut(&mut self, id: &str) -> Result<&mut QuestionType, NoteEditError> {
        self.question_types
            .iter_mut()
            .find(|qt| qt.id == id)
            .ok_or_else(|| NoteEditError::QuestionTypeNotFound(id.to_string()))
    }
}

/// Structural note edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum NoteEdit {
    /// Add a new question type with no tips
    CreateQuestionType {
        id: String,
        name: String,
        #[serde(default)]
        description: String,
    },
    /// Rename or re-describe a question type
    UpdateQuestionType {
        id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    /// Remove a question type and its tips
    DeleteQuestionType { id: String },
    /// Add a tip at the end of a question type
    AppendTip { question_type_id: String, tip: String },
    /// Replace the tip at `index`
    UpdateTip {
        question_type_id: String,
        index: usize,
        tip: String,
    },
    /// Remove the tip at `index`
    DeleteTip { question_type_id: String, index: usize },
}

/// Edits proposed by the critique oracle for one wrong answer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEditProposal {
    /// Edits in application order
    #[serde(default)]
    pub edits: Vec<NoteEdit>,
    /// Why the oracle proposes these edits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl NoteEditProposal {
    /// Create proposal from edits
    #[inline]
    #[must_use]
    pub fn new(edits: Vec<NoteEdit>) -> Self {
        Self {
            edits,
            rationale: None,
        }
    }

    /// With rationale
    #[inline]
    #[must_use]
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    /// Whether the proposal carries no edits
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

/// Result of merging one proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Edits that applied
    pub applied: usize,
    /// Edits that did not fit, with their position in the proposal
    pub rejected: Vec<(usize, NoteEditError)>,
    /// Whether a new version was produced
    pub version_changed: bool,
}

/// The current note and its version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteVersionStore {
    note: Note,
    version: VersionTag,
    revision: u64,
}

impl NoteVersionStore {
    /// Empty note at a fresh version
    #[must_use]
    pub fn new() -> Self {
        Self::with_note(Note::default())
    }

    /// Start from an existing note at a fresh version
    #[must_use]
    pub fn with_note(note: Note) -> Self {
        Self {
            note,
            version: VersionTag::generate(),
            revision: 0,
        }
    }

    /// Current note
    #[inline]
    #[must_use]
    pub fn note(&self) -> &Note {
        &self.note
    }

    /// Current version tag
    #[inline]
    #[must_use]
    pub fn version(&self) -> &VersionTag {
        &self.version
    }

    /// Number of versions produced since creation
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Merge a proposal: clone, apply each edit, swap in on change
    ///
    /// Edits that do not fit are skipped and reported; the remaining edits
    /// still apply in order, each seeing the result of the previous ones.
    pub fn merge(&mut self, proposal: &NoteEditProposal) -> MergeOutcome {
        let mut draft = self.note.clone();
        let mut applied = 0;
        let mut rejected = Vec::new();

        for (idx, edit) in proposal.edits.iter().enumerate() {
            match draft.apply(edit) {
                Ok(()) => applied += 1,
                Err(e) => {
                    tracing::warn!("Rejected note edit #{}: {}", idx, e);
                    rejected.push((idx, e));
                }
            }
        }

        let version_changed = applied > 0 && draft != self.note;
        if version_changed {
            self.replace(draft);
        }

        MergeOutcome {
            applied,
            rejected,
            version_changed,
        }
    }

    /// Replace the note wholesale under a fresh version
    pub fn replace(&mut self, note: Note) {
        self.note = note;
        self.version = VersionTag::generate();
        self.revision += 1;
    }
}

impl Default for NoteVersionStore {
    fn default() -> Self {
        Self::new()
    }
}
