//! Per-chat feedback calibration.
//!
//! The first verdict a user gives in a chat decides the feedback policy for the rest of the chat:
//! `correct` enables feedback and promotion, `incorrect` disables feedback for good and asks for a
//! regenerated query. `Enabled` and `Disabled` are absorbing.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackState {
	#[default]
	Unset,
	Enabled,
	Disabled,
}
impl FeedbackState {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Unset => "unset",
			Self::Enabled => "enabled",
			Self::Disabled => "disabled",
		}
	}

	/// Whether the UI should still ask the user to rate generated SQL.
	pub fn solicits_feedback(self) -> bool {
		!matches!(self, Self::Disabled)
	}

	/// Applies a verdict for a turn whose current flag is `turn`.
	///
	/// Repeating the verdict a turn already carries is a no-op. A conflicting verdict on a rated
	/// turn, or any new verdict on a disabled chat, is rejected.
	pub fn apply(self, turn: Correctness, verdict: Verdict) -> Result<Transition, TransitionError> {
		if turn == Correctness::from(verdict) {
			return Ok(Transition { from: self, to: self, record: false, regenerate: false });
		}
		if turn != Correctness::Unset {
			return Err(TransitionError::AlreadyRated { existing: turn });
		}

		match (self, verdict) {
			(Self::Unset, Verdict::Correct) =>
				Ok(Transition { from: self, to: Self::Enabled, record: true, regenerate: false }),
			(Self::Unset, Verdict::Incorrect) =>
				Ok(Transition { from: self, to: Self::Disabled, record: true, regenerate: true }),
			(Self::Enabled, _) =>
				Ok(Transition { from: self, to: Self::Enabled, record: true, regenerate: false }),
			(Self::Disabled, _) => Err(TransitionError::FeedbackDisabled),
		}
	}

	/// Promotion needs an enabled chat and a turn confirmed correct.
	pub fn check_promotion(self, turn: Correctness) -> Result<(), TransitionError> {
		if self != Self::Enabled {
			return Err(TransitionError::PromotionNotEnabled { state: self });
		}
		if turn != Correctness::Correct {
			return Err(TransitionError::PromotionNotCorrect { correctness: turn });
		}

		Ok(())
	}
}
impl fmt::Display for FeedbackState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for FeedbackState {
	type Err = UnknownLabel;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw {
			"unset" => Ok(Self::Unset),
			"enabled" => Ok(Self::Enabled),
			"disabled" => Ok(Self::Disabled),
			other => Err(UnknownLabel(other.to_string())),
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correctness {
	#[default]
	Unset,
	Correct,
	Incorrect,
}
impl Correctness {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Unset => "unset",
			Self::Correct => "correct",
			Self::Incorrect => "incorrect",
		}
	}
}
impl From<Verdict> for Correctness {
	fn from(verdict: Verdict) -> Self {
		match verdict {
			Verdict::Correct => Self::Correct,
			Verdict::Incorrect => Self::Incorrect,
		}
	}
}
impl fmt::Display for Correctness {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Correctness {
	type Err = UnknownLabel;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw {
			"unset" => Ok(Self::Unset),
			"correct" => Ok(Self::Correct),
			"incorrect" => Ok(Self::Incorrect),
			other => Err(UnknownLabel(other.to_string())),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
	Correct,
	Incorrect,
}
impl Verdict {
	pub fn from_is_correct(is_correct: bool) -> Self {
		if is_correct { Self::Correct } else { Self::Incorrect }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
	pub from: FeedbackState,
	pub to: FeedbackState,
	/// The verdict must be written to the turn.
	pub record: bool,
	/// SQL for the same question must be generated again and appended as a new turn.
	pub regenerate: bool,
}
impl Transition {
	pub fn changes_state(&self) -> bool {
		self.from != self.to
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
	#[error("Feedback is disabled for this chat.")]
	FeedbackDisabled,
	#[error("Turn was already rated {existing}.")]
	AlreadyRated { existing: Correctness },
	#[error("Promotion requires an enabled chat; chat is {state}.")]
	PromotionNotEnabled { state: FeedbackState },
	#[error("Promotion requires a turn rated correct; turn is {correctness}.")]
	PromotionNotCorrect { correctness: Correctness },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown label {0:?}.")]
pub struct UnknownLabel(pub String);
