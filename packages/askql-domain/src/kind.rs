use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// The three kinds of project knowledge that are embedded and retrieved independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
	Ddl,
	Documentation,
	Example,
}
impl Kind {
	pub const ALL: [Kind; 3] = [Kind::Ddl, Kind::Documentation, Kind::Example];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Ddl => "ddl",
			Self::Documentation => "documentation",
			Self::Example => "example",
		}
	}
}
impl fmt::Display for Kind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Kind {
	type Err = UnknownKind;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw {
			"ddl" => Ok(Self::Ddl),
			"documentation" | "doc" => Ok(Self::Documentation),
			"example" | "examples" => Ok(Self::Example),
			other => Err(UnknownKind(other.to_string())),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown knowledge kind {0:?}.")]
pub struct UnknownKind(pub String);
