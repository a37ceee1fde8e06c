//! Outcome values and the coercion lattice between result types.

// self
use crate::{_prelude::*, model::UnknownValue};

/// Result value types understood by outcomes services.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeType {
	/// Number in `[0, 1]`.
	#[default]
	Decimal,
	/// Number in `[0, 100]`, optionally suffixed with `%`.
	Percentage,
	/// `numerator/denominator`.
	Ratio,
	/// Letter grade A-F.
	#[serde(rename = "letteraf")]
	LetterAf,
	/// Letter grade A-F with `+`/`-`.
	#[serde(rename = "letterafplus")]
	LetterAfPlus,
	/// Free text.
	#[serde(rename = "freetext")]
	FreeText,
}
impl OutcomeType {
	/// Returns the wire name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Decimal => "decimal",
			Self::Percentage => "percentage",
			Self::Ratio => "ratio",
			Self::LetterAf => "letteraf",
			Self::LetterAfPlus => "letterafplus",
			Self::FreeText => "freetext",
		}
	}
}
impl Display for OutcomeType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for OutcomeType {
	type Err = UnknownValue;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"decimal" => Ok(Self::Decimal),
			"percentage" => Ok(Self::Percentage),
			"ratio" => Ok(Self::Ratio),
			"letteraf" => Ok(Self::LetterAf),
			"letterafplus" => Ok(Self::LetterAfPlus),
			"freetext" => Ok(Self::FreeText),
			_ => Err(UnknownValue { vocabulary: "result type", value: s.to_owned() }),
		}
	}
}

/// Reasons an outcome cannot be expressed in any supported type.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CoercionError {
	/// Value is not a percentage in `[0, 100]`.
	#[error("`{0}` is not a percentage between 0 and 100.")]
	Percentage(String),
	/// Value is not a ratio with non-negative numerator and positive denominator.
	#[error("`{0}` is not a valid ratio.")]
	Ratio(String),
	/// Free text is neither a decimal in `[0, 1]` nor a percentage.
	#[error("`{0}` cannot be converted to a numeric result.")]
	FreeText(String),
	/// No supported type can carry the value.
	#[error("Result type {kind} is not supported by the platform.")]
	Unsupported {
		/// Source type.
		kind: OutcomeType,
	},
}

/// Result value reported to, or read from, a platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
	/// Textual value; `None` for reads and deletes.
	pub value: Option<String>,
	/// Type of `value`.
	pub kind: OutcomeType,
	/// Language of `value`.
	pub language: String,
	/// Status of the result (for example `final`).
	pub status: Option<String>,
	/// Date the result was recorded.
	pub date: Option<String>,
	/// Identifier of the grading source.
	pub data_source: Option<String>,
}
impl Outcome {
	/// Default outcome language.
	pub const DEFAULT_LANGUAGE: &'static str = "en-US";

	/// Creates a decimal outcome.
	pub fn new(value: impl Into<String>) -> Self {
		Self::typed(value, OutcomeType::Decimal)
	}

	/// Creates an outcome of the given type.
	pub fn typed(value: impl Into<String>, kind: OutcomeType) -> Self {
		Self { value: Some(value.into()), kind, ..Self::empty() }
	}

	/// Creates a valueless outcome used for reads and deletes.
	pub fn empty() -> Self {
		Self {
			value: None,
			kind: OutcomeType::Decimal,
			language: Self::DEFAULT_LANGUAGE.into(),
			status: None,
			date: None,
			data_source: None,
		}
	}

	/// Converts the outcome into a type from `supported`, leaving `self` untouched.
	pub fn coerce(&self, supported: &[OutcomeType]) -> Result<Outcome, CoercionError> {
		let Some(value) = self.value.as_deref().filter(|v| !v.is_empty()) else {
			return Ok(self.clone());
		};

		if supported.contains(&self.kind) {
			return Ok(self.clone());
		}

		let supports = |kind| supported.contains(&kind);
		let (value, kind) = match self.kind {
			OutcomeType::Percentage => {
				let fraction = percentage(value)
					.ok_or_else(|| CoercionError::Percentage(value.to_owned()))?;

				(fraction.to_string(), OutcomeType::Decimal)
			},
			OutcomeType::Ratio => {
				let fraction = ratio(value).ok_or_else(|| CoercionError::Ratio(value.to_owned()))?;

				(fraction.to_string(), OutcomeType::Decimal)
			},
			OutcomeType::LetterAf if supports(OutcomeType::LetterAfPlus) =>
				(value.to_owned(), OutcomeType::LetterAfPlus),
			OutcomeType::LetterAfPlus
				if supports(OutcomeType::LetterAf) && value.chars().count() == 1 =>
				(value.to_owned(), OutcomeType::LetterAf),
			OutcomeType::LetterAf | OutcomeType::LetterAfPlus if supports(OutcomeType::FreeText) =>
				(value.to_owned(), OutcomeType::FreeText),
			OutcomeType::FreeText => match number(value) {
				Some(n) if (0.0..=1.0).contains(&n) => (value.to_owned(), OutcomeType::Decimal),
				_ => {
					let fraction = value
						.strip_suffix('%')
						.and_then(percentage)
						.ok_or_else(|| CoercionError::FreeText(value.to_owned()))?;

					if supports(OutcomeType::Percentage) {
						(value.to_owned(), OutcomeType::Percentage)
					} else {
						(fraction.to_string(), OutcomeType::Decimal)
					}
				},
			},
			kind => return Err(CoercionError::Unsupported { kind }),
		};

		Ok(Outcome { value: Some(value), kind, ..self.clone() })
	}
}
impl Default for Outcome {
	fn default() -> Self {
		Self::empty()
	}
}

fn number(raw: &str) -> Option<f64> {
	raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn percentage(raw: &str) -> Option<f64> {
	let raw = raw.trim();
	let n = number(raw.strip_suffix('%').unwrap_or(raw))?;

	(0.0..=100.0).contains(&n).then_some(n / 100.0)
}

fn ratio(raw: &str) -> Option<f64> {
	let (numerator, denominator) = raw.split_once('/')?;
	let numerator = number(numerator)?;
	let denominator = number(denominator)?;

	(numerator >= 0.0 && denominator > 0.0).then_some(numerator / denominator)
}
