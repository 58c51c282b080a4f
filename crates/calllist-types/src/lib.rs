/// Validation failures for the text primitives in this crate.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// Nothing left after trimming
    #[error("Text cannot be empty")]
    Empty,
    /// Interior whitespace in a value that must be a single token
    #[error("Text cannot contain whitespace")]
    ContainsWhitespace,
    /// The input did not name a known call outcome
    #[error("Unknown call outcome: {0}")]
    UnknownOutcome(String),
}

/// Free text that is known to hold at least one visible character.
///
/// Used for patient names and actor identifiers, where a blank value would
/// be meaningless. Construction trims the input; what is stored is the
/// trimmed form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Trims `input` and wraps it.
    ///
    /// # Errors
    ///
    /// [`TextError::Empty`] when the input is empty or whitespace-only.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// The validated text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// An organisational partition of the call list.
///
/// Every patient belongs to exactly one line (e.g. `main`, `spanish`, `VA`)
/// and worklist queries are always scoped to a single line. The code is
/// trimmed during construction and must be a single non-empty token; case is
/// preserved, and comparisons are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Line(String);

impl Line {
    /// Creates a new `Line` from a partition code.
    ///
    /// # Returns
    ///
    /// Returns `Err(TextError::Empty)` for empty/whitespace-only input and
    /// `Err(TextError::ContainsWhitespace)` if the trimmed code contains
    /// interior whitespace.
    pub fn new(code: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = code.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(TextError::ContainsWhitespace);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the partition code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Line {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Line {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Line::new(s)
    }
}

impl serde::Serialize for Line {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Line {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Line::new(&s).map_err(serde::de::Error::custom)
    }
}

/// The resolution a staff member records after attempting a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    /// Spoke with the patient
    Reached,
    /// Left a voicemail for the patient
    Voicemail,
    /// Could not reach the patient and left no message
    NotReached,
}

impl CallOutcome {
    /// Returns the snake_case code used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Reached => "reached",
            CallOutcome::Voicemail => "voicemail",
            CallOutcome::NotReached => "not_reached",
        }
    }
}

impl std::fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CallOutcome {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "reached" => Ok(CallOutcome::Reached),
            "voicemail" => Ok(CallOutcome::Voicemail),
            "not_reached" => Ok(CallOutcome::NotReached),
            other => Err(TextError::UnknownOutcome(other.to_owned())),
        }
    }
}
