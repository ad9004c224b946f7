//! Typed options describing how schema fields are indexed and stored.

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Indexing mode for a text field.
///
/// The variants are strictly ordered from no indexing at all to full
/// positional indexing; [`TextOptions`] ordering follows this.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TextIndexing {
    /// Not indexed.
    #[default]
    Unindexed,
    /// Indexed as a single term, no tokenization.
    Untokenized,
    /// Tokenized, term frequencies not recorded.
    TokenizedNoFreq,
    /// Tokenized with term frequencies.
    TokenizedWithFreq,
    /// Tokenized with term frequencies and positions.
    TokenizedWithFreqAndPosition,
}

impl TextIndexing {
    /// Whether the field is indexed at all.
    pub fn is_indexed(&self) -> bool {
        *self != TextIndexing::Unindexed
    }

    /// Whether the field's text is tokenized.
    pub fn is_tokenized(&self) -> bool {
        matches!(
            self,
            TextIndexing::TokenizedNoFreq
                | TextIndexing::TokenizedWithFreq
                | TextIndexing::TokenizedWithFreqAndPosition
        )
    }

    /// Whether term frequencies are recorded.
    pub fn is_termfreq_enabled(&self) -> bool {
        matches!(
            self,
            TextIndexing::TokenizedWithFreq | TextIndexing::TokenizedWithFreqAndPosition
        )
    }

    /// Whether token positions are recorded.
    pub fn is_position_enabled(&self) -> bool {
        *self == TextIndexing::TokenizedWithFreqAndPosition
    }

    /// Canonical string label.
    pub fn as_str(&self) -> &'static str {
        match self {
            TextIndexing::Unindexed => "unindexed",
            TextIndexing::Untokenized => "untokenized",
            TextIndexing::TokenizedNoFreq => "tokenized_no_freq",
            TextIndexing::TokenizedWithFreq => "tokenized_with_freq",
            TextIndexing::TokenizedWithFreqAndPosition => "tokenized_with_freq_and_position",
        }
    }

    /// Combine two indexing modes.
    ///
    /// `Unindexed` is the neutral element and equal modes are idempotent;
    /// any other pairing has no meaningful union and fails.
    pub fn combine(self, other: TextIndexing) -> Result<TextIndexing, SchemaError> {
        if self == TextIndexing::Unindexed {
            Ok(other)
        } else if other == TextIndexing::Unindexed || self == other {
            Ok(self)
        } else {
            Err(SchemaError::IncompatibleOptions {
                left: self.as_str(),
                right: other.as_str(),
            })
        }
    }
}

impl FromStr for TextIndexing {
    type Err = SchemaError;

    fn from_str(label: &str) -> Result<TextIndexing, SchemaError> {
        match label {
            "unindexed" => Ok(TextIndexing::Unindexed),
            "untokenized" => Ok(TextIndexing::Untokenized),
            "tokenized_no_freq" => Ok(TextIndexing::TokenizedNoFreq),
            "tokenized_with_freq" => Ok(TextIndexing::TokenizedWithFreq),
            "tokenized_with_freq_and_position" => Ok(TextIndexing::TokenizedWithFreqAndPosition),
            other => Err(SchemaError::InvalidJsonValue(format!(
                "unknown indexing option: {other}"
            ))),
        }
    }
}

/// Options for a text field.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TextOptions {
    indexing: TextIndexing,
    stored: bool,
}

impl TextOptions {
    /// Create options with the given indexing mode and stored flag.
    pub fn new(indexing: TextIndexing, stored: bool) -> TextOptions {
        TextOptions { indexing, stored }
    }

    /// The indexing mode.
    pub fn indexing(&self) -> TextIndexing {
        self.indexing
    }

    /// Whether values are stored in the document store.
    pub fn is_stored(&self) -> bool {
        self.stored
    }

    /// Set the indexing mode.
    pub fn set_indexing(mut self, indexing: TextIndexing) -> TextOptions {
        self.indexing = indexing;
        self
    }

    /// Set the stored flag.
    pub fn set_stored(mut self, stored: bool) -> TextOptions {
        self.stored = stored;
        self
    }

    /// Combine two text options: indexing modes combine, stored flags union.
    pub fn combine(self, other: TextOptions) -> Result<TextOptions, SchemaError> {
        Ok(TextOptions {
            indexing: self.indexing.combine(other.indexing)?,
            stored: self.stored || other.stored,
        })
    }
}

/// Options for a numeric field.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NumericOptions {
    indexed: bool,
    fast: bool,
    stored: bool,
}

impl NumericOptions {
    /// Create options with the given flags.
    pub fn new(indexed: bool, fast: bool, stored: bool) -> NumericOptions {
        NumericOptions {
            indexed,
            fast,
            stored,
        }
    }

    /// Whether the field is indexed.
    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Whether the field has a fast (column-oriented) representation.
    pub fn is_fast(&self) -> bool {
        self.fast
    }

    /// Whether values are stored in the document store.
    pub fn is_stored(&self) -> bool {
        self.stored
    }

    /// Set the indexed flag.
    pub fn set_indexed(mut self, indexed: bool) -> NumericOptions {
        self.indexed = indexed;
        self
    }

    /// Set the fast flag.
    pub fn set_fast(mut self, fast: bool) -> NumericOptions {
        self.fast = fast;
        self
    }

    /// Set the stored flag.
    pub fn set_stored(mut self, stored: bool) -> NumericOptions {
        self.stored = stored;
        self
    }
}

/// Text field indexed as one untokenized term, not stored.
pub const STRING: TextOptions = TextOptions {
    indexing: TextIndexing::Untokenized,
    stored: false,
};

/// Text field tokenized with frequencies and positions, not stored.
pub const TEXT: TextOptions = TextOptions {
    indexing: TextIndexing::TokenizedWithFreqAndPosition,
    stored: false,
};

/// Text field that is only stored, useful purely for retrieval.
pub const STORED: TextOptions = TextOptions {
    indexing: TextIndexing::Unindexed,
    stored: true,
};

/// Numeric field with a fast representation only.
pub const FAST: NumericOptions = NumericOptions {
    indexed: false,
    fast: true,
    stored: false,
};

/// Numeric field with every flag off.
pub const NUMERIC: NumericOptions = NumericOptions {
    indexed: false,
    fast: false,
    stored: false,
};
