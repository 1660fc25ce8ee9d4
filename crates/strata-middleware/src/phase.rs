//! The five fixed phases of an operation call.
//!
//! ```text
//! input → Initialize → Serialize → Build → Finalize → Deserialize → transport
//! ```
//!
//! Phase order is fixed. Steps are registered into a phase and ordered
//! within it; they can never move across phases.

/// A phase of the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Phase {
    /// Attach call metadata and validate input.
    Initialize = 0,
    /// Turn the typed input into a protocol message.
    Serialize = 1,
    /// Attach headers derived from the message (length, hashes, ids).
    Build = 2,
    /// Retry, sign and send.
    Finalize = 3,
    /// Turn the raw response into a typed output or a classified error.
    Deserialize = 4,
}

impl Phase {
    /// Number of phases.
    pub const COUNT: usize = 5;

    /// Returns the phase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Serialize => "serialize",
            Self::Build => "build",
            Self::Finalize => "finalize",
            Self::Deserialize => "deserialize",
        }
    }

    /// Returns the position of this phase in the pipeline.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns all phases in order.
    #[must_use]
    pub const fn all() -> [Phase; Phase::COUNT] {
        [
            Self::Initialize,
            Self::Serialize,
            Self::Build,
            Self::Finalize,
            Self::Deserialize,
        ]
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
