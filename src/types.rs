//! NewType wrappers for strong typing throughout the stream engine.
//!
//! These types prevent accidental mixing of semantically different strings
//! (e.g., passing a segment id where a host id is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Unique identifier for an AI host (e.g., "narrator", "travel_host").
    ///
    /// This is the key segments use to address a host in the registry.
    /// Lookups are case-sensitive; an unknown id skips the segment rather
    /// than failing the run.
    HostId
);

newtype_string!(
    /// Unique identifier for one segment of a stream (e.g., "intro",
    /// "segment_2").
    ///
    /// Segment ids key the accumulated results of a run and are how later
    /// segments reference earlier output via `use_output_from`. Uniqueness
    /// within a run is expected but not enforced; a duplicate id overwrites
    /// the stored result in place.
    SegmentId
);

newtype_string!(
    /// Name of a tool a host may use during a segment (e.g., "web_search").
    ///
    /// Tool names identify capabilities only; the implementations live
    /// behind the task runner and are never invoked by the engine itself.
    ToolName
);

newtype_string!(
    /// Handle naming a language model a host is bound to
    /// (e.g., "openai/gpt-4o", "claude-sonnet").
    ///
    /// The engine treats this as opaque; it is interpreted by the task
    /// runner when the host executes a segment.
    ModelId
);
