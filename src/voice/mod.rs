//! Voice catalog: the voice samples available for cloning.
//!
//! The catalog is built once from the voice input directory and is
//! read-only for the rest of the process lifetime.

mod catalog;

pub use catalog::{
    Gender, METADATA_FILE, ParsedName, VoiceCatalog, VoiceError, VoiceOverride, VoiceReference,
    parse_voice_filename,
};
