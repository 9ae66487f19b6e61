//! Structural parsers (C4): one plugin per supported language, all
//! implementing the [`plugin::LanguagePlugin`] port so C3 can dispatch to
//! them uniformly.

pub mod common;
pub mod plugin;
pub mod python;
pub mod rust_lang;
pub mod typescript;

pub use plugin::{LanguageId, LanguagePlugin, PackageContext, ParseOutcome, RawEffect};
