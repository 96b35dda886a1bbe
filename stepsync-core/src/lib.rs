//! stepsync core library: registration model, identity keys, manifests.
//!
//! - [`types`]: desired-state records and coded enums
//! - [`actual`]: actual-state mirror read from the remote side
//! - [`keys`]: [`StepKey`] / [`ImageKey`] identity keys
//! - [`manifest`]: manifest / snapshot load and save
//! - [`error`]: [`ModelError`], [`ManifestError`]

pub mod actual;
pub mod error;
pub mod keys;
pub mod manifest;
pub mod types;

pub use actual::{ActualImage, ActualPluginType, ActualState, ActualStep, ReadScope, ReadWarning};
pub use error::{ManifestError, ModelError};
pub use keys::{ImageKey, StepKey};
pub use manifest::Manifest;
pub use types::{
    AssemblyKind, AssemblyRegistration, Coded, ImageRegistration, ImageType, Mode,
    PluginTypeRegistration, RemoteId, Stage, StepRegistration,
};
