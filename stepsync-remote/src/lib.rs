//! # stepsync-remote
//!
//! The remote side of reconciliation: the [`RegistrationApi`] trait, the
//! actual-state [`read_actual`] walk, a blocking HTTP implementation
//! ([`WebApiClient`]) and an in-memory one ([`InMemoryApi`]).

pub mod api;
pub mod error;
pub mod http;
pub mod memory;
pub mod reader;

pub use api::{
    message_property_name, AssemblyRef, FilterRef, ImageRef, ImageUpdate, NewImage, NewStep,
    PluginTypeRef, RegistrationApi, StepRef, StepUpdate,
};
pub use error::ApiError;
pub use http::{WebApiClient, WebApiConfig};
pub use memory::{CallCounts, InMemoryApi, WriteCall};
pub use reader::read_actual;
