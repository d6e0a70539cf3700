mod client;
mod config;
mod controller;
mod diff;
mod error;
mod logger;
mod protocol;
mod reconcile;
mod session;
mod translate;
mod types;

pub use client::{DeltaClient, DeltaClientBuilder};
pub use config::{ApplianceConfig, ClientConfig, Credentials, PollSettings};
pub use controller::{ApplianceController, ApplianceControllerBuilder, ControllerHandle, PollOutcome};
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use protocol::{ApplianceSnapshot, PropertyPatch, ReportedProperties, Twin, TwinProperties};
pub use reconcile::reconcile;
pub use session::{AccountSession, PollBook, SessionRegistry};
pub use translate::{CommandIntent, translate};
pub use types::*;
