//! Client side of the media download service: URL resolution, job runners,
//! and the progress controller that observes a running job.

pub mod controller;
pub mod deliver;
pub mod driver;
pub mod error;
pub mod http;
pub mod quota;
pub mod resolver;
pub mod runner;

pub use controller::{Controller, Effect, Input, Notice, ProgressView, SessionToken, Stage, Timings};
pub use driver::{DriverCommand, DriverUpdate, ProgressDriver, ProgressHandle};
pub use error::{DeliveryError, ResolveError, RunnerError};
pub use resolver::{HttpResolver, Resolver};
pub use runner::{runner_from_config, DirectRunner, JobRunner, PollingRunner};
