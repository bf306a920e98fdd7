//! Common types for steprun: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod names;
pub mod quantity;
pub mod random;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group for steprun CRDs
pub const API_GROUP: &str = "steprun.dev";

/// Label identifying the controller that manages a resource
pub const MANAGED_BY_LABEL_KEY: &str = "app.kubernetes.io/managed-by";

/// Default value for [`MANAGED_BY_LABEL_KEY`]
pub const MANAGED_BY_LABEL_VALUE: &str = "steprun";

/// Label linking a Pod back to the TaskRun it was compiled from
pub const TASK_RUN_LABEL_KEY: &str = "steprun.dev/taskRun";

/// Annotation the in-Pod runtime waits on before starting the first step
pub const READY_ANNOTATION: &str = "steprun.dev/ready";

/// Value of [`READY_ANNOTATION`] once the Pod is ready
pub const READY_ANNOTATION_VALUE: &str = "READY";
