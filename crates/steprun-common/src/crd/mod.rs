//! Custom Resource Definitions for steprun

mod task;
mod task_run;

pub use task::{Step, Task, TaskSpec};
pub use task_run::{PodTemplate, TaskRef, TaskRun, TaskRunSpec};
