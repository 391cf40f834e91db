//! Scenario execution engine for streaming media pipelines.
//!
//! A scenario is a scripted sequence of actions (seeks, state changes,
//! track switches, waits, property pokes) driven against a running
//! pipeline the host owns. The engine synchronizes action execution
//! with pipeline state and stream position, handles synchronous,
//! asynchronous and interlaced completion, and correlates bus messages
//! with pending work. Violations observed along the way are raised as
//! reports through `vigil-report`.
//!
//! Typical embedding:
//!
//! ```no_run
//! # use vigil_pipeline::mock::MockPipeline;
//! # use vigil_report::Runner;
//! # use vigil_scenario::Scenario;
//! # async fn example() -> vigil_scenario::Result<()> {
//! let pipeline = MockPipeline::new("pipeline0");
//! let runner = Runner::from_env();
//! let scenario = Scenario::attach(pipeline, runner.clone(), "seek_forward")?;
//! let handle = scenario.handle();
//! let finished = tokio::spawn(scenario.run());
//! // ... run the pipeline; the engine drives it ...
//! # handle.stop();
//! # let _ = finished.await;
//! std::process::exit(runner.exit_code());
//! # }
//! ```
#![warn(missing_docs)]

mod action;
pub mod actions;
mod bus;
mod error;
mod loader;
mod prepare;
mod scenario;
pub mod types;

pub use action::{Action, ActionState, ExecuteResult};
pub use actions::WAIT_MULTIPLIER_ENV;
pub use error::{Error, Result};
pub use loader::{SCENARIOS_PATH_ENV, SCENARIO_SUFFIX};
pub use scenario::{Scenario, ScenarioHandle};
pub use types::{ActionParameter, ActionType, ActionTypeFlags};
