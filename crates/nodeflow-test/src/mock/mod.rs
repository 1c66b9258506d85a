//! Fixture nodes and observers.
//!
//! Every recording fixture is `Clone` and shares its log between clones:
//! add a clone to the graph and inspect the original after the run.

mod arithmetic;
mod control;
mod observer;
mod value;

pub use arithmetic::{Add, Scale};
pub use control::{ExecProbe, Fail, Gauge, Sleep};
use nodeflow_runtime::node::NodeRegistry;
pub use observer::{Event, RecordingObserver};
pub use value::{Constant, ConstantType, Probe};

/// Returns a registry with the built-in nodes and every registrable fixture.
pub fn fixtures_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::with_builtins();
    registry
        .register::<Constant<i64>>()
        .register::<Constant<f64>>()
        .register::<Constant<bool>>()
        .register::<Constant<String>>()
        .register::<Add>()
        .register::<Scale>()
        .register::<Fail>()
        .register::<Sleep>()
        .register::<ExecProbe>();
    registry
}
