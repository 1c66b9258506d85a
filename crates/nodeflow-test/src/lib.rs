#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod graph;
mod mock;

pub use graph::CountedLoop;
pub use mock::{
    Add, Constant, ConstantType, Event, ExecProbe, Fail, Gauge, Probe, RecordingObserver, Scale,
    Sleep, fixtures_registry,
};
