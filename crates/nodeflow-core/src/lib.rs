#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
mod id;
mod registry;
mod value;

pub use error::{BoxedError, ValueError, ValueResult};
pub use id::{NodeId, PortId};
pub use registry::{Conversion, Converter, TypeRegistry};
pub use value::{Value, ValueType};
