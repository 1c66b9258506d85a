//! Built-in control-flow nodes.

mod branch;
mod for_loop;
mod parameter;
mod sequence;
mod start;

pub use branch::Branch;
pub use for_loop::ForLoop;
pub use parameter::Parameter;
pub use sequence::Sequence;
pub use start::Start;
