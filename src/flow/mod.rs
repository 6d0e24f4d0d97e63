pub use flow::{Flow, Key, Limits, State};
pub use table::FlowTable;

mod flow;
mod table;
