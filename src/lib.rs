pub mod args;
pub mod capture;
pub mod flow;
pub mod graph;
pub mod intercept;
pub mod notify;
pub mod proto;
pub mod session;
pub mod sniff;

pub use session::{Config, Session, Status};
