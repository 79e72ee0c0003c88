pub mod flow;
pub mod handlers;
pub mod locator;
pub mod reconcile;
pub mod service;
pub mod submit;
pub mod types;


pub use flow::{advance, reduce, FlowAction, FlowEvent, FlowStep, ReturnFlow};
pub use service::ReturnService;
pub use types::*;
