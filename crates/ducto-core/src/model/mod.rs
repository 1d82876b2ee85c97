//! Modelos neutrales (ParamBag, WorkItem,...)

pub mod params;
pub mod work_item;

pub use params::ParamBag;
pub use work_item::{QueuePath, WorkItem};
