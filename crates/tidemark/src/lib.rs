#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod buffer;
mod coordinator;
mod error;
mod mutex;
mod producer;

pub use crate::buffer::*;
pub use crate::coordinator::{Coordinator, CoordinatorConfig, Phase, RunSummary, StopHandle};
pub use crate::error::*;
pub use crate::producer::*;
