#![allow(dead_code)]

pub mod builders;
pub mod mock_sink;
pub mod strategies;

pub use builders::*;
pub use mock_sink::*;
pub use strategies::*;
