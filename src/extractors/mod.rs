pub mod context;

pub use context::CALLER_HEADER;
