pub mod artifacts;
pub mod catalog;
pub mod command;
pub mod error;
pub mod expr;
pub mod http;
pub mod instance;
pub mod matrix;
pub mod ordered;
pub mod pipeline;
pub mod plan;
pub mod propagate;
pub mod remote;
pub mod rules;
pub mod select;
pub mod tags;
pub mod upstream;

pub(crate) mod shell;
pub(crate) mod version;

pub mod cli;

pub use error::Error;

pub(crate) type Result<T, E = Box<dyn std::error::Error + Send + Sync + 'static>> =
    std::result::Result<T, E>;
