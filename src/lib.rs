pub mod cli;
pub mod config;
pub mod error;
pub mod handler;
pub mod kube;
pub mod logging;
pub mod resource;
pub mod server;
pub mod smtp;
pub mod status;

pub use error::ErrorKind;
pub use handler::{FunctionRequest, FunctionResponse, RequestHandler};
