pub mod http;
pub mod protocol;
pub mod resources;
pub mod service;
pub mod stdio;

pub use crate::protocol::{McpError, McpRequest, McpResponse};
pub use crate::service::ToolService;
