//! Tool definitions, registry, validation, and the HTTP dispatcher.

pub mod builtin;
pub mod call;
pub mod definition;
pub mod dispatcher;
pub mod registry;
pub mod validation;

pub use call::{ToolCall, ToolCallStatus};
pub use definition::{AuthMode, HttpMethod, InvocationTemplate, ToolDefinition};
pub use dispatcher::{ToolDispatcher, ToolOutcome};
pub use registry::ToolRegistry;
