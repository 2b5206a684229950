pub mod profiles;
pub mod registry;
pub mod schema;
pub mod traits;

pub use profiles::{ToolGroup, ToolProfile};
pub use registry::ToolRegistry;
pub use schema::{generate_tool_schema_text, generate_tool_summary};
pub use traits::{ProgressCallback, Tool, ToolContext, ToolInfo, ToolResult, ToolWeight};
