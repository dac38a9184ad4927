pub mod tool_handlers;
