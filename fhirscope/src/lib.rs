pub mod commands;
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    client_from_args, expand_path, handle_cursors, handle_latency, probe_options_from_args,
    walk_options_from_args,
};
