pub mod cursor_log;
pub mod endpoints;
pub mod probe;
pub mod report;
pub mod walk;

pub use cursor_log::CursorLog;
pub use endpoints::{EndpointSpec, PreparedEndpoint, load_endpoints, prepare_endpoints};
pub use probe::{EndpointResult, ProbeOptions, probe_endpoints};
pub use walk::{PageLink, WalkOptions, WalkSummary, walk_cursors};
