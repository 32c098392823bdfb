//! Fire-and-forget status reporting from inside tools.
//!
//! Implementations must not block: a slow or disconnected client channel
//! cannot be allowed to stall tool execution.
//!
//! ```rust
//! use pcommon::ClientId;
//! use ptooling::{NoopStatusReporter, StatusReporter};
//!
//! NoopStatusReporter.report_status(&ClientId::from("client-1"), "indexing files");
//! ```

use pcommon::ClientId;

pub trait StatusReporter: Send + Sync {
    fn report_status(&self, client_id: &ClientId, message: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatusReporter;

impl StatusReporter for NoopStatusReporter {
    fn report_status(&self, _client_id: &ClientId, _message: &str) {}
}
