// handlers/gwi/mod.rs - GWI data-operations portal (`gwiToken`)
//
// session.rs → GET /api/gwi/me, POST /api/gwi/logout
// audit.rs   → GET /api/gwi/audit
// proxy.rs   → ANY /api/gwi/proxy/*path, forwarded to the upstream GWI API

pub mod audit;
pub mod proxy;
pub mod session;

pub use audit::audit_list;
pub use proxy::proxy;
pub use session::{logout, me};
