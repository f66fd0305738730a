pub mod http;
pub mod identity;
mod wire;

pub use http::HttpWaypointAdapter;
pub use identity::SessionIdentity;
