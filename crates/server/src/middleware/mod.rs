pub mod pages;
pub mod session;

pub use pages::page_gate;
pub use session::require_session;
