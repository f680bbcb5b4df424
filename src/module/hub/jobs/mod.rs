mod maintenance;
mod server;

pub use maintenance::{MaintenanceJob, MaintenanceReport};
pub use server::{routes, ServerJob};
