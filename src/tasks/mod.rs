//! Background Tasks Module
//!
//! # Tasks
//! - Maintenance driver: recurring triggers, scheduler pump, cache sweep and
//!   memory budget on one fixed interval
//! - Refresh worker: drains the invalidation refresh queue on the same interval
//! - Snapshot persistence: cache save on shutdown, restore on start-up

mod driver;
mod persistence;

pub use driver::{
    spawn_maintenance_driver, spawn_refresh_worker, MaintenanceDriver, MaintenanceTasks, TickReport,
};
pub use persistence::{load_snapshot, save_snapshot};
