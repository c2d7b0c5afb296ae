pub mod setting;
pub mod config;
pub mod dbconfig;

pub use setting::Settings;
pub use config::DashboardConfig;
pub use dbconfig::DbConfig;
