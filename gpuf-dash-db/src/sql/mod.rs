pub mod gpu_assets;
pub mod client_daily_stats;
pub mod device_daily_stats;
