pub mod refresh;
pub mod service;
pub mod snapshot;

pub use refresh::{
    RefreshGate,
    RefreshState,
    RefreshTicket,
};

pub use service::{
    RefreshRequest,
    StatsService,
};

pub use snapshot::{
    DashboardSnapshot,
    EntityStats,
};
