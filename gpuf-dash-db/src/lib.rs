pub mod pool;
pub mod schema;
pub mod query;
pub mod records;
pub mod sql;

pub use pool::{
    ConnectionBackend,
    DbPool,
    DiagnosticSink,
    LogSink,
    PgBackend,
    PgHandle,
    PoolOptions,
    PoolStatus,
    PooledConnection,
    StatsPool,
};

pub use schema::SchemaSnapshot;

pub use query::{
    BindValue,
    ColumnKind,
    ColumnSpec,
    DateOrder,
    DateRange,
    StatsFilter,
    StatsQuery,
    build_client_stats_query,
    build_device_stats_query,
    decode_rows,
    fetch_table,
};

pub use records::{
    ClientRecord,
    DeviceRecord,
    list_clients,
    list_devices,
};
