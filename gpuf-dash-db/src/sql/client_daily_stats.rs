use crate::query::{ColumnKind, ColumnSpec, col};

/// 클라이언트 일별 통계 테이블
pub const TABLE: &str = "client_daily_stats";

/// 쿼리가 성립하기 위한 필수 컬럼
pub const REQUIRED_COLUMNS: [&str; 2] = ["date", "client_id"];

/// 스키마 버전에 따라 빠질 수 있는 메트릭 컬럼
pub const OPTIONAL_METRICS: [ColumnSpec; 6] = [
    col("total_heartbeats", ColumnKind::BigInt),
    col("avg_cpu_usage", ColumnKind::Float),
    col("avg_memory_usage", ColumnKind::Float),
    col("avg_disk_usage", ColumnKind::Float),
    col("total_network_in_bytes", ColumnKind::BigInt),
    col("total_network_out_bytes", ColumnKind::BigInt),
];

/// gpu_assets가 비어 있을 때의 대체 클라이언트 목록 쿼리
pub const SELECT_CLIENTS_FALLBACK: &str = "
    SELECT DISTINCT client_id
    FROM client_daily_stats
    WHERE client_id IS NOT NULL
    ORDER BY client_id
";
