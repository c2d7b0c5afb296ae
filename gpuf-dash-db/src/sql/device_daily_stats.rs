use crate::query::{ColumnKind, ColumnSpec, col};

/// 디바이스 일별 통계 테이블
pub const TABLE: &str = "device_daily_stats";

/// 쿼리가 성립하기 위한 필수 컬럼
pub const REQUIRED_COLUMNS: [&str; 3] = ["date", "client_id", "device_index"];

/// 스키마 버전에 따라 빠질 수 있는 메트릭 컬럼
pub const OPTIONAL_METRICS: [ColumnSpec; 4] = [
    col("avg_utilization", ColumnKind::Float),
    col("avg_temperature", ColumnKind::Float),
    col("avg_power_usage", ColumnKind::Float),
    col("avg_memory_usage", ColumnKind::Float),
];

/// 디바이스 목록 조회 베이스 (클라이언트 필터는 동적으로 덧붙인다)
pub const SELECT_DEVICES_BASE: &str = "
    SELECT DISTINCT d.client_id, d.device_index, d.device_name, g.client_name
    FROM device_daily_stats d
    LEFT JOIN gpu_assets g ON d.client_id = g.client_id
";
