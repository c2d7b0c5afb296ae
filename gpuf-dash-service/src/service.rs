use log::{debug, info};

use gpuf_dash_db::pool::{DbPool, PgBackend, PooledConnection};
use gpuf_dash_db::query::{
    DateOrder, DateRange, StatsFilter, build_client_stats_query, build_device_stats_query,
    fetch_table,
};
use gpuf_dash_db::schema::SchemaSnapshot;
use gpuf_dash_db::sql::{client_daily_stats, device_daily_stats};
use gpuf_dash_db::records;
use gpuf_dash_error::Result;
use gpuf_dash_stats::{
    NETWORK_MB_COLUMNS, build_frames, bytes_to_megabytes, group_and_average, with_client_labels,
    with_device_labels,
};

use crate::refresh::{RefreshGate, RefreshState};
use crate::snapshot::{DashboardSnapshot, EntityStats};

/// 클라이언트 차트 메트릭. 네트워크는 MB 변환 컬럼을 쓴다.
const CLIENT_FRAME_METRICS: [&str; 6] = [
    "total_heartbeats",
    "avg_cpu_usage",
    "avg_memory_usage",
    "avg_disk_usage",
    "total_network_in_mb",
    "total_network_out_mb",
];

/// 디바이스 차트 메트릭
const DEVICE_FRAME_METRICS: [&str; 4] = [
    "avg_utilization",
    "avg_temperature",
    "avg_power_usage",
    "avg_memory_usage",
];

/// 새로고침 요청
#[derive(Debug, Clone)]
pub struct RefreshRequest {
    pub range: DateRange,
    /// None이면 전체 클라이언트
    pub client_id: Option<Vec<u8>>,
    /// None이면 전체 디바이스
    pub device_index: Option<i32>,
}

/// 대시보드 통계 서비스.
///
/// 풀과 게이트를 소유하는 명시적 값이다. 전역 싱글턴이 아니라
/// 애플리케이션 컨텍스트가 만들고 넘겨주고 종료한다.
pub struct StatsService {
    pool: DbPool,
    gate: RefreshGate,
}

impl StatsService {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            gate: RefreshGate::new(),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn state(&self) -> RefreshState {
        self.gate.state()
    }

    /// 새로고침 한 사이클.
    ///
    /// 순서 보장: 스키마 스냅샷, 쿼리 빌드, 조회, 집계 순서다. 스냅샷은 이
    /// 본문 안에서만 살아 있어서 다음 새로고침은 반드시 새 스냅샷을 읽는다.
    /// 커넥션은 성공/실패 어느 경로에서도 반납된다.
    pub async fn refresh(&self, request: &RefreshRequest) -> Result<DashboardSnapshot> {
        let _ticket = self.gate.begin()?;
        debug!(
            "새로고침 시작: {} ~ {}",
            request.range.start, request.range.end
        );

        let conn = self.pool.acquire().await?;
        let result = self.run_refresh(&conn, request).await;
        self.pool.release(conn).await;

        if let Ok(snapshot) = &result {
            info!(
                "새로고침 완료: 클라이언트 {}행 / 디바이스 {}행",
                snapshot.clients.table.len(),
                snapshot.devices.table.len()
            );
        }
        result
    }

    async fn run_refresh(
        &self,
        conn: &PooledConnection<PgBackend>,
        request: &RefreshRequest,
    ) -> Result<DashboardSnapshot> {
        // 스키마 스냅샷은 새로고침당 한 번만 읽는다
        let client_schema = SchemaSnapshot::introspect(conn, client_daily_stats::TABLE).await?;
        let device_schema = SchemaSnapshot::introspect(conn, device_daily_stats::TABLE).await?;

        let client_list = records::list_clients(conn).await?;
        let device_list = records::list_devices(conn, request.client_id.as_deref()).await?;

        let filter = StatsFilter {
            client_id: request.client_id.clone(),
            device_index: request.device_index,
        };

        let clients = client_stats(conn, &client_schema, &request.range, &filter).await?;
        let devices = device_stats(conn, &device_schema, &request.range, &filter).await?;

        Ok(DashboardSnapshot {
            clients,
            devices,
            client_list,
            device_list,
        })
    }
}

async fn client_stats(
    conn: &PooledConnection<PgBackend>,
    schema: &SchemaSnapshot,
    range: &DateRange,
    filter: &StatsFilter,
) -> Result<EntityStats> {
    let query = build_client_stats_query(schema, range, filter, DateOrder::Ascending)?;
    let table = fetch_table(conn, &query).await?;

    if table.is_empty() {
        // 0행은 유효한 빈 결과. 빈 프레임으로 내려보낸다
        return Ok(EntityStats {
            table,
            frames: Vec::new(),
        });
    }

    let labelled = with_client_labels(&table, "client_id", "client_name", "client_label")?;

    let metric_names: Vec<&str> = client_daily_stats::OPTIONAL_METRICS
        .iter()
        .map(|m| m.name)
        .collect();
    let grouped = group_and_average(&labelled, &["date", "client_label"], &metric_names)?;

    // 차트 전용 MB 변환. 스키마에 있는 네트워크 컬럼만
    let conversions: Vec<(&str, &str)> = NETWORK_MB_COLUMNS
        .iter()
        .filter(|(source, _)| grouped.has_column(source))
        .copied()
        .collect();
    let converted = bytes_to_megabytes(&grouped, &conversions)?;

    let frames = build_frames(&converted, "date", "client_label", &CLIENT_FRAME_METRICS)?;

    Ok(EntityStats { table, frames })
}

async fn device_stats(
    conn: &PooledConnection<PgBackend>,
    schema: &SchemaSnapshot,
    range: &DateRange,
    filter: &StatsFilter,
) -> Result<EntityStats> {
    let query = build_device_stats_query(schema, range, filter, DateOrder::Ascending)?;
    let table = fetch_table(conn, &query).await?;

    if table.is_empty() {
        return Ok(EntityStats {
            table,
            frames: Vec::new(),
        });
    }

    let labelled = with_device_labels(
        &table,
        "client_id",
        "device_index",
        "device_name",
        "device_label",
    )?;

    let metric_names: Vec<&str> = device_daily_stats::OPTIONAL_METRICS
        .iter()
        .map(|m| m.name)
        .collect();
    let grouped = group_and_average(&labelled, &["date", "device_label"], &metric_names)?;

    let frames = build_frames(&grouped, "date", "device_label", &DEVICE_FRAME_METRICS)?;

    Ok(EntityStats { table, frames })
}
