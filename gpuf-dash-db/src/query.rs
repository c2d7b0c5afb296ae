use chrono::NaiveDate;
use log::debug;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

use gpuf_dash_error::{DashboardError, Result};
use gpuf_dash_stats::{CellValue, DataTable};

use crate::pool::PgHandle;
use crate::schema::SchemaSnapshot;
use crate::sql::{client_daily_stats, device_daily_stats, gpu_assets};

/// 쿼리 바인딩 값. 필터 값은 절대 SQL 텍스트에 이어붙이지 않는다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindValue {
    Date(NaiveDate),
    ClientId(Vec<u8>),
    Int(i32),
}

impl BindValue {
    pub fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            BindValue::Date(v) => v,
            BindValue::ClientId(v) => v,
            BindValue::Int(v) => v,
        }
    }

    /// 진단용 표시 문자열 (식별자는 hex)
    pub fn render(&self) -> String {
        match self {
            BindValue::Date(v) => v.format("%Y-%m-%d").to_string(),
            BindValue::ClientId(v) => hex::encode(v),
            BindValue::Int(v) => v.to_string(),
        }
    }
}

/// tokio-postgres 파라미터 슬라이스로 변환
pub fn sql_params(params: &[BindValue]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(BindValue::as_sql).collect()
}

/// 쿼리 에러 보고용 바인딩 값 목록
pub fn rendered_params(params: &[BindValue]) -> Vec<String> {
    params.iter().map(BindValue::render).collect()
}

/// 결과 컬럼 디코딩 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Date,
    ClientId,
    Text,
    BigInt,
    Float,
}

/// 선택 목록 한 항목: 출력 컬럼명 + 디코딩 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
}

pub const fn col(name: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec { name, kind }
}

impl ColumnSpec {
    /// 숫자 메트릭 컬럼인지 (집계 평균 대상)
    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, ColumnKind::BigInt | ColumnKind::Float)
    }
}

/// 조회 날짜 구간 (양 끝 포함)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// 선택 필터. None은 "전체". 무제약 조건이지 빈 결과 조건이 아니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsFilter {
    pub client_id: Option<Vec<u8>>,
    pub device_index: Option<i32>,
}

/// 날짜 정렬 방향. 보조 정렬은 항상 엔티티 식별자라서 피벗이 재현 가능하다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateOrder {
    #[default]
    Ascending,
    Descending,
}

impl DateOrder {
    fn keyword(self) -> &'static str {
        match self {
            DateOrder::Ascending => "ASC",
            DateOrder::Descending => "DESC",
        }
    }
}

/// 빌드된 쿼리: SQL 템플릿 + 바인딩 + 결과 컬럼 명세.
/// 스키마에 없어서 빠진 선택 컬럼은 `columns`에 나타나지 않으므로
/// 호출자가 컬럼 유무를 그대로 볼 수 있다.
#[derive(Debug, Clone)]
pub struct StatsQuery {
    pub sql: String,
    pub params: Vec<BindValue>,
    pub columns: Vec<ColumnSpec>,
}

/// 스키마 드리프트에도 디코딩 타입이 고정되도록 숫자 컬럼은 캐스팅한다
fn render_metric(alias: &str, spec: &ColumnSpec) -> String {
    match spec.kind {
        ColumnKind::Float => format!("{alias}.{0}::DOUBLE PRECISION AS {0}", spec.name),
        ColumnKind::BigInt => format!("{alias}.{0}::BIGINT AS {0}", spec.name),
        _ => format!("{alias}.{}", spec.name),
    }
}

/// 클라이언트 일별 통계 조회 쿼리 빌드.
///
/// 선택 메트릭은 스냅샷에 있는 컬럼만 선택 목록에 들어간다. 메타데이터는
/// LEFT JOIN이라 gpu_assets에 레코드가 없어도 행이 살아남는다.
pub fn build_client_stats_query(
    snapshot: &SchemaSnapshot,
    range: &DateRange,
    filter: &StatsFilter,
    order: DateOrder,
) -> Result<StatsQuery> {
    snapshot.require(&client_daily_stats::REQUIRED_COLUMNS)?;

    let mut columns = vec![
        col("date", ColumnKind::Date),
        col("client_id", ColumnKind::ClientId),
        col("client_name", ColumnKind::Text),
    ];
    let mut select = vec![
        "c.date".to_string(),
        "c.client_id".to_string(),
        "g.client_name".to_string(),
    ];

    for metric in client_daily_stats::OPTIONAL_METRICS {
        if snapshot.contains(metric.name) {
            select.push(render_metric("c", &metric));
            columns.push(metric);
        }
    }

    let mut params = vec![BindValue::Date(range.start), BindValue::Date(range.end)];
    let mut predicates = vec!["c.date >= $1".to_string(), "c.date <= $2".to_string()];

    if let Some(client_id) = &filter.client_id {
        params.push(BindValue::ClientId(client_id.clone()));
        predicates.push(format!("c.client_id = ${}", params.len()));
    }

    let sql = format!(
        "SELECT {}\n    FROM {} c\n    LEFT JOIN {} g ON c.client_id = g.client_id\n    WHERE {}\n    ORDER BY c.date {}, c.client_id",
        select.join(", "),
        client_daily_stats::TABLE,
        gpu_assets::TABLE,
        predicates.join(" AND "),
        order.keyword(),
    );
    debug!("클라이언트 통계 쿼리 빌드: 컬럼 {}개", columns.len());

    Ok(StatsQuery {
        sql,
        params,
        columns,
    })
}

/// 디바이스 일별 통계 조회 쿼리 빌드
pub fn build_device_stats_query(
    snapshot: &SchemaSnapshot,
    range: &DateRange,
    filter: &StatsFilter,
    order: DateOrder,
) -> Result<StatsQuery> {
    snapshot.require(&device_daily_stats::REQUIRED_COLUMNS)?;

    let mut columns = vec![
        col("date", ColumnKind::Date),
        col("client_id", ColumnKind::ClientId),
        col("device_index", ColumnKind::BigInt),
    ];
    let mut select = vec![
        "d.date".to_string(),
        "d.client_id".to_string(),
        "d.device_index::BIGINT AS device_index".to_string(),
    ];

    if snapshot.contains("device_name") {
        columns.push(col("device_name", ColumnKind::Text));
        select.push("d.device_name".to_string());
    }
    columns.push(col("client_name", ColumnKind::Text));
    select.push("g.client_name".to_string());

    for metric in device_daily_stats::OPTIONAL_METRICS {
        if snapshot.contains(metric.name) {
            select.push(render_metric("d", &metric));
            columns.push(metric);
        }
    }

    let mut params = vec![BindValue::Date(range.start), BindValue::Date(range.end)];
    let mut predicates = vec!["d.date >= $1".to_string(), "d.date <= $2".to_string()];

    if let Some(client_id) = &filter.client_id {
        params.push(BindValue::ClientId(client_id.clone()));
        predicates.push(format!("d.client_id = ${}", params.len()));
    }

    if let Some(device_index) = filter.device_index {
        params.push(BindValue::Int(device_index));
        predicates.push(format!("d.device_index = ${}", params.len()));
    }

    let sql = format!(
        "SELECT {}\n    FROM {} d\n    LEFT JOIN {} g ON d.client_id = g.client_id\n    WHERE {}\n    ORDER BY d.date {}, d.client_id, d.device_index",
        select.join(", "),
        device_daily_stats::TABLE,
        gpu_assets::TABLE,
        predicates.join(" AND "),
        order.keyword(),
    );
    debug!("디바이스 통계 쿼리 빌드: 컬럼 {}개", columns.len());

    Ok(StatsQuery {
        sql,
        params,
        columns,
    })
}

fn decode_cell(
    row: &Row,
    idx: usize,
    spec: &ColumnSpec,
) -> std::result::Result<CellValue, tokio_postgres::Error> {
    let cell = match spec.kind {
        ColumnKind::Date => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(CellValue::Date),
        ColumnKind::ClientId => row
            .try_get::<_, Option<Vec<u8>>>(idx)?
            .map(CellValue::Bytes),
        ColumnKind::Text => row.try_get::<_, Option<String>>(idx)?.map(CellValue::Text),
        ColumnKind::BigInt => row.try_get::<_, Option<i64>>(idx)?.map(CellValue::Int),
        ColumnKind::Float => row.try_get::<_, Option<f64>>(idx)?.map(CellValue::Float),
    };
    Ok(cell.unwrap_or(CellValue::Null))
}

/// 쿼리 결과 행을 DataTable로 디코딩.
/// 타입이 어긋난 셀은 컬럼명과 행 번호를 담아 집계 에러로 올린다.
pub fn decode_rows(rows: &[Row], specs: &[ColumnSpec]) -> Result<DataTable> {
    let mut table = DataTable::new(specs.iter().map(|s| s.name.to_string()).collect());

    for (i, row) in rows.iter().enumerate() {
        let mut cells = Vec::with_capacity(specs.len());
        for (idx, spec) in specs.iter().enumerate() {
            let cell = decode_cell(row, idx, spec).map_err(|e| DashboardError::Aggregation {
                column: spec.name.to_string(),
                row: format!("#{i}"),
                detail: format!("행 디코딩 실패: {e}"),
            })?;
            cells.push(cell);
        }
        table.push_row(cells)?;
    }

    Ok(table)
}

/// 쿼리 실행 + 디코딩.
/// 실패 시 템플릿과 바인딩 값을 담은 쿼리 에러로 올린다 (자격증명 제외).
/// 0행은 유효한 빈 결과다. 에러와 절대 섞이지 않는다.
pub async fn fetch_table(conn: &PgHandle, query: &StatsQuery) -> Result<DataTable> {
    let rows = conn
        .query(&query.sql, &sql_params(&query.params))
        .await
        .map_err(|e| gpuf_dash_error::query_err(&query.sql, rendered_params(&query.params), e))?;

    decode_rows(&rows, &query.columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn range() -> DateRange {
        DateRange {
            start: date("2024-01-01"),
            end: date("2024-01-07"),
        }
    }

    fn full_client_snapshot() -> SchemaSnapshot {
        let mut columns = vec!["date".to_string(), "client_id".to_string()];
        columns.extend(
            client_daily_stats::OPTIONAL_METRICS
                .iter()
                .map(|m| m.name.to_string()),
        );
        SchemaSnapshot::from_columns(client_daily_stats::TABLE, columns)
    }

    #[test]
    fn omitted_filter_emits_no_predicate() {
        let query = build_client_stats_query(
            &full_client_snapshot(),
            &range(),
            &StatsFilter::default(),
            DateOrder::Ascending,
        )
        .unwrap();

        assert!(!query.sql.contains("c.client_id = $"));
        assert_eq!(
            query.params,
            vec![
                BindValue::Date(date("2024-01-01")),
                BindValue::Date(date("2024-01-07")),
            ]
        );
        assert!(query.sql.contains("ORDER BY c.date ASC, c.client_id"));
    }

    #[test]
    fn client_filter_adds_exactly_one_bind() {
        let filter = StatsFilter {
            client_id: Some(vec![0x11, 0x11, 0xaa, 0xaa]),
            device_index: None,
        };
        let query = build_client_stats_query(
            &full_client_snapshot(),
            &range(),
            &filter,
            DateOrder::Ascending,
        )
        .unwrap();

        assert!(query.sql.contains("c.client_id = $3"));
        assert_eq!(query.params.len(), 3);
        assert_eq!(query.params[2].render(), "1111aaaa");
        // 필터 값이 쿼리 텍스트에 섞여 들어가지 않는다
        assert!(!query.sql.contains("1111aaaa"));
    }

    #[test]
    fn absent_optional_metric_is_silently_omitted() {
        let snapshot = SchemaSnapshot::from_columns(
            client_daily_stats::TABLE,
            vec![
                "date".to_string(),
                "client_id".to_string(),
                "avg_cpu_usage".to_string(),
            ],
        );
        let query = build_client_stats_query(
            &snapshot,
            &range(),
            &StatsFilter::default(),
            DateOrder::Ascending,
        )
        .unwrap();

        assert!(query.sql.contains("avg_cpu_usage"));
        assert!(!query.sql.contains("avg_disk_usage"));
        // 빠진 컬럼은 NULL 대체가 아니라 결과 명세에서 아예 빠진다
        let names: Vec<&str> = query.columns.iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            ["date", "client_id", "client_name", "avg_cpu_usage"]
        );
    }

    #[test]
    fn missing_required_column_fails_with_schema_error() {
        let snapshot = SchemaSnapshot::from_columns(
            client_daily_stats::TABLE,
            vec!["date".to_string(), "avg_cpu_usage".to_string()],
        );
        let err = build_client_stats_query(
            &snapshot,
            &range(),
            &StatsFilter::default(),
            DateOrder::Ascending,
        )
        .unwrap_err();

        assert!(matches!(err, DashboardError::Schema(_)));
    }

    #[test]
    fn device_query_binds_both_filters_in_order() {
        let mut columns: Vec<String> = device_daily_stats::REQUIRED_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .collect();
        columns.push("device_name".to_string());
        columns.extend(
            device_daily_stats::OPTIONAL_METRICS
                .iter()
                .map(|m| m.name.to_string()),
        );
        let snapshot = SchemaSnapshot::from_columns(device_daily_stats::TABLE, columns);

        let filter = StatsFilter {
            client_id: Some(vec![0x22, 0x22]),
            device_index: Some(1),
        };
        let query =
            build_device_stats_query(&snapshot, &range(), &filter, DateOrder::Descending).unwrap();

        assert!(query.sql.contains("d.client_id = $3"));
        assert!(query.sql.contains("d.device_index = $4"));
        assert_eq!(query.params.len(), 4);
        assert!(query.sql.contains("ORDER BY d.date DESC, d.client_id, d.device_index"));
        assert!(query.sql.contains("LEFT JOIN gpu_assets"));
    }

    #[test]
    fn numeric_selects_are_cast_for_stable_decoding() {
        let query = build_client_stats_query(
            &full_client_snapshot(),
            &range(),
            &StatsFilter::default(),
            DateOrder::Ascending,
        )
        .unwrap();

        assert!(query
            .sql
            .contains("c.avg_cpu_usage::DOUBLE PRECISION AS avg_cpu_usage"));
        assert!(query
            .sql
            .contains("c.total_network_in_bytes::BIGINT AS total_network_in_bytes"));
    }
}
