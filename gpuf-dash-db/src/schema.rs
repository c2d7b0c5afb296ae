use log::debug;

use gpuf_dash_error::{DashboardError, Result};

use crate::pool::PgHandle;

/// 카탈로그 컬럼 조회 쿼리
pub const DESCRIBE_COLUMNS: &str = "
    SELECT column_name
    FROM information_schema.columns
    WHERE table_name = $1
    ORDER BY ordinal_position
";

/// 한 번의 새로고침 동안 쓰는 스키마 스냅샷.
///
/// 조회 시점에 카탈로그를 한 번 읽고, 이후의 컬럼 유무 판단은 전부 이
/// 값으로 한다. 암묵적 캐싱은 없다. 신선도는 호출자(새로고침 단위)가
/// 결정한다. 배포된 스키마 버전에 없는 선택 메트릭 컬럼은 쿼리에서
/// 조용히 빠지고, 필수 컬럼 누락만 스키마 에러가 된다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSnapshot {
    table: String,
    columns: Vec<String>,
}

impl SchemaSnapshot {
    /// 라이브 카탈로그에서 스냅샷 생성
    pub async fn introspect(conn: &PgHandle, table: &str) -> Result<Self> {
        let rows = conn.query(DESCRIBE_COLUMNS, &[&table]).await.map_err(|e| {
            gpuf_dash_error::query_err(DESCRIBE_COLUMNS, vec![table.to_string()], e)
        })?;

        let columns: Vec<String> = rows.iter().map(|row| row.get(0)).collect();
        debug!("{} 테이블 컬럼 {}개 확인", table, columns.len());

        Ok(Self::from_columns(table, columns))
    }

    /// 이미 알고 있는 컬럼 목록으로 스냅샷 구성
    pub fn from_columns(table: &str, columns: Vec<String>) -> Self {
        Self {
            table: table.to_string(),
            columns,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// 카탈로그에 보고된 순서 그대로의 컬럼 목록
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 테이블 자체가 카탈로그에 없음
    pub fn is_missing(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// 필수 컬럼 확인. 하나라도 없으면 스키마 에러. 재시도 대상이 아니다.
    pub fn require(&self, required: &[&str]) -> Result<()> {
        if self.is_missing() {
            return Err(DashboardError::Schema(format!(
                "{} 테이블이 카탈로그에 없음",
                self.table
            )));
        }

        let missing: Vec<&str> = required
            .iter()
            .filter(|c| !self.contains(c))
            .copied()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DashboardError::Schema(format!(
                "{} 테이블에 필수 컬럼 없음: {}",
                self.table,
                missing.join(", ")
            )))
        }
    }
}
