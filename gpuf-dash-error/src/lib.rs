use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::PoisonError;

use deadpool_postgres::PoolError;
use serde_yml::Error as YmlError;
use tokio::time::error::Elapsed;
use tokio_postgres::Error as PgError;

/// 대시보드 코어의 모든 에러 타입을 정의합니다.
#[derive(Debug)]
pub enum DashboardError {
    /// 설정 관련 에러
    Config(String),

    /// 입출력 에러
    Io(io::Error),

    /// 커넥션 확보 실패 (재시도 소진 또는 DB 연결 불가)
    Connection(String),

    /// 필수 테이블/컬럼 누락
    Schema(String),

    /// 쿼리 실행 실패. 쿼리 템플릿과 바인딩 값을 함께 보존한다
    /// (접속 자격증명은 포함하지 않음).
    Query {
        sql: String,
        params: Vec<String>,
        detail: String,
    },

    /// 집계/피벗 중 잘못된 행 형태. 문제가 된 컬럼과 행 식별자를 보존한다.
    Aggregation {
        column: String,
        row: String,
        detail: String,
    },

    /// 이미 새로고침이 진행 중
    RefreshInProgress,

    /// 타임아웃 에러
    Timeout(String),

    /// 내부 상태 관련 에러
    Internal(String),

    /// 기타 에러
    Other(String),
}

impl fmt::Display for DashboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardError::Config(msg) => write!(f, "설정 에러: {}", msg),
            DashboardError::Io(err) => write!(f, "I/O 에러: {}", err),
            DashboardError::Connection(msg) => write!(f, "커넥션 에러: {}", msg),
            DashboardError::Schema(msg) => write!(f, "스키마 에러: {}", msg),
            DashboardError::Query { sql, params, detail } => write!(
                f,
                "쿼리 에러: {} (쿼리: {}, 바인딩: [{}])",
                detail,
                sql.split_whitespace().collect::<Vec<_>>().join(" "),
                params.join(", ")
            ),
            DashboardError::Aggregation { column, row, detail } => write!(
                f,
                "집계 에러: {} (컬럼: {}, 행: {})",
                detail, column, row
            ),
            DashboardError::RefreshInProgress => write!(f, "새로고침이 이미 진행 중"),
            DashboardError::Timeout(msg) => write!(f, "타임아웃 에러: {}", msg),
            DashboardError::Internal(msg) => write!(f, "내부 에러: {}", msg),
            DashboardError::Other(msg) => write!(f, "기타 에러: {}", msg),
        }
    }
}

impl StdError for DashboardError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            DashboardError::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// Result 타입 별칭 정의
pub type Result<T> = std::result::Result<T, DashboardError>;

/// From 트레이트 구현으로 다양한 에러 타입을 DashboardError로 변환
impl From<io::Error> for DashboardError {
    fn from(err: io::Error) -> Self {
        DashboardError::Io(err)
    }
}

impl From<PoolError> for DashboardError {
    fn from(err: PoolError) -> Self {
        DashboardError::Connection(format!("DB 풀 에러: {}", err))
    }
}

impl From<PgError> for DashboardError {
    fn from(err: PgError) -> Self {
        DashboardError::Connection(format!("PostgreSQL 에러: {}", err))
    }
}

impl From<Elapsed> for DashboardError {
    fn from(err: Elapsed) -> Self {
        DashboardError::Timeout(format!("작업 타임아웃: {}", err))
    }
}

impl<T> From<PoisonError<T>> for DashboardError {
    fn from(err: PoisonError<T>) -> Self {
        DashboardError::Internal(format!("락 포이즌 에러: {}", err))
    }
}

impl From<YmlError> for DashboardError {
    fn from(err: YmlError) -> Self {
        DashboardError::Config(format!("YAML 파싱 에러: {}", err))
    }
}

impl From<String> for DashboardError {
    fn from(err: String) -> Self {
        DashboardError::Other(err)
    }
}

impl From<&str> for DashboardError {
    fn from(err: &str) -> Self {
        DashboardError::Other(err.to_string())
    }
}

/// 에러 처리 유틸리티 함수
pub fn config_err<E: fmt::Display>(err: E) -> DashboardError {
    DashboardError::Config(format!("{}", err))
}

pub fn conn_err<E: fmt::Display>(err: E) -> DashboardError {
    DashboardError::Connection(format!("{}", err))
}

pub fn schema_err<E: fmt::Display>(err: E) -> DashboardError {
    DashboardError::Schema(format!("{}", err))
}

pub fn query_err<E: fmt::Display>(sql: &str, params: Vec<String>, err: E) -> DashboardError {
    DashboardError::Query {
        sql: sql.to_string(),
        params,
        detail: format!("{}", err),
    }
}

pub fn agg_err<E: fmt::Display>(column: &str, row: &str, err: E) -> DashboardError {
    DashboardError::Aggregation {
        column: column.to_string(),
        row: row.to_string(),
        detail: format!("{}", err),
    }
}

pub fn internal_err<E: fmt::Display>(err: E) -> DashboardError {
    DashboardError::Internal(format!("{}", err))
}
