use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use log::{debug, info, warn};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tokio_postgres::config::{Config, SslMode};
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

use gpuf_dash_config::DbConfig;
use gpuf_dash_error::{DashboardError, Result};

/// 프로브 쿼리. 불출 전에 세션 생존을 확인한다.
pub const PROBE_QUERY: &str = "SELECT 1";

/// 풀 동작 관측 싱크. 로깅은 외부 협력자이므로 기본 구현만 log로 보낸다.
pub trait DiagnosticSink: Send + Sync {
    fn attempt_failed(&self, _attempt: u32, _max_retries: u32, _error: &DashboardError) {}
    fn acquired(&self) {}
    fn released(&self) {}
    fn discarded(&self, _reason: &str) {}
    fn exhausted(&self, _max_retries: u32) {}
}

/// log 크레이트로 전달하는 기본 싱크
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn attempt_failed(&self, attempt: u32, max_retries: u32, error: &DashboardError) {
        warn!("커넥션 확보 실패 (시도 {attempt}/{max_retries}): {error}");
    }

    fn acquired(&self) {
        debug!("커넥션 확보");
    }

    fn released(&self) {
        debug!("커넥션 반환");
    }

    fn discarded(&self, reason: &str) {
        warn!("커넥션 폐기: {reason}");
    }

    fn exhausted(&self, max_retries: u32) {
        warn!("커넥션 재시도 {max_retries}회 소진");
    }
}

/// 커넥션 수명주기 백엔드. 실환경은 deadpool-postgres, 테스트는 모의 구현.
#[async_trait]
pub trait ConnectionBackend: Send + Sync + 'static {
    type Handle: Send;

    /// 유휴 커넥션을 꺼내거나 새로 만든다
    async fn checkout(&self) -> Result<Self::Handle>;

    /// 프로브 문으로 세션 생존 확인
    async fn probe(&self, handle: &Self::Handle) -> Result<()>;

    /// 열린 트랜잭션이 없는 상태인지
    fn is_idle(&self, handle: &Self::Handle) -> bool;

    /// 열린 트랜잭션 롤백
    async fn rollback(&self, handle: &mut Self::Handle) -> Result<()>;

    /// 풀로 되돌린다
    fn give_back(&self, handle: Self::Handle);

    /// 커넥션을 닫는다. 풀로 되돌리지 않는다.
    fn discard(&self, handle: Self::Handle);

    /// 풀 전체 종료
    fn close_all(&self);
}

/// 풀 동작 옵션
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_connections: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// 포화 상태에서 빈자리를 기다리는 한도
    pub acquire_timeout: Duration,
}

impl PoolOptions {
    pub fn from_config(config: &gpuf_dash_config::dbconfig::PoolConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            acquire_timeout: Duration::from_secs(config.connection_timeout_seconds),
        }
    }
}

/// 풀 상태 정보
#[derive(Debug, Clone)]
pub struct PoolStatus {
    pub max_connections: usize,
    pub in_use: usize,
}

struct PoolInner<B: ConnectionBackend> {
    backend: B,
    permits: Arc<Semaphore>,
    options: PoolOptions,
    closed: AtomicBool,
    in_use: AtomicUsize,
    sink: Arc<dyn DiagnosticSink>,
}

/// 재시도 프로브 확보와 롤백 반납 규율을 강제하는 통계 조회용 커넥션 풀.
///
/// 애플리케이션 컨텍스트가 소유하는 명시적 값이다. Clone은 같은 풀을
/// 공유하며, 동시 acquire/release에 안전하다. 동시에 체크아웃된 커넥션
/// 수는 `max_connections`를 넘지 않는다.
pub struct StatsPool<B: ConnectionBackend> {
    inner: Arc<PoolInner<B>>,
}

impl<B: ConnectionBackend> Clone for StatsPool<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: ConnectionBackend> StatsPool<B> {
    /// 임의 백엔드로 풀 구성
    pub fn with_backend(backend: B, options: PoolOptions, sink: Arc<dyn DiagnosticSink>) -> Self {
        let permits = Arc::new(Semaphore::new(options.max_connections));
        Self {
            inner: Arc::new(PoolInner {
                backend,
                permits,
                options,
                closed: AtomicBool::new(false),
                in_use: AtomicUsize::new(0),
                sink,
            }),
        }
    }

    /// 설정된 재시도 횟수/지연으로 커넥션 확보
    pub async fn acquire(&self) -> Result<PooledConnection<B>> {
        self.acquire_with(
            self.inner.options.max_retries,
            self.inner.options.retry_delay,
        )
        .await
    }

    /// 커넥션 확보.
    ///
    /// 시도마다: 빈자리 확보, 커넥션 체크아웃, 프로브 순서로 진행한다. 프로브에 실패한
    /// 커넥션은 닫고 (풀로 되돌리지 않음) 고정 지연 후 재시도한다.
    /// 재시도 소진 시 Connection 에러 하나로 정리되어 돌아간다.
    pub async fn acquire_with(
        &self,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<PooledConnection<B>> {
        let mut last_error = DashboardError::Connection("재시도 예산 없음".to_string());

        for attempt in 1..=max_retries {
            if self.inner.closed.load(Ordering::Acquire) {
                return Err(DashboardError::Connection("풀이 종료됨".to_string()));
            }

            match self.try_acquire_once().await {
                Ok(conn) => {
                    self.inner.sink.acquired();
                    return Ok(conn);
                }
                Err(e) => {
                    self.inner.sink.attempt_failed(attempt, max_retries, &e);
                    last_error = e;
                }
            }

            if attempt < max_retries {
                tokio::time::sleep(retry_delay).await;
            }
        }

        self.inner.sink.exhausted(max_retries);
        Err(DashboardError::Connection(format!(
            "{}회 시도 후 커넥션 확보 실패: {}",
            max_retries, last_error
        )))
    }

    async fn try_acquire_once(&self) -> Result<PooledConnection<B>> {
        let permit = timeout(
            self.inner.options.acquire_timeout,
            Arc::clone(&self.inner.permits).acquire_owned(),
        )
        .await
        .map_err(|_| DashboardError::Connection("풀 포화: 빈자리 대기 타임아웃".to_string()))?
        .map_err(|_| DashboardError::Connection("풀이 종료됨".to_string()))?;

        let handle = self.inner.backend.checkout().await?;

        match self.inner.backend.probe(&handle).await {
            Ok(()) => {
                self.inner.in_use.fetch_add(1, Ordering::AcqRel);
                Ok(PooledConnection {
                    handle: Some(handle),
                    _permit: permit,
                    pool: Arc::clone(&self.inner),
                    broken: false,
                })
            }
            Err(e) => {
                self.inner.backend.discard(handle);
                self.inner.sink.discarded("프로브 실패");
                Err(e)
            }
        }
    }

    /// 커넥션 반납.
    ///
    /// 트랜잭션이 열려 있으면 먼저 롤백해 커밋 안 된 상태를 버린다.
    /// 롤백 실패나 손상 표시가 있으면 풀로 되돌리지 않고 닫는다.
    /// 대체 커넥션은 다음 수요 때 게으르게 만들어진다.
    pub async fn release(&self, mut conn: PooledConnection<B>) {
        let Some(mut handle) = conn.handle.take() else {
            return;
        };
        self.inner.in_use.fetch_sub(1, Ordering::AcqRel);

        if conn.broken {
            self.inner.backend.discard(handle);
            self.inner.sink.discarded("사용 중 손상 표시");
            return;
        }

        if self.inner.closed.load(Ordering::Acquire) {
            self.inner.backend.discard(handle);
            self.inner.sink.discarded("풀 종료 후 반납");
            return;
        }

        if !self.inner.backend.is_idle(&handle) {
            if let Err(e) = self.inner.backend.rollback(&mut handle).await {
                self.inner.backend.discard(handle);
                self.inner.sink.discarded(&format!("롤백 실패: {e}"));
                return;
            }
        }

        self.inner.backend.give_back(handle);
        self.inner.sink.released();
    }

    /// 풀 종료. 유휴 커넥션은 즉시 닫히고, 체크아웃된 커넥션은 반납 시
    /// 닫힌다. 이후의 acquire는 Connection 에러로 실패한다.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.permits.close();
        self.inner.backend.close_all();
        info!("커넥션 풀 종료");
    }

    /// 풀 상태 정보
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            max_connections: self.inner.options.max_connections,
            in_use: self.inner.in_use.load(Ordering::Acquire),
        }
    }
}

/// 체크아웃된 커넥션. 소유자는 항상 하나다.
///
/// `release`를 거치지 않고 드롭되면 보수적으로 폐기한다. 드롭 안에서
/// 롤백을 돌릴 수 없으므로, 더럽혀졌을 수 있는 세션은 풀로 되돌리지
/// 않는다.
pub struct PooledConnection<B: ConnectionBackend> {
    handle: Option<B::Handle>,
    _permit: OwnedSemaphorePermit,
    pool: Arc<PoolInner<B>>,
    broken: bool,
}

impl<B: ConnectionBackend> std::fmt::Debug for PooledConnection<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("handle", &self.handle.is_some())
            .field("broken", &self.broken)
            .finish()
    }
}

impl<B: ConnectionBackend> PooledConnection<B> {
    /// 사용 중 오류로 세션을 더 신뢰할 수 없을 때 호출한다.
    /// 반납 시 풀로 되돌리지 않고 닫힌다.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }
}

impl<B: ConnectionBackend> Deref for PooledConnection<B> {
    type Target = B::Handle;

    fn deref(&self) -> &B::Handle {
        self.handle.as_ref().expect("반납된 커넥션 접근")
    }
}

impl<B: ConnectionBackend> DerefMut for PooledConnection<B> {
    fn deref_mut(&mut self) -> &mut B::Handle {
        self.handle.as_mut().expect("반납된 커넥션 접근")
    }
}

impl<B: ConnectionBackend> Drop for PooledConnection<B> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.in_use.fetch_sub(1, Ordering::AcqRel);
            self.pool.backend.discard(handle);
            self.pool.sink.discarded("반납 없이 드롭");
        }
    }
}

/// Postgres 세션 핸들. 열린 트랜잭션 여부를 함께 추적한다.
pub struct PgHandle {
    conn: deadpool_postgres::Object,
    txn_open: bool,
}

impl PgHandle {
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> std::result::Result<Vec<Row>, tokio_postgres::Error> {
        self.conn.query(sql, params).await
    }

    pub async fn query_one(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> std::result::Result<Row, tokio_postgres::Error> {
        self.conn.query_one(sql, params).await
    }

    pub async fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> std::result::Result<u64, tokio_postgres::Error> {
        self.conn.execute(sql, params).await
    }

    /// 트랜잭션 시작. 커밋 전에 반납되면 풀이 롤백한다.
    pub async fn begin(&mut self) -> std::result::Result<(), tokio_postgres::Error> {
        self.conn.batch_execute("BEGIN").await?;
        self.txn_open = true;
        Ok(())
    }

    pub async fn commit(&mut self) -> std::result::Result<(), tokio_postgres::Error> {
        self.conn.batch_execute("COMMIT").await?;
        self.txn_open = false;
        Ok(())
    }

    /// 트랜잭션이 열려 있지 않은 상태인지
    pub fn is_idle(&self) -> bool {
        !self.txn_open
    }
}

/// deadpool-postgres 위에서 동작하는 실환경 백엔드
pub struct PgBackend {
    pool: Pool,
}

#[async_trait]
impl ConnectionBackend for PgBackend {
    type Handle = PgHandle;

    async fn checkout(&self) -> Result<PgHandle> {
        let conn = self.pool.get().await.map_err(|e| {
            DashboardError::Connection(format!("연결 풀에서 연결 가져오기 실패: {e}"))
        })?;
        Ok(PgHandle {
            conn,
            txn_open: false,
        })
    }

    async fn probe(&self, handle: &PgHandle) -> Result<()> {
        handle
            .conn
            .query_one(PROBE_QUERY, &[])
            .await
            .map_err(|e| DashboardError::Connection(format!("프로브 쿼리 실패: {e}")))?;
        Ok(())
    }

    fn is_idle(&self, handle: &PgHandle) -> bool {
        handle.is_idle()
    }

    async fn rollback(&self, handle: &mut PgHandle) -> Result<()> {
        handle
            .conn
            .batch_execute("ROLLBACK")
            .await
            .map_err(|e| DashboardError::Connection(format!("롤백 실패: {e}")))?;
        handle.txn_open = false;
        Ok(())
    }

    fn give_back(&self, handle: PgHandle) {
        // Object 드롭 시 deadpool이 풀로 되돌린다
        drop(handle);
    }

    fn discard(&self, handle: PgHandle) {
        // 풀에서 떼어내면 드롭 시 세션이 닫힌다
        let _ = deadpool_postgres::Object::take(handle.conn);
    }

    fn close_all(&self) {
        self.pool.close();
    }
}

/// 실환경 풀 타입
pub type DbPool = StatsPool<PgBackend>;

impl StatsPool<PgBackend> {
    /// db 풀 생성
    pub async fn connect(dbconfig: &DbConfig) -> Result<Self> {
        info!("db 풀 초기화");

        // PostgreSQL 설정 생성
        let pg_config = create_pg_config(dbconfig);

        // 연결 풀 생성
        let pool = create_connection_pool(pg_config, dbconfig)?;

        let stats_pool = Self::with_backend(
            PgBackend { pool },
            PoolOptions::from_config(&dbconfig.pool),
            Arc::new(LogSink),
        );

        // min_connections 예열. 목표치일 뿐 실패해도 경고만 남긴다.
        stats_pool.warm_up(dbconfig.pool.min_connections).await;

        info!(
            "데이터베이스 연결 풀 초기화 완료 (최대 연결 수: {})",
            dbconfig.pool.max_connections
        );

        Ok(stats_pool)
    }

    async fn warm_up(&self, min_connections: usize) {
        let mut held = Vec::with_capacity(min_connections);
        for _ in 0..min_connections {
            match self.acquire_with(1, Duration::ZERO).await {
                Ok(conn) => held.push(conn),
                Err(e) => {
                    warn!("연결 예열 실패: {e}");
                    break;
                }
            }
        }
        for conn in held {
            self.release(conn).await;
        }
    }
}

/// `PostgreSQL` 설정 생성
fn create_pg_config(dbconfig: &DbConfig) -> Config {
    let ssl_mode = match dbconfig.connection.sslmode.to_lowercase().as_str() {
        "disable" => SslMode::Disable,
        "require" => SslMode::Require,
        _ => SslMode::Prefer,
    };

    let mut pg_config = Config::new();
    pg_config
        .host(dbconfig.connection.host.as_str())
        .port(dbconfig.connection.port)
        .dbname(dbconfig.connection.database.as_str())
        .user(dbconfig.connection.user.as_str())
        .password(dbconfig.connection.password.as_str())
        .ssl_mode(ssl_mode)
        .connect_timeout(Duration::from_secs(
            dbconfig.pool.connection_timeout_seconds,
        ))
        .keepalives(true);

    pg_config
}

/// 연결 풀 생성
fn create_connection_pool(pg_config: Config, dbconfig: &DbConfig) -> Result<Pool> {
    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let mgr = Manager::from_config(pg_config, NoTls, mgr_config);

    let wait = Duration::from_secs(dbconfig.pool.connection_timeout_seconds);
    let pool = Pool::builder(mgr)
        .max_size(dbconfig.pool.max_connections)
        .runtime(Runtime::Tokio1)
        .wait_timeout(Some(wait))
        .create_timeout(Some(wait))
        .build()
        .map_err(|e| DashboardError::Connection(format!("db 풀 생성 실패: {e}")))?;

    Ok(pool)
}
