use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::Path;

use chrono::Local;
use env_logger::Builder;
use log::{LevelFilter, info};
use once_cell::sync::Lazy;

use gpuf_dash_config::Settings;
use gpuf_dash_db::pool::StatsPool;
use gpuf_dash_db::query::DateRange;
use gpuf_dash_error::Result;
use gpuf_dash_service::{RefreshRequest, StatsService};
use gpuf_dash_stats::export::{default_export_name, write_csv};

/// 조회 구간 덮어쓰기 (일 단위)
static RANGE_DAYS: Lazy<Option<u32>> = Lazy::new(|| {
    std::env::var("RANGE_DAYS")
        .ok()
        .and_then(|v| v.parse().ok())
});

/// 로거 세팅
fn setup_logger() {
    #[cfg(debug_assertions)]
    {
        Builder::new()
            .filter(None, LevelFilter::Debug)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{} {} {}:{}] {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.args()
                )
            })
            .init()
    }

    #[cfg(not(debug_assertions))]
    {
        Builder::new().filter(None, LevelFilter::Info).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 로거 세팅
    setup_logger();

    info!("gpuf-dash 통계 대시보드 시작");

    // 통합 설정 로드
    let settings = Settings::new()?;

    // db 풀 세팅
    let pool = StatsPool::connect(&settings.database).await?;
    let service = StatsService::new(pool.clone());

    // 기본 조회 구간: 오늘로부터 과거 N일
    let days = (*RANGE_DAYS).unwrap_or(settings.dashboard.default_range_days);
    let today = Local::now().date_naive();
    let range = DateRange {
        start: today - chrono::Duration::days(i64::from(days)),
        end: today,
    };

    let request = RefreshRequest {
        range,
        client_id: None,
        device_index: None,
    };
    let snapshot = service.refresh(&request).await?;

    // 평면 테이블 CSV 내보내기 (원본 단위)
    let export_dir = Path::new(&settings.dashboard.export_dir);
    create_dir_all(export_dir)?;

    let client_path = export_dir.join(default_export_name("client_stats", today));
    write_csv(&snapshot.clients.table, File::create(&client_path)?)?;
    info!("클라이언트 통계 내보내기: {}", client_path.display());

    let device_path = export_dir.join(default_export_name("device_stats", today));
    write_csv(&snapshot.devices.table, File::create(&device_path)?)?;
    info!("디바이스 통계 내보내기: {}", device_path.display());

    // 풀 정리
    pool.shutdown().await;

    Ok(())
}
