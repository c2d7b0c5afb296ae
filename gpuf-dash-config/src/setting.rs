use std::path::Path;

use log::info;

use gpuf_dash_error::{DashboardError, Result};

use crate::config::DashboardConfig;
use crate::dbconfig::DbConfig;

/// 통합 세팅 인스턴스
pub struct Settings {
    pub dashboard: DashboardConfig,
    pub database: DbConfig,
}

impl Settings {
    /// Setting 생성
    pub fn new() -> Result<Self> {
        let dashboard = Self::load_dashboard_config()?;
        let database = Self::load_db_config()?;

        Ok(Self {
            dashboard,
            database,
        })
    }

    /// 대시보드 설정 로드
    fn load_dashboard_config() -> Result<DashboardConfig> {
        // yml 파일 유무 확인
        if Path::new("dashboard.yml").exists() {
            info!("대시보드 설정파일 로드: dashboard.yml");
            match DashboardConfig::from_file("dashboard.yml") {
                Ok(config) => Ok(config),
                Err(e) => Err(DashboardError::Config(format!(
                    "대시보드 설정파일 로드 실패: {}",
                    e
                ))),
            }
        } else {
            // 기본설정사용
            info!("대시보드 기본설정 사용");
            Ok(DashboardConfig::new())
        }
    }

    /// db 설정 로드
    fn load_db_config() -> Result<DbConfig> {
        // yml 파일 유무 확인
        if Path::new("db.yml").exists() {
            info!("DB 설정파일 로드: db.yml");
            match DbConfig::from_file("db.yml") {
                Ok(config) => Ok(config),
                Err(e) => Err(DashboardError::Config(format!(
                    "DB 설정파일 로드 실패: {}",
                    e
                ))),
            }
        } else {
            // 기본설정사용
            info!("DB 기본설정 사용");
            Ok(DbConfig::default())
        }
    }
}
