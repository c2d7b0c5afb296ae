use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use gpuf_dash_error::Result;

/// 대시보드 동작 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// 기본 조회 구간 (오늘로부터 과거 N일)
    pub default_range_days: u32,
    /// CSV 내보내기 디렉토리
    pub export_dir: String,
}

impl DashboardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 설정파일에서 대시보드 설정 로드
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: DashboardConfig = serde_yml::from_str(&contents)?;

        Ok(config)
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            default_range_days: 7,
            export_dir: "./export".to_string(),
        }
    }
}
