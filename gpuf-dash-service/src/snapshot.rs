use gpuf_dash_db::records::{ClientRecord, DeviceRecord};
use gpuf_dash_stats::{DataTable, TimeSeriesFrame};

/// 엔티티 종류별 결과 묶음.
///
/// `table`은 표시/CSV용 평면 테이블로 원본 단위를 유지한다.
/// `frames`는 차트용으로, 네트워크 카운터는 MB 변환 후 피벗된 값이다.
#[derive(Debug, Clone)]
pub struct EntityStats {
    pub table: DataTable,
    pub frames: Vec<TimeSeriesFrame>,
}

/// 한 번의 새로고침 결과. 다음 새로고침이 오면 통째로 대체된다.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub clients: EntityStats,
    pub devices: EntityStats,
    pub client_list: Vec<ClientRecord>,
    pub device_list: Vec<DeviceRecord>,
}
