use log::debug;

use gpuf_dash_error::Result;
use gpuf_dash_stats::{client_label, device_label};

use crate::pool::PgHandle;
use crate::query::{BindValue, rendered_params, sql_params};
use crate::sql::{client_daily_stats, device_daily_stats, gpu_assets};

/// 클라이언트 레코드. 정체성은 client_id, 이름은 표시용이다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub client_id: Vec<u8>,
    pub client_name: Option<String>,
}

impl ClientRecord {
    /// 표시 라벨 (이름 + 식별자 접미사)
    pub fn label(&self) -> String {
        client_label(self.client_name.as_deref(), &self.client_id)
    }
}

/// 디바이스 레코드. 정체성은 (client_id, device_index)다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub client_id: Vec<u8>,
    pub device_index: i32,
    pub device_name: Option<String>,
    pub client_name: Option<String>,
}

impl DeviceRecord {
    pub fn label(&self) -> String {
        device_label(
            self.device_name.as_deref(),
            &self.client_id,
            self.device_index as i64,
        )
    }
}

/// 클라이언트 목록 조회.
/// gpu_assets가 비어 있으면 통계 테이블의 식별자로 대체한다 (이름 없음).
pub async fn list_clients(conn: &PgHandle) -> Result<Vec<ClientRecord>> {
    let rows = conn
        .query(gpu_assets::SELECT_CLIENTS, &[])
        .await
        .map_err(|e| gpuf_dash_error::query_err(gpu_assets::SELECT_CLIENTS, Vec::new(), e))?;

    let mut clients: Vec<ClientRecord> = rows
        .iter()
        .map(|row| ClientRecord {
            client_id: row.get(0),
            client_name: row.get(1),
        })
        .collect();

    if clients.is_empty() {
        debug!("gpu_assets 비어 있음. client_daily_stats에서 목록 대체");
        let rows = conn
            .query(client_daily_stats::SELECT_CLIENTS_FALLBACK, &[])
            .await
            .map_err(|e| {
                gpuf_dash_error::query_err(
                    client_daily_stats::SELECT_CLIENTS_FALLBACK,
                    Vec::new(),
                    e,
                )
            })?;
        clients = rows
            .iter()
            .map(|row| ClientRecord {
                client_id: row.get(0),
                client_name: None,
            })
            .collect();
    }

    Ok(clients)
}

/// 디바이스 목록 조회. 클라이언트 필터는 선택이다.
pub async fn list_devices(
    conn: &PgHandle,
    client_id: Option<&[u8]>,
) -> Result<Vec<DeviceRecord>> {
    let mut sql = device_daily_stats::SELECT_DEVICES_BASE.trim_end().to_string();
    let mut params: Vec<BindValue> = Vec::new();

    if let Some(id) = client_id {
        params.push(BindValue::ClientId(id.to_vec()));
        sql.push_str("\n    WHERE d.client_id = $1");
    }
    sql.push_str("\n    ORDER BY d.client_id, d.device_index");

    let rows = conn
        .query(&sql, &sql_params(&params))
        .await
        .map_err(|e| gpuf_dash_error::query_err(&sql, rendered_params(&params), e))?;

    let devices = rows
        .iter()
        .map(|row| DeviceRecord {
            client_id: row.get(0),
            device_index: row.get(1),
            device_name: row.get(2),
            client_name: row.get(3),
        })
        .collect();

    Ok(devices)
}
