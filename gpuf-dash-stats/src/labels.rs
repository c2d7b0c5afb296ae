use gpuf_dash_error::Result;

use crate::table::{CellValue, DataTable};

/// 식별자 앞 8자리 hex + 말줄임 접미사
fn short_hex(id: &[u8]) -> String {
    let full = hex::encode(id);
    let head: String = full.chars().take(8).collect();
    format!("{head}...")
}

/// 클라이언트 표시 라벨.
/// 이름이 같아도 식별자 접미사로 시리즈가 구분되도록 접미사는 항상 붙인다.
pub fn client_label(name: Option<&str>, client_id: &[u8]) -> String {
    match name.filter(|n| !n.is_empty()) {
        Some(n) => format!("{} ({})", n, short_hex(client_id)),
        None => format!("Client {}", short_hex(client_id)),
    }
}

/// 디바이스 표시 라벨. 식별자는 (client_id, device_index) 쌍이므로 둘 다 노출한다.
pub fn device_label(name: Option<&str>, client_id: &[u8], device_index: i64) -> String {
    match name.filter(|n| !n.is_empty()) {
        Some(n) => format!("{} (device {}, {})", n, device_index, short_hex(client_id)),
        None => format!("Device {} ({})", device_index, short_hex(client_id)),
    }
}

/// 클라이언트 라벨 컬럼을 덧붙인 테이블 복사본
pub fn with_client_labels(
    table: &DataTable,
    id_column: &str,
    name_column: &str,
    label_column: &str,
) -> Result<DataTable> {
    let id_idx = table.require_column(id_column)?;
    let name_idx = table.column_index(name_column);

    table.with_column(label_column, |i, row| {
        let id = match &row[id_idx] {
            CellValue::Bytes(b) => b.as_slice(),
            other => {
                return Err(gpuf_dash_error::agg_err(
                    id_column,
                    &format!("#{i}"),
                    format!("식별자 컬럼이 바이너리가 아님: {other:?}"),
                ));
            }
        };
        let name = name_idx.and_then(|idx| match &row[idx] {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        });
        Ok(CellValue::Text(client_label(name, id)))
    })
}

/// 디바이스 라벨 컬럼을 덧붙인 테이블 복사본
pub fn with_device_labels(
    table: &DataTable,
    id_column: &str,
    index_column: &str,
    name_column: &str,
    label_column: &str,
) -> Result<DataTable> {
    let id_idx = table.require_column(id_column)?;
    let index_idx = table.require_column(index_column)?;
    let name_idx = table.column_index(name_column);

    table.with_column(label_column, |i, row| {
        let id = match &row[id_idx] {
            CellValue::Bytes(b) => b.as_slice(),
            other => {
                return Err(gpuf_dash_error::agg_err(
                    id_column,
                    &format!("#{i}"),
                    format!("식별자 컬럼이 바이너리가 아님: {other:?}"),
                ));
            }
        };
        let index = match &row[index_idx] {
            CellValue::Int(v) => *v,
            other => {
                return Err(gpuf_dash_error::agg_err(
                    index_column,
                    &format!("#{i}"),
                    format!("디바이스 인덱스가 정수가 아님: {other:?}"),
                ));
            }
        };
        let name = name_idx.and_then(|idx| match &row[idx] {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        });
        Ok(CellValue::Text(device_label(name, id, index)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_distinct_ids_stay_distinct() {
        let a = client_label(Some("GPU-A"), &[0x11, 0x11, 0xaa, 0xaa, 0x01, 0x02]);
        let b = client_label(Some("GPU-A"), &[0x22, 0x22, 0xbb, 0xbb, 0x01, 0x02]);
        assert_eq!(a, "GPU-A (1111aaaa...)");
        assert_eq!(b, "GPU-A (2222bbbb...)");
        assert_ne!(a, b);
    }

    #[test]
    fn missing_name_falls_back_to_entity_kind() {
        let label = client_label(None, &[0x11, 0x11, 0xaa, 0xaa]);
        assert_eq!(label, "Client 1111aaaa...");
    }

    #[test]
    fn empty_name_counts_as_absent() {
        let label = client_label(Some(""), &[0x11, 0x11, 0xaa, 0xaa]);
        assert_eq!(label, "Client 1111aaaa...");
    }

    #[test]
    fn device_label_includes_index_and_client_suffix() {
        let id = [0x11u8, 0x11, 0xaa, 0xaa];
        assert_eq!(
            device_label(Some("RTX-4090"), &id, 1),
            "RTX-4090 (device 1, 1111aaaa...)"
        );
        assert_eq!(device_label(None, &id, 0), "Device 0 (1111aaaa...)");
    }

    #[test]
    fn label_column_appended_per_row() {
        let mut table = DataTable::new(vec!["client_id".into(), "client_name".into()]);
        table
            .push_row(vec![
                CellValue::Bytes(vec![0x11, 0x11, 0xaa, 0xaa]),
                CellValue::Text("GPU-A".into()),
            ])
            .unwrap();
        table
            .push_row(vec![
                CellValue::Bytes(vec![0x22, 0x22, 0xbb, 0xbb]),
                CellValue::Null,
            ])
            .unwrap();

        let labelled =
            with_client_labels(&table, "client_id", "client_name", "client_label").unwrap();
        assert_eq!(
            labelled.cell(0, "client_label"),
            Some(&CellValue::Text("GPU-A (1111aaaa...)".into()))
        );
        assert_eq!(
            labelled.cell(1, "client_label"),
            Some(&CellValue::Text("Client 2222bbbb...".into()))
        );
    }
}
