use std::collections::HashMap;

use log::debug;

use gpuf_dash_error::{DashboardError, Result};

use crate::table::{CellValue, DataTable};

/// 1 MB = 1048576 bytes
pub const BYTES_PER_MEGABYTE: f64 = 1_048_576.0;

/// 차트용 네트워크 카운터 변환 (원본 바이트 컬럼에서 MB 컬럼 생성)
pub const NETWORK_MB_COLUMNS: [(&str, &str); 2] = [
    ("total_network_in_bytes", "total_network_in_mb"),
    ("total_network_out_bytes", "total_network_out_mb"),
];

/// 그룹 키 셀 렌더링. 에러 메시지의 행 식별자로도 쓴다.
fn group_key(row: &[CellValue], key_indices: &[usize]) -> String {
    key_indices
        .iter()
        .map(|&i| row[i].render())
        .collect::<Vec<_>>()
        .join("/")
}

fn non_numeric_err(column: &str, row_key: &str, cell: &CellValue) -> DashboardError {
    DashboardError::Aggregation {
        column: column.to_string(),
        row: row_key.to_string(),
        detail: format!("숫자 컬럼에 숫자가 아닌 값: {cell:?}"),
    }
}

/// 같은 그룹 키를 가진 행들의 숫자 컬럼을 산술평균으로 접는다.
///
/// 숫자가 아닌 컬럼은 그룹의 첫 행 값을 그대로 유지한다. Null은 "표본 없음"으로
/// 평균에서 제외되며, 그룹 전체가 Null이면 결과도 Null이다. 숫자 컬럼에서
/// Text/Date/Bytes 셀을 만나면 해당 컬럼과 행 키를 담아 집계 에러를 낸다.
/// 그룹 순서는 입력에서 처음 등장한 순서를 따른다 (입력 정렬이 곧 출력 정렬).
pub fn group_and_average(
    table: &DataTable,
    group_keys: &[&str],
    numeric_columns: &[&str],
) -> Result<DataTable> {
    let key_indices = group_keys
        .iter()
        .map(|k| table.require_column(k))
        .collect::<Result<Vec<_>>>()?;

    // 테이블에 실제로 존재하는 숫자 컬럼만 집계 대상
    let numeric_indices: Vec<usize> = numeric_columns
        .iter()
        .filter_map(|c| table.column_index(c))
        .collect();

    struct Group {
        representative: Vec<CellValue>,
        sums: Vec<f64>,
        counts: Vec<u64>,
    }

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Group> = HashMap::new();

    for row in table.rows() {
        let key = group_key(row, &key_indices);
        let group = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            Group {
                representative: row.clone(),
                sums: vec![0.0; numeric_indices.len()],
                counts: vec![0; numeric_indices.len()],
            }
        });

        for (slot, &col_idx) in numeric_indices.iter().enumerate() {
            let cell = &row[col_idx];
            if cell.is_null() {
                continue;
            }
            match cell.as_f64() {
                Some(v) => {
                    group.sums[slot] += v;
                    group.counts[slot] += 1;
                }
                None => {
                    return Err(non_numeric_err(&table.columns()[col_idx], &key, cell));
                }
            }
        }
    }

    debug!("{}개 행을 {}개 그룹으로 집계", table.len(), order.len());

    let mut out = DataTable::new(table.columns().to_vec());
    for key in order {
        let group = &groups[&key];
        let mut cells = group.representative.clone();
        for (slot, &col_idx) in numeric_indices.iter().enumerate() {
            cells[col_idx] = if group.counts[slot] == 0 {
                CellValue::Null
            } else {
                CellValue::Float(group.sums[slot] / group.counts[slot] as f64)
            };
        }
        out.push_row(cells)?;
    }

    Ok(out)
}

/// 바이트 컬럼을 MB 컬럼으로 변환한 복사본을 만든다.
///
/// 명시적으로 호출해야만 수행되는 변환이다. 그룹핑/피벗은 단위를 건드리지
/// 않으며, CSV 내보내기는 항상 원본 단위를 쓴다.
pub fn bytes_to_megabytes(table: &DataTable, conversions: &[(&str, &str)]) -> Result<DataTable> {
    let mut out = table.clone();
    for &(source, target) in conversions {
        let source_idx = out.require_column(source)?;
        out = out.with_column(target, |i, row| {
            let cell = &row[source_idx];
            if cell.is_null() {
                return Ok(CellValue::Null);
            }
            match cell.as_f64() {
                Some(v) => Ok(CellValue::Float(v / BYTES_PER_MEGABYTE)),
                None => Err(non_numeric_err(source, &format!("#{i}"), cell)),
            }
        })?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_table() -> DataTable {
        let mut table = DataTable::new(vec![
            "date".into(),
            "client_label".into(),
            "avg_cpu_usage".into(),
        ]);
        for (d, label, cpu) in [
            ("2024-01-01", "GPU-A (1111aaaa...)", Some(40.0)),
            ("2024-01-01", "GPU-A (1111aaaa...)", Some(60.0)),
            ("2024-01-02", "GPU-A (1111aaaa...)", Some(30.0)),
        ] {
            table
                .push_row(vec![
                    CellValue::Date(date(d)),
                    CellValue::Text(label.into()),
                    cpu.map(CellValue::Float).unwrap_or(CellValue::Null),
                ])
                .unwrap();
        }
        table
    }

    #[test]
    fn same_group_rows_collapse_to_mean() {
        let grouped = group_and_average(
            &sample_table(),
            &["date", "client_label"],
            &["avg_cpu_usage"],
        )
        .unwrap();

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped.cell(0, "avg_cpu_usage"), Some(&CellValue::Float(50.0)));
        assert_eq!(grouped.cell(1, "avg_cpu_usage"), Some(&CellValue::Float(30.0)));
    }

    #[test]
    fn null_samples_are_skipped_not_zeroed() {
        let mut table = DataTable::new(vec!["date".into(), "label".into(), "m".into()]);
        table
            .push_row(vec![
                CellValue::Date(date("2024-01-01")),
                CellValue::Text("A".into()),
                CellValue::Null,
            ])
            .unwrap();
        table
            .push_row(vec![
                CellValue::Date(date("2024-01-01")),
                CellValue::Text("A".into()),
                CellValue::Float(10.0),
            ])
            .unwrap();

        let grouped = group_and_average(&table, &["date", "label"], &["m"]).unwrap();
        // Null 표본은 분모에 들어가지 않는다: (10) / 1, (10+0) / 2 가 아님
        assert_eq!(grouped.cell(0, "m"), Some(&CellValue::Float(10.0)));
    }

    #[test]
    fn all_null_group_stays_null() {
        let mut table = DataTable::new(vec!["label".into(), "m".into()]);
        table
            .push_row(vec![CellValue::Text("A".into()), CellValue::Null])
            .unwrap();

        let grouped = group_and_average(&table, &["label"], &["m"]).unwrap();
        assert_eq!(grouped.cell(0, "m"), Some(&CellValue::Null));
    }

    #[test]
    fn non_numeric_cell_in_numeric_column_is_typed_error() {
        let mut table = DataTable::new(vec!["label".into(), "avg_cpu_usage".into()]);
        table
            .push_row(vec![
                CellValue::Text("A".into()),
                CellValue::Text("n/a".into()),
            ])
            .unwrap();

        let err = group_and_average(&table, &["label"], &["avg_cpu_usage"]).unwrap_err();
        match err {
            DashboardError::Aggregation { column, row, .. } => {
                assert_eq!(column, "avg_cpu_usage");
                assert_eq!(row, "A");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn identifier_columns_carry_through_from_representative() {
        let mut table = DataTable::new(vec!["label".into(), "client_id".into(), "m".into()]);
        let id = CellValue::Bytes(vec![0x11, 0x11]);
        table
            .push_row(vec![CellValue::Text("A".into()), id.clone(), CellValue::Float(1.0)])
            .unwrap();
        table
            .push_row(vec![CellValue::Text("A".into()), id.clone(), CellValue::Float(3.0)])
            .unwrap();

        let grouped = group_and_average(&table, &["label"], &["m"]).unwrap();
        assert_eq!(grouped.cell(0, "client_id"), Some(&id));
        assert_eq!(grouped.cell(0, "m"), Some(&CellValue::Float(2.0)));
    }

    #[test]
    fn missing_numeric_columns_are_ignored() {
        // 스키마에서 빠진 선택 컬럼은 집계 대상에 없을 뿐 에러가 아니다
        let mut table = DataTable::new(vec!["label".into(), "avg_cpu_usage".into()]);
        table
            .push_row(vec![CellValue::Text("A".into()), CellValue::Float(5.0)])
            .unwrap();

        let grouped =
            group_and_average(&table, &["label"], &["avg_cpu_usage", "avg_disk_usage"]).unwrap();
        assert_eq!(grouped.cell(0, "avg_cpu_usage"), Some(&CellValue::Float(5.0)));
    }

    #[test]
    fn two_megabytes_exactly() {
        let mut table = DataTable::new(vec!["total_network_in_bytes".into()]);
        table.push_row(vec![CellValue::Int(2_097_152)]).unwrap();

        let converted = bytes_to_megabytes(
            &table,
            &[("total_network_in_bytes", "total_network_in_mb")],
        )
        .unwrap();

        assert_eq!(
            converted.cell(0, "total_network_in_mb"),
            Some(&CellValue::Float(2.0))
        );
        // 원본 컬럼은 원래 단위 그대로
        assert_eq!(
            converted.cell(0, "total_network_in_bytes"),
            Some(&CellValue::Int(2_097_152))
        );
    }

    #[test]
    fn conversion_requires_source_column() {
        let table = DataTable::new(vec!["other".into()]);
        let err = bytes_to_megabytes(&table, &[("total_network_in_bytes", "mb")]).unwrap_err();
        assert!(matches!(err, DashboardError::Aggregation { .. }));
    }
}
