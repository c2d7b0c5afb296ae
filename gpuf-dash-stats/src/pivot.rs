use std::collections::BTreeSet;

use chrono::NaiveDate;

use gpuf_dash_error::{DashboardError, Result};

use crate::table::{CellValue, DataTable};

/// 한 메트릭의 시계열 행렬. 행 = 날짜, 열 = 엔티티 라벨.
///
/// 셀이 None이면 해당 (날짜, 엔티티) 조합에 표본이 없다는 뜻이다.
/// 0.0으로 메꾸지 않아야 차트가 가짜 하락 대신 실제 공백을 그린다.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesFrame {
    metric: String,
    index: Vec<NaiveDate>,
    columns: Vec<String>,
    cells: Vec<Vec<Option<f64>>>,
}

impl TimeSeriesFrame {
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// 날짜 인덱스 (오름차순)
    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    /// 엔티티 라벨 (사전순)
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<f64> {
        *self.cells.get(row)?.get(col)?
    }

    /// (날짜, 라벨)로 셀 조회. 조합이 없으면 None.
    pub fn value(&self, date: NaiveDate, column: &str) -> Option<f64> {
        let row = self.index.iter().position(|d| *d == date)?;
        let col = self.columns.iter().position(|c| c == column)?;
        self.cells[row][col]
    }

    /// 라벨별 (날짜, 값) 시리즈. 표본 없는 날짜는 건너뛴다.
    pub fn series(&self, column: &str) -> Vec<(NaiveDate, f64)> {
        let Some(col) = self.columns.iter().position(|c| c == column) else {
            return Vec::new();
        };
        self.index
            .iter()
            .zip(&self.cells)
            .filter_map(|(date, row)| row[col].map(|v| (*date, v)))
            .collect()
    }
}

/// 행 단위 테이블을 메트릭 하나의 (날짜 × 라벨) 행렬로 피벗한다.
///
/// 입력에 없는 (날짜, 라벨) 조합은 셀이 비어 있는 채로 남는다. 같은 조합이
/// 두 번 나오면 집계 에러. 호출자는 먼저 group_and_average로 접어야 한다.
pub fn pivot(
    table: &DataTable,
    index_key: &str,
    column_key: &str,
    value_key: &str,
) -> Result<TimeSeriesFrame> {
    let index_idx = table.require_column(index_key)?;
    let column_idx = table.require_column(column_key)?;
    let value_idx = table.require_column(value_key)?;

    let mut dates: BTreeSet<NaiveDate> = BTreeSet::new();
    let mut labels: BTreeSet<String> = BTreeSet::new();
    let mut entries: Vec<(NaiveDate, String, Option<f64>)> = Vec::with_capacity(table.len());

    for (i, row) in table.rows().iter().enumerate() {
        let date = match &row[index_idx] {
            CellValue::Date(d) => *d,
            other => {
                return Err(DashboardError::Aggregation {
                    column: index_key.to_string(),
                    row: format!("#{i}"),
                    detail: format!("피벗 인덱스가 날짜가 아님: {other:?}"),
                });
            }
        };
        let label = row[column_idx].render();

        let cell = &row[value_idx];
        let value = if cell.is_null() {
            None
        } else {
            Some(cell.as_f64().ok_or_else(|| DashboardError::Aggregation {
                column: value_key.to_string(),
                row: format!("{}/{}", date.format("%Y-%m-%d"), label),
                detail: format!("숫자 컬럼에 숫자가 아닌 값: {cell:?}"),
            })?)
        };

        dates.insert(date);
        labels.insert(label.clone());
        entries.push((date, label, value));
    }

    let index: Vec<NaiveDate> = dates.into_iter().collect();
    let columns: Vec<String> = labels.into_iter().collect();
    let mut cells = vec![vec![None; columns.len()]; index.len()];
    let mut filled = vec![vec![false; columns.len()]; index.len()];

    for (date, label, value) in entries {
        let r = index
            .binary_search(&date)
            .map_err(|_| gpuf_dash_error::internal_err("피벗 날짜 인덱스 불일치"))?;
        let c = columns
            .binary_search(&label)
            .map_err(|_| gpuf_dash_error::internal_err("피벗 라벨 인덱스 불일치"))?;

        if filled[r][c] {
            return Err(DashboardError::Aggregation {
                column: value_key.to_string(),
                row: format!("{}/{}", date.format("%Y-%m-%d"), label),
                detail: "중복 (날짜, 라벨) 조합. 먼저 그룹 평균으로 접을 것".to_string(),
            });
        }
        filled[r][c] = true;
        cells[r][c] = value;
    }

    Ok(TimeSeriesFrame {
        metric: value_key.to_string(),
        index,
        columns,
        cells,
    })
}

/// 테이블에 존재하는 메트릭 컬럼마다 프레임 하나씩 피벗한다.
/// 스키마에서 빠진 메트릭은 조용히 건너뛴다 (호출자가 컬럼 유무로 구분 가능).
pub fn build_frames(
    table: &DataTable,
    index_key: &str,
    column_key: &str,
    metrics: &[&str],
) -> Result<Vec<TimeSeriesFrame>> {
    let mut frames = Vec::new();
    for metric in metrics {
        if !table.has_column(metric) {
            continue;
        }
        frames.push(pivot(table, index_key, column_key, metric)?);
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_table() -> DataTable {
        let mut table = DataTable::new(vec!["date".into(), "label".into(), "value".into()]);
        for (d, label, v) in [
            ("2024-01-01", "A", 10.0),
            ("2024-01-01", "B", 20.0),
            ("2024-01-02", "A", 30.0),
        ] {
            table
                .push_row(vec![
                    CellValue::Date(date(d)),
                    CellValue::Text(label.into()),
                    CellValue::Float(v),
                ])
                .unwrap();
        }
        table
    }

    #[test]
    fn missing_combination_stays_absent_not_zero() {
        let frame = pivot(&sample_table(), "date", "label", "value").unwrap();

        assert_eq!(frame.index(), [date("2024-01-01"), date("2024-01-02")]);
        assert_eq!(frame.columns(), ["A", "B"]);
        assert_eq!(frame.value(date("2024-01-01"), "A"), Some(10.0));
        assert_eq!(frame.value(date("2024-01-01"), "B"), Some(20.0));
        assert_eq!(frame.value(date("2024-01-02"), "A"), Some(30.0));
        // (2024-01-02, B)는 0이 아니라 공백
        assert_eq!(frame.value(date("2024-01-02"), "B"), None);
    }

    #[test]
    fn series_skips_gaps() {
        let frame = pivot(&sample_table(), "date", "label", "value").unwrap();
        assert_eq!(frame.series("B"), vec![(date("2024-01-01"), 20.0)]);
        assert_eq!(
            frame.series("A"),
            vec![(date("2024-01-01"), 10.0), (date("2024-01-02"), 30.0)]
        );
    }

    #[test]
    fn duplicate_combination_is_rejected() {
        let mut table = sample_table();
        table
            .push_row(vec![
                CellValue::Date(date("2024-01-01")),
                CellValue::Text("A".into()),
                CellValue::Float(99.0),
            ])
            .unwrap();

        let err = pivot(&table, "date", "label", "value").unwrap_err();
        match err {
            DashboardError::Aggregation { row, .. } => assert_eq!(row, "2024-01-01/A"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn non_date_index_is_rejected() {
        let mut table = DataTable::new(vec!["date".into(), "label".into(), "value".into()]);
        table
            .push_row(vec![
                CellValue::Text("not-a-date".into()),
                CellValue::Text("A".into()),
                CellValue::Float(1.0),
            ])
            .unwrap();

        assert!(matches!(
            pivot(&table, "date", "label", "value"),
            Err(DashboardError::Aggregation { .. })
        ));
    }

    #[test]
    fn null_value_leaves_cell_absent() {
        let mut table = DataTable::new(vec!["date".into(), "label".into(), "value".into()]);
        table
            .push_row(vec![
                CellValue::Date(date("2024-01-01")),
                CellValue::Text("A".into()),
                CellValue::Null,
            ])
            .unwrap();

        let frame = pivot(&table, "date", "label", "value").unwrap();
        assert_eq!(frame.value(date("2024-01-01"), "A"), None);
    }

    #[test]
    fn build_frames_skips_absent_metrics() {
        let frames = build_frames(
            &sample_table(),
            "date",
            "label",
            &["value", "avg_temperature"],
        )
        .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].metric(), "value");
    }
}
