use chrono::NaiveDate;

use gpuf_dash_error::{DashboardError, Result};

/// 테이블 셀 값. Null은 "표본 없음"을 뜻하며 0과 구분된다.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Date(NaiveDate),
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// 숫자형 셀 값. Int/Float 외에는 None.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(v) => Some(*v as f64),
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// 표시/내보내기용 문자열. 날짜는 ISO, 식별자는 hex.
    pub fn render(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            CellValue::Bytes(b) => hex::encode(b),
            CellValue::Int(v) => v.to_string(),
            CellValue::Float(v) => v.to_string(),
            CellValue::Text(s) => s.clone(),
        }
    }
}

/// 컬럼명 + 행 목록으로 구성된 평면 테이블.
/// 표시용 테이블과 CSV 내보내기의 공통 표현이다.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl DataTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// 행 추가. 컬럼 수가 맞지 않으면 집계 에러.
    pub fn push_row(&mut self, row: Vec<CellValue>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(DashboardError::Aggregation {
                column: "*".to_string(),
                row: format!("#{}", self.rows.len()),
                detail: format!(
                    "행 길이 {} != 컬럼 수 {}",
                    row.len(),
                    self.columns.len()
                ),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// 컬럼 인덱스 조회. 없으면 집계 에러.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| DashboardError::Aggregation {
            column: name.to_string(),
            row: "*".to_string(),
            detail: "테이블에 없는 컬럼".to_string(),
        })
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// 행별 계산값으로 새 컬럼을 덧붙인 복사본을 만든다.
    pub fn with_column<F>(&self, name: &str, mut f: F) -> Result<DataTable>
    where
        F: FnMut(usize, &[CellValue]) -> Result<CellValue>,
    {
        let mut columns = self.columns.clone();
        columns.push(name.to_string());

        let mut out = DataTable::new(columns);
        for (i, row) in self.rows.iter().enumerate() {
            let mut cells = row.clone();
            cells.push(f(i, row)?);
            out.push_row(cells)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn push_row_rejects_arity_mismatch() {
        let mut table = DataTable::new(vec!["date".into(), "value".into()]);
        let err = table
            .push_row(vec![CellValue::Date(date("2024-01-01"))])
            .unwrap_err();
        match err {
            DashboardError::Aggregation { row, .. } => assert_eq!(row, "#0"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn render_uses_iso_dates_and_hex_ids() {
        assert_eq!(CellValue::Date(date("2024-03-09")).render(), "2024-03-09");
        assert_eq!(CellValue::Bytes(vec![0x11, 0xaa]).render(), "11aa");
        assert_eq!(CellValue::Null.render(), "");
        assert_eq!(CellValue::Float(2.5).render(), "2.5");
    }

    #[test]
    fn null_is_not_numeric() {
        assert_eq!(CellValue::Null.as_f64(), None);
        assert_eq!(CellValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(CellValue::Text("3".into()).as_f64(), None);
    }

    #[test]
    fn with_column_appends_computed_cells() {
        let mut table = DataTable::new(vec!["value".into()]);
        table.push_row(vec![CellValue::Int(1)]).unwrap();
        table.push_row(vec![CellValue::Int(2)]).unwrap();

        let doubled = table
            .with_column("doubled", |_, row| {
                Ok(CellValue::Float(row[0].as_f64().unwrap() * 2.0))
            })
            .unwrap();

        assert_eq!(doubled.columns(), ["value", "doubled"]);
        assert_eq!(doubled.cell(1, "doubled"), Some(&CellValue::Float(4.0)));
    }
}
