use std::io::Write;

use chrono::NaiveDate;

use gpuf_dash_error::Result;

use crate::table::DataTable;

/// 구분자/따옴표/개행이 들어간 필드만 따옴표로 감싼다
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// 테이블을 CSV로 기록한다.
///
/// UTF-8, 헤더 행 = 컬럼명, 날짜는 ISO `YYYY-MM-DD`, 식별자는 hex.
/// 바이트 카운터는 원본 단위 그대로 나간다 (MB 변환은 차트 전용).
pub fn write_csv<W: Write>(table: &DataTable, mut writer: W) -> Result<()> {
    let header = table
        .columns()
        .iter()
        .map(|c| escape_field(c))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(writer, "{header}")?;

    for row in table.rows() {
        let line = row
            .iter()
            .map(|cell| escape_field(&cell.render()))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(writer, "{line}")?;
    }

    writer.flush()?;
    Ok(())
}

/// CSV 문자열 생성
pub fn to_csv_string(table: &DataTable) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    // write_csv는 UTF-8 문자열만 기록한다
    String::from_utf8(buf).map_err(gpuf_dash_error::internal_err)
}

/// 기본 내보내기 파일명: `<prefix>_YYYYMMDD.csv`
pub fn default_export_name(prefix: &str, today: NaiveDate) -> String {
    format!("{}_{}.csv", prefix, today.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::CellValue;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn header_dates_and_raw_byte_units() {
        let mut table = DataTable::new(vec![
            "date".into(),
            "client_id".into(),
            "total_network_in_bytes".into(),
        ]);
        table
            .push_row(vec![
                CellValue::Date(date("2024-01-02")),
                CellValue::Bytes(vec![0x11, 0x11, 0xaa, 0xaa]),
                CellValue::Int(2_097_152),
            ])
            .unwrap();

        let csv = to_csv_string(&table).unwrap();
        assert_eq!(
            csv,
            "date,client_id,total_network_in_bytes\n2024-01-02,1111aaaa,2097152\n"
        );
    }

    #[test]
    fn fields_with_delimiters_are_quoted() {
        let mut table = DataTable::new(vec!["client_name".into()]);
        table
            .push_row(vec![CellValue::Text("GPU, rack \"B\"".into())])
            .unwrap();

        let csv = to_csv_string(&table).unwrap();
        assert_eq!(csv, "client_name\n\"GPU, rack \"\"B\"\"\"\n");
    }

    #[test]
    fn null_cells_export_empty() {
        let mut table = DataTable::new(vec!["a".into(), "b".into()]);
        table
            .push_row(vec![CellValue::Null, CellValue::Float(1.5)])
            .unwrap();

        let csv = to_csv_string(&table).unwrap();
        assert_eq!(csv, "a,b\n,1.5\n");
    }

    #[test]
    fn export_name_embeds_date() {
        assert_eq!(
            default_export_name("client_stats", date("2024-03-09")),
            "client_stats_20240309.csv"
        );
    }
}
