/// 클라이언트 메타데이터 테이블
pub const TABLE: &str = "gpu_assets";

/// 클라이언트 목록 조회 쿼리
pub const SELECT_CLIENTS: &str = "
    SELECT DISTINCT ga.client_id, ga.client_name
    FROM gpu_assets ga
    WHERE ga.client_id IS NOT NULL
    ORDER BY ga.client_name, ga.client_id
";
