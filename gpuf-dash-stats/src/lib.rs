pub mod table;
pub mod labels;
pub mod aggregate;
pub mod pivot;
pub mod export;

pub use table::{
    CellValue,
    DataTable,
};

pub use labels::{
    client_label,
    device_label,
    with_client_labels,
    with_device_labels,
};

pub use aggregate::{
    BYTES_PER_MEGABYTE,
    NETWORK_MB_COLUMNS,
    bytes_to_megabytes,
    group_and_average,
};

pub use pivot::{
    TimeSeriesFrame,
    build_frames,
    pivot,
};

pub use export::{
    default_export_name,
    to_csv_string,
    write_csv,
};
