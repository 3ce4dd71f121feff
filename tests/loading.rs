mod common;

use std::{
    fs::File,
    io::{Read, Write},
    net::TcpListener,
    sync::Arc,
    thread,
    time::Duration,
};

use common::{TestWorkspace, YELLOW_CSV};
use parquet::{
    data_type::{DoubleType, Int64Type},
    file::{properties::WriterProperties, writer::SerializedFileWriter},
    schema::parser::parse_message_type,
};
use taxi_lens::{
    data::Value,
    error::{DownloadError, Error, LoadError},
    filter::{FilterState, NumericRange},
    loader::{Loader, LoaderOptions, SourceDescriptor},
    normalize::{self, FARE_AMOUNT, PICKUP_DATETIME},
    period,
    schema::ColumnType,
};

fn local(path: std::path::PathBuf) -> SourceDescriptor {
    SourceDescriptor::Local { path, format: None }
}

fn http_response(content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Answers one connection per entry in `responses`, in order, and hands back
/// the request line of each.
fn serve(responses: Vec<String>) -> (u16, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server = thread::spawn(move || {
        let mut requests = Vec::new();
        for response in responses {
            let Ok((mut stream, _)) = listener.accept() else {
                break;
            };
            let mut buffer = [0u8; 2048];
            let read = stream.read(&mut buffer).unwrap_or(0);
            let request = String::from_utf8_lossy(&buffer[..read]);
            requests.push(request.lines().next().unwrap_or_default().to_string());
            let _ = stream.write_all(response.as_bytes());
        }
        requests
    });
    (port, server)
}

fn load_remote(port: u16, timeout: Duration) -> Result<usize, Error> {
    let mut loader = Loader::new(LoaderOptions {
        timeout,
        ..LoaderOptions::default()
    });
    loader
        .load(&SourceDescriptor::Remote {
            link: format!("http://127.0.0.1:{port}/yellow.csv"),
            format: None,
        })
        .map(|loaded| loaded.table.row_count())
}

const SCAN_WARNING_PAGE: &str = r#"<html><body>
<p>Google Drive can't scan this file for viruses.</p>
<form id="download-form" action="/download" method="get">
<input type="submit" value="Download anyway"/>
<input type="hidden" name="id" value="1a2B">
<input type="hidden" name="confirm" value="t">
<input type="hidden" name="uuid" value="abc">
</form></body></html>"#;

#[test]
fn identical_files_multiply_the_row_count() {
    let workspace = TestWorkspace::new();
    let paths = (0..4)
        .map(|idx| workspace.write(&format!("part-{idx}.csv"), YELLOW_CSV))
        .collect::<Vec<_>>();
    let mut loader = Loader::new(LoaderOptions::default());
    let loaded = loader
        .load(&SourceDescriptor::Multi { paths, format: None })
        .expect("load parts");
    assert_eq!(loaded.table.row_count(), 12);
    assert_eq!(loaded.files_loaded, 4);
    assert!(loaded.failures.is_empty());
}

#[test]
fn multi_file_union_fills_missing_columns() {
    let workspace = TestWorkspace::new();
    let first = workspace.write(
        "old.csv",
        "tpep_pickup_datetime,fare_amount\n2014-05-01 10:00:00,7\n",
    );
    let second = workspace.write(
        "new.csv",
        "tpep_pickup_datetime,fare_amount,congestion_surcharge\n2019-05-01 10:00:00,8.5,2.5\n",
    );
    let mut loader = Loader::new(LoaderOptions::default());
    let loaded = loader
        .load(&SourceDescriptor::Multi {
            paths: vec![first, second],
            format: None,
        })
        .expect("union");
    let table = &loaded.table;
    assert_eq!(
        table.column_names(),
        vec!["tpep_pickup_datetime", "fare_amount", "congestion_surcharge"]
    );
    assert_eq!(table.column_type(FARE_AMOUNT), Some(&ColumnType::Float));
    let surcharge = table
        .column_values("congestion_surcharge")
        .expect("surcharge column")
        .map(|v| v.cloned())
        .collect::<Vec<_>>();
    assert_eq!(surcharge, vec![None, Some(Value::Float(2.5))]);
}

#[test]
fn unreadable_file_is_reported_and_the_rest_is_kept() {
    let workspace = TestWorkspace::new();
    let good = workspace.write("good.csv", YELLOW_CSV);
    let bad = workspace.write("notes.pdf", "%PDF-1.4");
    let mut loader = Loader::new(LoaderOptions::default());
    let loaded = loader
        .load(&SourceDescriptor::Multi {
            paths: vec![good, bad],
            format: None,
        })
        .expect("partial load");
    assert_eq!(loaded.table.row_count(), 3);
    assert_eq!(loaded.failures.len(), 1);
    assert_eq!(loaded.failures[0].source_name, "notes.pdf");
    assert!(matches!(
        loaded.failures[0].error,
        Error::Load(LoadError::UnsupportedFormat { .. })
    ));
}

#[test]
fn no_surviving_file_lists_every_failure() {
    let workspace = TestWorkspace::new();
    let first = workspace.write("a.pdf", "x");
    let second = workspace.write("b.csv", "");
    let mut loader = Loader::new(LoaderOptions::default());
    let err = loader
        .load(&SourceDescriptor::Multi {
            paths: vec![first, second],
            format: None,
        })
        .unwrap_err();
    match err {
        Error::Load(LoadError::NoUsableFiles { failures }) => assert_eq!(failures.len(), 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repeated_load_shares_the_cached_table() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("yellow.csv", YELLOW_CSV);
    let mut loader = Loader::new(LoaderOptions::default());
    let first = loader.load(&local(path.clone())).expect("first");
    let second = loader.load(&local(path)).expect("second");
    assert!(second.from_cache);
    assert!(Arc::ptr_eq(&first.table, &second.table));
}

#[test]
fn parquet_files_load_with_native_types() {
    let workspace = TestWorkspace::new();
    let path = workspace.path().join("yellow.parquet");
    let schema = Arc::new(
        parse_message_type(
            "message trips {
                REQUIRED INT64 tpep_pickup_datetime (TIMESTAMP_MICROS);
                OPTIONAL DOUBLE fare_amount;
                REQUIRED INT64 payment_type;
            }",
        )
        .expect("schema"),
    );
    let file = File::create(&path).expect("create parquet");
    let mut writer = SerializedFileWriter::new(file, schema, Arc::new(WriterProperties::builder().build()))
        .expect("writer");
    let mut row_group = writer.next_row_group().expect("row group");
    // 2024-01-01 00:00:00 and one hour later, in microseconds.
    let pickups = [1_704_067_200_000_000i64, 1_704_070_800_000_000];
    let mut column = row_group.next_column().expect("next").expect("pickup column");
    column
        .typed::<Int64Type>()
        .write_batch(&pickups, None, None)
        .expect("write pickups");
    column.close().expect("close pickups");
    let mut column = row_group.next_column().expect("next").expect("fare column");
    column
        .typed::<DoubleType>()
        .write_batch(&[11.5], Some(&[1, 0]), None)
        .expect("write fares");
    column.close().expect("close fares");
    let mut column = row_group.next_column().expect("next").expect("payment column");
    column
        .typed::<Int64Type>()
        .write_batch(&[1, 2], None, None)
        .expect("write payments");
    column.close().expect("close payments");
    row_group.close().expect("close row group");
    writer.close().expect("close writer");

    let mut loader = Loader::new(LoaderOptions::default());
    let loaded = loader.load(&local(path)).expect("load parquet");
    let normalized = normalize::normalize(&loaded.table);
    let table = normalized.table;
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.column_type(PICKUP_DATETIME), Some(&ColumnType::DateTime));
    let fares = table
        .column_values(FARE_AMOUNT)
        .expect("fares")
        .map(|v| v.cloned())
        .collect::<Vec<_>>();
    assert_eq!(fares, vec![Some(Value::Float(11.5)), None]);
}

#[test]
fn forbidden_download_carries_a_sharing_hint() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server = thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buffer = [0u8; 1024];
            let _ = stream.read(&mut buffer);
            let _ = stream.write_all(
                b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
        }
    });

    let mut loader = Loader::new(LoaderOptions {
        timeout: Duration::from_secs(5),
        ..LoaderOptions::default()
    });
    let err = loader
        .load(&SourceDescriptor::Remote {
            link: format!("http://127.0.0.1:{port}/yellow.csv"),
            format: None,
        })
        .unwrap_err();
    server.join().expect("server thread");
    assert!(matches!(
        err,
        Error::Download(DownloadError::Forbidden { status: 403, .. })
    ));
    assert!(err.hint().expect("hint").contains("Anyone with the link"));
}

#[test]
fn garbage_link_is_rejected_before_any_request() {
    let mut loader = Loader::new(LoaderOptions::default());
    let err = loader
        .load(&SourceDescriptor::Remote {
            link: "drive folder please".to_string(),
            format: None,
        })
        .unwrap_err();
    assert!(matches!(err, Error::Download(DownloadError::InvalidLink(_))));
    assert!(err.hint().expect("hint").contains("/file/d/"));
}

#[test]
fn fare_and_tip_files_merge_with_gaps() {
    let workspace = TestWorkspace::new();
    let a = workspace.write("a.csv", "pickup_datetime,fare_amount\n2024-01-01 10:00:00,9.5\n");
    let b = workspace.write("b.csv", "pickup_datetime,tip_amount\n2024-01-02 11:00:00,2.0\n");
    let mut loader = Loader::new(LoaderOptions::default());
    let loaded = loader
        .load(&SourceDescriptor::Multi {
            paths: vec![a, b],
            format: None,
        })
        .expect("merge");
    let table = &loaded.table;
    assert_eq!(
        table.column_names(),
        vec!["pickup_datetime", "fare_amount", "tip_amount"]
    );
    let fares = table.column_values(FARE_AMOUNT).expect("fares").map(|v| v.cloned()).collect::<Vec<_>>();
    let tips = table.column_values("tip_amount").expect("tips").map(|v| v.cloned()).collect::<Vec<_>>();
    assert_eq!(fares, vec![Some(Value::Float(9.5)), None]);
    assert_eq!(tips, vec![None, Some(Value::Float(2.0))]);
}

#[test]
fn blank_column_in_one_file_keeps_the_other_files_type() {
    let workspace = TestWorkspace::new();
    let a = workspace.write(
        "a.csv",
        "pickup_datetime,fare_amount,airport_fee\n2024-01-01 10:00:00,5.0,1.75\n",
    );
    let b = workspace.write(
        "b.csv",
        "pickup_datetime,fare_amount,airport_fee\n,,\n2024-01-03 09:00:00,,\n",
    );
    let mut loader = Loader::new(LoaderOptions::default());
    let loaded = loader
        .load(&SourceDescriptor::Multi {
            paths: vec![b, a],
            format: None,
        })
        .expect("merge");
    let table = &loaded.table;
    assert_eq!(table.column_type(FARE_AMOUNT), Some(&ColumnType::Float));
    assert_eq!(table.column_type("airport_fee"), Some(&ColumnType::Float));
    assert_eq!(table.column_type(PICKUP_DATETIME), Some(&ColumnType::DateTime));
    assert_eq!(table.numeric_values(FARE_AMOUNT), Some(vec![5.0]));

    let mut state = FilterState::default();
    state
        .set_numeric(FARE_AMOUNT, NumericRange::between(0.0, 10.0))
        .expect("range");
    assert_eq!(state.apply(table).row_count(), 1);
    assert!(period::detect(table).is_known());
}

#[test]
fn large_drive_file_is_fetched_after_confirming_the_scan_warning() {
    let (port, server) = serve(vec![
        http_response("text/html; charset=utf-8", SCAN_WARNING_PAGE),
        http_response("text/csv", YELLOW_CSV),
    ]);
    let rows = load_remote(port, Duration::from_secs(5)).expect("confirmed download");
    let requests = server.join().expect("server thread");
    assert_eq!(rows, 3);
    assert_eq!(requests.len(), 2);
    assert!(requests[0].starts_with("GET /yellow.csv "));
    assert!(requests[1].starts_with("GET /download?"));
    assert!(requests[1].contains("confirm=t"));
    assert!(requests[1].contains("uuid=abc"));
}

#[test]
fn repeated_scan_warning_has_its_own_hint() {
    let (port, server) = serve(vec![
        http_response("text/html", SCAN_WARNING_PAGE),
        http_response("text/html", SCAN_WARNING_PAGE),
    ]);
    let err = load_remote(port, Duration::from_secs(5)).unwrap_err();
    server.join().expect("server thread");
    assert!(matches!(
        err,
        Error::Download(DownloadError::ScanWarning { .. })
    ));
    let hint = err.hint().expect("hint");
    assert!(hint.contains("--input"));
    assert!(!hint.contains("Anyone with the link"));
}

#[test]
fn html_page_without_a_confirmation_is_not_a_file() {
    let (port, server) = serve(vec![http_response(
        "text/html",
        "<html><body>Sign in to continue</body></html>",
    )]);
    let err = load_remote(port, Duration::from_secs(5)).unwrap_err();
    let requests = server.join().expect("server thread");
    assert_eq!(requests.len(), 1);
    match &err {
        Error::Download(DownloadError::NotAFile { content_type, .. }) => {
            assert_eq!(content_type, "text/html")
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.hint().expect("hint").contains("Anyone with the link"));
}

#[test]
fn silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server = thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buffer = [0u8; 1024];
            let _ = stream.read(&mut buffer);
            thread::sleep(Duration::from_secs(3));
        }
    });

    let err = load_remote(port, Duration::from_secs(1)).unwrap_err();
    server.join().expect("server thread");
    assert!(matches!(
        err,
        Error::Download(DownloadError::Timeout { seconds: 1, .. })
    ));
    assert!(err.hint().expect("hint").contains("--timeout-secs"));
}
