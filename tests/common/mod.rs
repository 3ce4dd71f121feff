#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// A short yellow-cab extract in the 2015+ column convention.
pub const YELLOW_CSV: &str = "\
VendorID,tpep_pickup_datetime,tpep_dropoff_datetime,passenger_count,trip_distance,payment_type,fare_amount,tip_amount,total_amount
1,2023-12-01 08:10:00,2023-12-01 08:25:00,1,2.5,1,12.5,2.0,16.3
2,2023-12-01 18:40:00,2023-12-01 19:05:00,2,5.1,2,21.0,0.0,24.5
2,2023-12-02 18:05:00,2023-12-02 18:20:00,1,1.2,1,,1.5,9.8
";

/// Scratch directory that removes its files on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }
}
