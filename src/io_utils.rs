//! I/O helpers shared by the readers and the export command.
//!
//! - **Delimiter resolution**: `.tsv` inputs use tab, everything else comma.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Reader/writer construction**: strict-width CSV readers, always-quoted
//!   CSV writers, `-` as stdout.
//! - **Sniffing**: reading the first bytes of a file for format detection.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';
pub const SNIFF_BYTES: usize = 4096;

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path) -> u8 {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> std::io::Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(open_csv_reader(BufReader::new(file), delimiter))
}

pub fn open_csv_writer(path: Option<&Path>, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let base: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    Ok(builder.from_writer(base))
}

/// Reads up to [`SNIFF_BYTES`] from the start of a file.
pub fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(SNIFF_BYTES);
    File::open(path)?
        .take(SNIFF_BYTES as u64)
        .read_to_end(&mut head)?;
    Ok(head)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    let mut decoded = decode_record(&headers, encoding)?;
    // Excel exports prepend a byte-order mark to the first header.
    if let Some(first) = decoded.first_mut()
        && let Some(stripped) = first.strip_prefix('\u{feff}')
    {
        *first = stripped.to_string();
    }
    Ok(decoded)
}
