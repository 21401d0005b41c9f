//! Zip fixtures

use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Build a zip archive in memory with the given `(name, contents)` entries.
///
/// Names are written verbatim, so fixtures can carry hostile paths such as
/// `../evil` or absolute names.
pub fn zip_with_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, contents) in entries {
        zip.start_file(*name, options).expect("start zip entry");
        zip.write_all(contents).expect("write zip entry");
    }

    zip.finish().expect("finish zip").into_inner()
}
