//! In-memory zip fixtures.

use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Files every audit-pack export must contain.
pub const AUDIT_PACK_FILES: [&str; 7] = [
    "evidence/entries.json",
    "evidence/corrections.json",
    "evidence/approvals.json",
    "evidence/audit-timeline.json",
    "meta/scope.json",
    "views/entries.csv",
    "views/approvals.csv",
];

/// Zip the given `(path, content)` pairs in order.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (path, content) in entries {
        if path.ends_with('/') {
            writer.add_directory(*path, options).expect("add directory");
        } else {
            writer.start_file(*path, options).expect("start file");
            writer.write_all(content).expect("write file");
        }
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Three-file payroll export, deliberately listed out of path order.
pub fn sample_export() -> Vec<u8> {
    zip_bytes(&[
        ("payroll/2024-03.csv", b"employee,gross\n1,4200.00\n"),
        ("README.md", b"March payroll export\n"),
        ("employees.json", br#"[{"id":1,"name":"A. Example"}]"#),
    ])
}

/// Audit-pack export containing every required file.
pub fn audit_pack_export() -> Vec<u8> {
    let entries: Vec<(&str, &[u8])> = AUDIT_PACK_FILES
        .iter()
        .map(|path| (*path, path.as_bytes()))
        .collect();
    zip_bytes(&entries)
}

/// Audit-pack export missing the given required files.
pub fn audit_pack_export_without(missing: &[&str]) -> Vec<u8> {
    let entries: Vec<(&str, &[u8])> = AUDIT_PACK_FILES
        .iter()
        .filter(|path| !missing.contains(path))
        .map(|path| (*path, path.as_bytes()))
        .collect();
    zip_bytes(&entries)
}

/// Content of one entry, `None` when absent.
pub fn read_entry(archive: &[u8], name: &str) -> Option<Vec<u8>> {
    let mut zip = ZipArchive::new(Cursor::new(archive)).ok()?;
    let mut file = zip.by_name(name).ok()?;
    let mut out = Vec::new();
    file.read_to_end(&mut out).ok()?;
    Some(out)
}

/// Entry names in archive order.
pub fn entry_names(archive: &[u8]) -> Vec<String> {
    let Ok(mut zip) = ZipArchive::new(Cursor::new(archive)) else {
        return Vec::new();
    };
    (0..zip.len())
        .filter_map(|i| zip.by_index(i).ok().map(|f| f.name().to_string()))
        .collect()
}

/// Rebuild `archive` with one byte of `name` flipped.
pub fn tamper_entry(archive: &[u8], name: &str) -> Vec<u8> {
    let names = entry_names(archive);
    let contents: Vec<(String, Vec<u8>)> = names
        .into_iter()
        .map(|n| {
            let mut data = read_entry(archive, &n).unwrap_or_default();
            if n == name {
                if let Some(first) = data.first_mut() {
                    *first ^= 0x01;
                }
            }
            (n, data)
        })
        .collect();
    let borrowed: Vec<(&str, &[u8])> = contents
        .iter()
        .map(|(n, d)| (n.as_str(), d.as_slice()))
        .collect();
    zip_bytes(&borrowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_entry() {
        let zip = sample_export();
        assert_eq!(read_entry(&zip, "README.md").unwrap(), b"March payroll export\n");
        assert_eq!(entry_names(&zip).len(), 3);
    }

    #[test]
    fn test_tamper_changes_only_target() {
        let zip = sample_export();
        let tampered = tamper_entry(&zip, "README.md");
        assert_ne!(read_entry(&tampered, "README.md"), read_entry(&zip, "README.md"));
        assert_eq!(
            read_entry(&tampered, "employees.json"),
            read_entry(&zip, "employees.json")
        );
    }

    #[test]
    fn test_audit_pack_without() {
        let zip = audit_pack_export_without(&["meta/scope.json"]);
        assert_eq!(entry_names(&zip).len(), 6);
        assert!(read_entry(&zip, "meta/scope.json").is_none());
    }
}
