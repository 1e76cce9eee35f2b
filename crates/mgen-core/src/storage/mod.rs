//! Disk I/O and artifact file lifecycle.
//!
//! Artifacts are streamed into `<final>.part`, synced, then atomically renamed
//! to the final name so a crashed or failed transfer never leaves a file at the
//! deterministic artifact path.

mod writer;

pub use writer::StorageWriter;

/// Temporary file suffix used before atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `scene_01_copy_1.mp4.part`).
pub fn temp_path(final_path: &std::path::Path) -> std::path::PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    std::path::PathBuf::from(o)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn temp_path_appends_part() {
        let p = temp_path(Path::new("scene_01_copy_1.mp4"));
        assert_eq!(p.to_string_lossy(), "scene_01_copy_1.mp4.part");
        let p2 = temp_path(Path::new("/tmp/03_Videos/scene_02_copy_3.mp4"));
        assert_eq!(p2.to_string_lossy(), "/tmp/03_Videos/scene_02_copy_3.mp4.part");
    }

    #[test]
    fn create_write_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("out.mp4");
        let tp = temp_path(&final_path);

        let writer = StorageWriter::create(&tp).unwrap();
        writer.write_at(0, b"hello").unwrap();
        writer.write_at(5, b" world").unwrap();
        writer.sync().unwrap();
        writer.finalize(&final_path).unwrap();

        assert!(!tp.exists());
        assert_eq!(std::fs::read(&final_path).unwrap(), b"hello world");
    }

    #[test]
    fn create_truncates_stale_part_file() {
        let dir = tempfile::tempdir().unwrap();
        let tp = dir.path().join("stale.mp4.part");
        std::fs::write(&tp, b"leftover bytes from a crashed run").unwrap();
        let writer = StorageWriter::create(&tp).unwrap();
        writer.write_at(0, b"new").unwrap();
        writer.sync().unwrap();
        assert_eq!(std::fs::read(&tp).unwrap(), b"new");
    }

    #[test]
    fn discard_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let tp = dir.path().join("x.part");
        let writer = StorageWriter::create(&tp).unwrap();
        writer.write_at(0, b"abc").unwrap();
        writer.discard();
        assert!(!tp.exists());
    }
}
