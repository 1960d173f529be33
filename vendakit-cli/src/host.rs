//! Filesystem-backed implementations of the core's host capability traits.
//! The CLI doubles as the reference host: sessions live in a JSON file,
//! photos come from paths given on the command line, and documents land in
//! the working directory.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use vendakit_core::{
    CapturedPhoto, DocumentSink, Error, PhotoLibrary, PhotoSource, Result, SessionStore,
};

/// Key-value session store over a JSON object in a single file.
pub(crate) struct FileSessionStore {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileSessionStore {
    /// Opens the store at `<config dir>/vendakit/session.json`.
    pub(crate) fn at_default_path() -> Result<Self> {
        let dir = dirs::config_dir().ok_or_else(|| Error::Storage {
            error: "no user config directory".to_string(),
        })?;
        Ok(Self::at(dir.join("vendakit").join("session.json")))
    }

    pub(crate) fn at(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|err| Error::Storage {
                error: format!("corrupt session file {}: {err}", self.path.display()),
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(Error::Storage {
                error: format!("reading {}: {err}", self.path.display()),
            }),
        }
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::Storage {
                error: format!("creating {}: {err}", parent.display()),
            })?;
        }
        let contents = serde_json::to_string_pretty(entries).map_err(|err| Error::Storage {
            error: err.to_string(),
        })?;
        fs::write(&self.path, contents).map_err(|err| Error::Storage {
            error: format!("writing {}: {err}", self.path.display()),
        })
    }
}

impl SessionStore for FileSessionStore {
    fn read(&self, key: String) -> Result<Option<String>> {
        let _guard = self.lock.lock().map_err(|_| poisoned())?;
        Ok(self.load()?.remove(&key))
    }

    fn write(&self, key: String, value: String) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| poisoned())?;
        let mut entries = self.load()?;
        entries.insert(key, value);
        self.persist(&entries)
    }

    fn delete(&self, key: String) -> Result<()> {
        let _guard = self.lock.lock().map_err(|_| poisoned())?;
        let mut entries = self.load()?;
        if entries.remove(&key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

fn poisoned() -> Error {
    Error::Storage {
        error: "session file lock poisoned".to_string(),
    }
}

/// Photo capture over a path supplied on the command line.
pub(crate) struct PathPhotoLibrary {
    path: PathBuf,
}

impl PathPhotoLibrary {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl PhotoLibrary for PathPhotoLibrary {
    fn acquire(&self, _source: PhotoSource) -> Result<Option<CapturedPhoto>> {
        let bytes = fs::read(&self.path).map_err(|err| Error::InvalidInput {
            attribute: "foto".to_string(),
            reason: format!("{}: {err}", self.path.display()),
        })?;
        let file_name = self.path.file_name().map_or_else(
            || "foto.jpg".to_string(),
            |name| name.to_string_lossy().to_string(),
        );
        Ok(Some(CapturedPhoto::from_file_name(file_name, bytes)))
    }
}

/// Document sink writing into a fixed directory.
pub(crate) struct DirDocumentSink {
    dir: PathBuf,
}

impl DirDocumentSink {
    pub(crate) fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl DocumentSink for DirDocumentSink {
    fn save(&self, file_name: String, bytes: Vec<u8>) -> Result<()> {
        let path = self.dir.join(&file_name);
        fs::write(&path, bytes).map_err(|err| Error::Storage {
            error: format!("writing {}: {err}", path.display()),
        })?;
        tracing::debug!(path = %path.display(), "document saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::at(dir.path().join("nested").join("session.json"));

        assert_eq!(store.read("k".to_string()).unwrap(), None);
        store.write("k".to_string(), "v1".to_string()).unwrap();
        store.write("j".to_string(), "v2".to_string()).unwrap();
        assert_eq!(store.read("k".to_string()).unwrap().as_deref(), Some("v1"));

        store.delete("k".to_string()).unwrap();
        assert_eq!(store.read("k".to_string()).unwrap(), None);
        assert_eq!(store.read("j".to_string()).unwrap().as_deref(), Some("v2"));
    }

    #[test]
    fn corrupt_session_file_reads_as_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileSessionStore::at(path);
        assert!(store.read("k".to_string()).is_err());
    }

    #[test]
    fn path_photo_library_reads_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ficha.png");
        std::fs::write(&path, [0x89, 0x50]).unwrap();

        let photo = PathPhotoLibrary::new(path)
            .acquire(PhotoSource::Gallery)
            .unwrap()
            .unwrap();
        assert_eq!(photo.file_name, "ficha.png");
        assert_eq!(photo.content_type, "image/png");
        assert_eq!(photo.bytes, [0x89, 0x50]);
    }

    #[test]
    fn missing_photo_path_is_invalid_input() {
        let library = PathPhotoLibrary::new(PathBuf::from("/nonexistent/foto.jpg"));
        let err = library.acquire(PhotoSource::Gallery).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { attribute, .. } if attribute == "foto"));
    }

    #[test]
    fn document_sink_writes_under_the_given_name() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirDocumentSink::new(dir.path().to_path_buf());
        sink.save("venda_1_99.pdf".to_string(), b"%PDF".to_vec())
            .unwrap();
        assert_eq!(
            std::fs::read(dir.path().join("venda_1_99.pdf")).unwrap(),
            b"%PDF"
        );
    }
}
