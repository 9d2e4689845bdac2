//! `LocalFile` adapter: native (`tokio::fs`) and wasm32
//! (File System Access API) implementations (spec.md §4.2).

use async_trait::async_trait;
use tracing::debug;

use crate::adapters::{FileHandle, LocalFileAdapter};
use crate::error::RedstringError;
use crate::time::new_event_id;

#[cfg(not(target_arch = "wasm32"))]
pub use native::NativeLocalFileAdapter;
#[cfg(target_arch = "wasm32")]
pub use wasm::WasmLocalFileAdapter;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use super::*;
    use std::path::{Path, PathBuf};
    use tokio::fs;

    /// Stand-in for the host file picker: a single directory the embedder
    /// configures up front. `pick_for_create`/`pick_for_open` resolve a
    /// handle under it rather than surfacing a system dialog, since native
    /// embedders have no browser-shaped picker to call (spec.md §4.2).
    pub struct NativeLocalFileAdapter {
        base_dir: PathBuf,
    }

    impl NativeLocalFileAdapter {
        pub fn new(base_dir: impl Into<PathBuf>) -> Self {
            Self { base_dir: base_dir.into() }
        }

        fn resolve(&self, handle: &FileHandle) -> PathBuf {
            self.base_dir.join(&handle.path)
        }
    }

    #[async_trait]
    impl LocalFileAdapter for NativeLocalFileAdapter {
        async fn pick_for_create(&self, suggested_name: &str) -> Result<FileHandle, RedstringError> {
            Ok(FileHandle { id: new_event_id(), path: suggested_name.to_string() })
        }

        async fn pick_for_open(&self) -> Result<FileHandle, RedstringError> {
            Err(RedstringError::SlotUnavailable {
                slot: crate::error::Slot::Local,
                reason: "native embedder must supply a path; there is no open dialog".to_string(),
            })
        }

        async fn read(&self, handle: &FileHandle) -> Result<String, RedstringError> {
            let path = self.resolve(handle);
            let text = fs::read_to_string(&path).await.inspect_err(|e| {
                debug!(path = %path.display(), error = %e, "local file read failed");
            })?;
            if text.trim().is_empty() {
                return Err(RedstringError::Parse(format!("{} is empty", path.display())));
            }
            Ok(text)
        }

        async fn write(&self, handle: &FileHandle, text: &str) -> Result<(), RedstringError> {
            let path = self.resolve(handle);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&path, text).await.inspect_err(|e| {
                debug!(path = %path.display(), error = %e, "local file write failed");
            })?;
            Ok(())
        }

        async fn query_permission(&self, handle: &FileHandle) -> Result<bool, RedstringError> {
            Ok(self.resolve(handle).exists())
        }

        async fn request_permission(&self, handle: &FileHandle) -> Result<bool, RedstringError> {
            self.query_permission(handle).await
        }
    }

    fn _assert_path_type(_: &Path) {}

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn write_then_read_round_trips() {
            let dir = tempfile::tempdir().unwrap();
            let adapter = NativeLocalFileAdapter::new(dir.path());
            let handle = adapter.pick_for_create("universe.redstring").await.unwrap();
            adapter.write(&handle, "{\"a\":1}").await.unwrap();
            let text = adapter.read(&handle).await.unwrap();
            assert_eq!(text, "{\"a\":1}");
        }

        #[tokio::test]
        async fn empty_file_is_reported_as_parse_error() {
            let dir = tempfile::tempdir().unwrap();
            let adapter = NativeLocalFileAdapter::new(dir.path());
            let handle = adapter.pick_for_create("empty.redstring").await.unwrap();
            adapter.write(&handle, "   ").await.unwrap();
            let err = adapter.read(&handle).await.unwrap_err();
            assert!(matches!(err, RedstringError::Parse(_)));
        }

        #[tokio::test]
        async fn missing_file_is_io_error() {
            let dir = tempfile::tempdir().unwrap();
            let adapter = NativeLocalFileAdapter::new(dir.path());
            let handle = FileHandle { id: "x".into(), path: "missing.redstring".into() };
            let err = adapter.read(&handle).await.unwrap_err();
            assert!(matches!(err, RedstringError::Io(_)));
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm {
    use super::*;
    use js_sys::Uint8Array;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{FileSystemFileHandle, FileSystemWritableFileStream};

    /// Holds the opaque `FileSystemFileHandle`s a host picker returned,
    /// keyed by the [`FileHandle`] id this crate hands back to callers.
    /// Handles are not serializable (spec.md §9): only this in-memory map
    /// and the caller-persisted `path` survive.
    #[derive(Default)]
    pub struct WasmLocalFileAdapter {
        handles: RefCell<HashMap<String, FileSystemFileHandle>>,
    }

    // wasm32-unknown-unknown has no OS threads, so nothing can actually
    // share this `RefCell` across threads; wasm-bindgen's JS types are
    // simply not annotated `Send`/`Sync` upstream. Asserting both here is
    // the standard way to satisfy `Arc<dyn LocalFileAdapter>` on this
    // target (the same shape the Manager uses natively).
    unsafe impl Send for WasmLocalFileAdapter {}
    unsafe impl Sync for WasmLocalFileAdapter {}

    impl WasmLocalFileAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Registers a handle obtained by the host from
        /// `window.showSaveFilePicker`/`showOpenFilePicker`, returning the
        /// opaque [`FileHandle`] the rest of the crate uses.
        pub fn register(&self, path: &str, js_handle: FileSystemFileHandle) -> FileHandle {
            let id = new_event_id();
            self.handles.borrow_mut().insert(id.clone(), js_handle);
            FileHandle { id, path: path.to_string() }
        }
    }

    #[async_trait(?Send)]
    impl LocalFileAdapter for WasmLocalFileAdapter {
        async fn pick_for_create(&self, _suggested_name: &str) -> Result<FileHandle, RedstringError> {
            Err(RedstringError::Adapter(
                "pick_for_create must be driven by a host file-picker call via register()".to_string(),
            ))
        }

        async fn pick_for_open(&self) -> Result<FileHandle, RedstringError> {
            Err(RedstringError::Adapter(
                "pick_for_open must be driven by a host file-picker call via register()".to_string(),
            ))
        }

        async fn read(&self, handle: &FileHandle) -> Result<String, RedstringError> {
            let js_handle = self
                .handles
                .borrow()
                .get(&handle.id)
                .cloned()
                .ok_or_else(|| RedstringError::SlotUnavailable {
                    slot: crate::error::Slot::Local,
                    reason: "no file handle registered".to_string(),
                })?;

            let file_promise = js_handle.get_file();
            let file = JsFuture::from(file_promise)
                .await
                .map_err(|e| RedstringError::Adapter(format!("{:?}", e)))?;
            let file: web_sys::File = file.unchecked_into();
            let text_promise = file.text();
            let text = JsFuture::from(text_promise)
                .await
                .map_err(|e| RedstringError::Adapter(format!("{:?}", e)))?;
            let text = text.as_string().unwrap_or_default();
            if text.trim().is_empty() {
                return Err(RedstringError::Parse(format!("{} is empty", handle.path)));
            }
            Ok(text)
        }

        async fn write(&self, handle: &FileHandle, text: &str) -> Result<(), RedstringError> {
            let js_handle = self
                .handles
                .borrow()
                .get(&handle.id)
                .cloned()
                .ok_or_else(|| RedstringError::SlotUnavailable {
                    slot: crate::error::Slot::Local,
                    reason: "no file handle registered".to_string(),
                })?;

            let writable_promise = js_handle.create_writable();
            let writable = JsFuture::from(writable_promise)
                .await
                .map_err(|e| RedstringError::Adapter(format!("{:?}", e)))?;
            let writable: FileSystemWritableFileStream = writable.unchecked_into();

            let bytes = Uint8Array::from(text.as_bytes());
            JsFuture::from(writable.write_with_buffer_source(&bytes).map_err(|e| {
                RedstringError::Adapter(format!("{:?}", e))
            })?)
            .await
            .map_err(|e| RedstringError::Adapter(format!("{:?}", e)))?;
            JsFuture::from(writable.close())
                .await
                .map_err(|e| RedstringError::Adapter(format!("{:?}", e)))?;
            Ok(())
        }

        async fn query_permission(&self, handle: &FileHandle) -> Result<bool, RedstringError> {
            Ok(self.handles.borrow().contains_key(&handle.id))
        }

        async fn request_permission(&self, handle: &FileHandle) -> Result<bool, RedstringError> {
            self.query_permission(handle).await
        }
    }
}
