//! `BrowserKV` adapter: native (JSON-file-backed, for embedding + tests) and
//! wasm32 (IndexedDB) implementations (spec.md §4.2).

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapters::{BrowserKvAdapter, BrowserRecord};
use crate::error::RedstringError;
use crate::time::now_iso8601;

/// Records kept when quota pressure forces eviction (spec.md §4.2, §7).
pub const RETAIN_ON_EVICT: usize = 3;

#[cfg(not(target_arch = "wasm32"))]
pub use native::NativeBrowserKvAdapter;
#[cfg(target_arch = "wasm32")]
pub use wasm::WasmBrowserKvAdapter;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use super::*;
    use std::path::PathBuf;
    use tokio::fs;

    /// Stands in for the `RedstringUniverses`/`universes` IndexedDB object
    /// store: one JSON file per key under `base_dir`, named by a simple
    /// filesystem-safe transform of the key. A configurable `quota_bytes`
    /// models the browser's storage-estimate check so eviction can be
    /// exercised without a real browser.
    pub struct NativeBrowserKvAdapter {
        base_dir: PathBuf,
        quota_bytes: u64,
    }

    impl NativeBrowserKvAdapter {
        pub fn new(base_dir: impl Into<PathBuf>, quota_bytes: u64) -> Self {
            Self { base_dir: base_dir.into(), quota_bytes }
        }

        fn path_for(&self, key: &str) -> PathBuf {
            let safe: String = key.chars().map(|c| if c.is_alphanumeric() || c == '_' || c == '-' { c } else { '_' }).collect();
            self.base_dir.join(format!("{safe}.json"))
        }

        async fn all_records(&self) -> Result<Vec<(PathBuf, BrowserRecord)>, RedstringError> {
            let mut out = Vec::new();
            let mut entries = match fs::read_dir(&self.base_dir).await {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
                Err(e) => return Err(RedstringError::from(e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let text = fs::read_to_string(&path).await?;
                if let Ok(record) = serde_json::from_str::<BrowserRecord>(&text) {
                    out.push((path, record));
                }
            }
            Ok(out)
        }

        async fn total_bytes(&self) -> Result<u64, RedstringError> {
            let mut total = 0u64;
            for (path, _) in self.all_records().await? {
                if let Ok(meta) = fs::metadata(&path).await {
                    total += meta.len();
                }
            }
            Ok(total)
        }

        /// Delete all but the `RETAIN_ON_EVICT` most-recent records by
        /// `saved_at`, across the whole store (spec.md §4.2).
        async fn evict_to_recent(&self) -> Result<(), RedstringError> {
            let mut records = self.all_records().await?;
            records.sort_by(|a, b| b.1.saved_at.cmp(&a.1.saved_at));
            for (path, _) in records.into_iter().skip(RETAIN_ON_EVICT) {
                let _ = fs::remove_file(&path).await;
            }
            Ok(())
        }
    }

    #[async_trait]
    impl BrowserKvAdapter for NativeBrowserKvAdapter {
        async fn read(&self, key: &str) -> Result<Option<BrowserRecord>, RedstringError> {
            let path = self.path_for(key);
            match fs::read_to_string(&path).await {
                Ok(text) => Ok(serde_json::from_str(&text)?),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(RedstringError::from(e)),
            }
        }

        async fn write(&self, key: &str, data: &Value) -> Result<(), RedstringError> {
            fs::create_dir_all(&self.base_dir).await?;
            let record = BrowserRecord { id: key.to_string(), data: data.clone(), saved_at: now_iso8601() };
            let body = serde_json::to_string(&record)?;

            let projected = self.total_bytes().await? + body.len() as u64;
            if projected > self.quota_bytes {
                warn!(key, quota_bytes = self.quota_bytes, "browser kv quota pressure, evicting");
                self.evict_to_recent().await?;
                let projected_after_evict = self.total_bytes().await? + body.len() as u64;
                if projected_after_evict > self.quota_bytes {
                    return Err(RedstringError::Quota(format!(
                        "writing {key} would exceed {} byte quota even after eviction",
                        self.quota_bytes
                    )));
                }
            }

            fs::write(self.path_for(key), body).await?;
            debug!(key, "browser kv write committed");
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), RedstringError> {
            match fs::remove_file(self.path_for(key)).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(RedstringError::from(e)),
            }
        }
    }

}

#[cfg(target_arch = "wasm32")]
mod wasm {
    use super::*;
    use wasm_bindgen::{JsCast, JsValue};
    use web_sys::{IdbDatabase, IdbTransactionMode};

    /// Thin wrapper over the `RedstringUniverses`/`universes` IndexedDB
    /// object store. Quota estimation goes through `StorageManager.estimate()`
    /// and eviction deletes all but the 3 most-recent records by `savedAt`
    /// (spec.md §4.2).
    pub struct WasmBrowserKvAdapter {
        db: IdbDatabase,
    }

    unsafe impl Send for WasmBrowserKvAdapter {}
    unsafe impl Sync for WasmBrowserKvAdapter {}

    const STORE_NAME: &str = "universes";

    impl WasmBrowserKvAdapter {
        pub fn new(db: IdbDatabase) -> Self {
            Self { db }
        }

        fn store(&self, mode: IdbTransactionMode) -> Result<web_sys::IdbObjectStore, RedstringError> {
            let tx = self
                .db
                .transaction_with_str_and_mode(STORE_NAME, mode)
                .map_err(|e| RedstringError::Adapter(format!("{:?}", e)))?;
            tx.object_store(STORE_NAME).map_err(|e| RedstringError::Adapter(format!("{:?}", e)))
        }
    }

    #[async_trait(?Send)]
    impl BrowserKvAdapter for WasmBrowserKvAdapter {
        async fn read(&self, key: &str) -> Result<Option<BrowserRecord>, RedstringError> {
            let store = self.store(IdbTransactionMode::Readonly)?;
            let request = store.get(&JsValue::from_str(key)).map_err(|e| RedstringError::Adapter(format!("{:?}", e)))?;
            let result = request_to_future(&request)
                .await
                .map_err(|e| RedstringError::Adapter(format!("{:?}", e)))?;
            if result.is_undefined() || result.is_null() {
                return Ok(None);
            }
            let record: BrowserRecord = serde_wasm_bindgen::from_value(result)
                .map_err(|e| RedstringError::Adapter(e.to_string()))?;
            Ok(Some(record))
        }

        async fn write(&self, key: &str, data: &Value) -> Result<(), RedstringError> {
            let record = BrowserRecord { id: key.to_string(), data: data.clone(), saved_at: now_iso8601() };
            let js_record = serde_wasm_bindgen::to_value(&record).map_err(|e| RedstringError::Adapter(e.to_string()))?;
            let store = self.store(IdbTransactionMode::Readwrite)?;
            let request = store
                .put_with_key(&js_record, &JsValue::from_str(key))
                .map_err(|e| RedstringError::Adapter(format!("{:?}", e)))?;
            request_to_future(&request).await.map_err(|e| RedstringError::Adapter(format!("{:?}", e)))?;
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), RedstringError> {
            let store = self.store(IdbTransactionMode::Readwrite)?;
            let request = store
                .delete(&JsValue::from_str(key))
                .map_err(|e| RedstringError::Adapter(format!("{:?}", e)))?;
            request_to_future(&request).await.map_err(|e| RedstringError::Adapter(format!("{:?}", e)))?;
            Ok(())
        }
    }

    /// Bridges an `IDBRequest`'s `onsuccess`/`onerror` events into a plain
    /// future, the way the host's IndexedDB wrapper normally does (there is
    /// no built-in `IdbRequest -> Promise` conversion in `web-sys`).
    async fn request_to_future(request: &web_sys::IdbRequest) -> Result<JsValue, JsValue> {
        let (tx, rx) = futures::channel::oneshot::channel::<Result<JsValue, JsValue>>();
        let tx = std::rc::Rc::new(std::cell::RefCell::new(Some(tx)));

        let tx_ok = tx.clone();
        let request_ok = request.clone();
        let onsuccess = wasm_bindgen::closure::Closure::once(move |_: web_sys::Event| {
            if let Some(tx) = tx_ok.borrow_mut().take() {
                let _ = tx.send(Ok(request_ok.result().unwrap_or(JsValue::UNDEFINED)));
            }
        });
        let tx_err = tx.clone();
        let onerror = wasm_bindgen::closure::Closure::once(move |_: web_sys::Event| {
            if let Some(tx) = tx_err.borrow_mut().take() {
                let _ = tx.send(Err(JsValue::from_str("IDBRequest error")));
            }
        });

        request.set_onsuccess(Some(onsuccess.as_ref().unchecked_ref()));
        request.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onsuccess.forget();
        onerror.forget();

        rx.await.unwrap_or(Err(JsValue::from_str("IDBRequest dropped")))
    }
}
