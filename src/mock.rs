//! In-memory device used by the unit tests
//!
//! Models the device namespace and its listing rules, records every request,
//! and tracks how many requests overlap.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::json;

use crate::{
    provider::{DeviceProvider, Params, ProviderFuture},
    DeviceError, DeviceResponse,
};

pub const CAPACITY: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub endpoint: &'static str,
    pub params: Params,
}

impl RecordedRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Default)]
struct MockState {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, String>,
    failing: HashSet<(&'static str, String)>,
    requests: Vec<RecordedRequest>,
    in_flight: usize,
    max_in_flight: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<MockState>>,
    latency: Duration,
}

fn parent(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((p, _)) => p,
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.state().add_dir(path);
        self
    }

    pub fn with_file(self, path: &str, contents: &str) -> Self {
        self.state().write(path, contents);
        self
    }

    /// Makes every request to `endpoint` for `path` fail with a 500
    pub fn failing(self, endpoint: &'static str, path: &str) -> Self {
        self.state().failing.insert((endpoint, path.to_string()));
        self
    }

    pub fn remove_file(&self, path: &str) {
        self.state().files.remove(path);
    }

    pub fn files(&self) -> BTreeMap<String, String> {
        self.state().files.clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    pub fn requests_to(&self, endpoint: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.endpoint == endpoint)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state().max_in_flight
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    fn call(
        &self,
        method: &'static str,
        endpoint: &'static str,
        params: Params,
    ) -> ProviderFuture<'_> {
        Box::pin(async move {
            {
                let mut state = self.state();
                state.in_flight += 1;
                state.max_in_flight = state.max_in_flight.max(state.in_flight);
                state.requests.push(RecordedRequest {
                    method,
                    endpoint,
                    params: params.clone(),
                });
            }
            if self.latency.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.latency).await;
            }
            let mut state = self.state();
            let res = state.handle(endpoint, &params);
            state.in_flight -= 1;
            res
        })
    }
}

impl MockState {
    fn add_dir(&mut self, path: &str) {
        let mut path = path.trim_end_matches('/');
        while !path.is_empty() {
            self.dirs.insert(path.to_string());
            path = parent(path).trim_end_matches('/');
        }
    }

    fn write(&mut self, path: &str, contents: &str) {
        let dir = parent(path).to_string();
        self.add_dir(&dir);
        self.files.insert(path.to_string(), contents.to_string());
    }

    fn is_dir(&self, path: &str) -> bool {
        path == "/" || self.dirs.contains(path)
    }

    /// Immediate children of `dir` in name order, flagged `true` for directories
    fn children(&self, dir: &str) -> Vec<(String, bool)> {
        let mut out: Vec<(String, bool)> = self
            .dirs
            .iter()
            .filter(|d| parent(d) == dir)
            .map(|d| (d.clone(), true))
            .chain(
                self.files
                    .keys()
                    .filter(|f| parent(f) == dir)
                    .map(|f| (f.clone(), false)),
            )
            .collect();
        out.sort();
        out
    }

    fn list_files(&self, dir: &str, levels: u8) -> Vec<String> {
        let mut out = Vec::new();
        for (path, is_dir) in self.children(dir) {
            if !is_dir {
                out.push(path);
            } else if levels > 0 {
                out.extend(self.list_files(&path, levels - 1));
            }
        }
        out
    }

    fn list_dirs(&self, dir: &str, levels: u8) -> Vec<String> {
        let mut out = Vec::new();
        for (path, is_dir) in self.children(dir) {
            if is_dir {
                out.push(path.clone());
                if levels > 0 {
                    out.extend(self.list_dirs(&path, levels - 1));
                }
            }
        }
        out
    }

    fn handle(
        &mut self,
        endpoint: &'static str,
        params: &Params,
    ) -> Result<DeviceResponse, DeviceError> {
        let param = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        };
        let bad_request = |msg: &str| -> Result<DeviceResponse, DeviceError> {
            Err(DeviceError::HttpStatus(400, msg.to_string()))
        };

        let path = param("path").unwrap_or_default();
        if self.failing.contains(&(endpoint, path.clone())) {
            return Err(DeviceError::HttpStatus(500, "injected failure".into()));
        }

        match endpoint {
            "/list" => {
                if !self.is_dir(&path) && !self.files.contains_key(&path) {
                    return bad_request("Folder doesn't exist");
                }
                let depth: u8 = param("depth").and_then(|d| d.parse().ok()).unwrap_or(0);
                let list = if !self.is_dir(&path) {
                    Vec::new()
                } else if param("type").as_deref() == Some("1") {
                    self.list_dirs(&path, depth)
                } else {
                    self.list_files(&path, depth)
                };
                // an empty document serializes as null on the device
                let body = if list.is_empty() {
                    "null".to_string()
                } else {
                    json!({ "list": list }).to_string()
                };
                Ok(DeviceResponse::new(body))
            }
            "/download" => match self.files.get(&path) {
                Some(contents) => Ok(DeviceResponse::new(contents.clone())),
                None => bad_request("File doesn't exist"),
            },
            "/restorefile" => match param("contents") {
                Some(contents) if !path.is_empty() => {
                    self.write(&path, &contents);
                    Ok(DeviceResponse::new("File restored"))
                }
                _ => bad_request("Bad request data"),
            },
            "/delete" => match self.files.remove(&path) {
                Some(_) => Ok(DeviceResponse::new(json!({ "file": path }).to_string())),
                None => bad_request("File doesn't exist"),
            },
            "/freeSpace" => {
                let used: u64 = self.files.values().map(|c| c.len() as u64).sum();
                Ok(DeviceResponse::new(format!(
                    "{{ \"space\": {} }}",
                    CAPACITY - used
                )))
            }
            _ => Err(DeviceError::HttpStatus(404, "Not found".into())),
        }
    }
}

impl DeviceProvider for MockDevice {
    fn get(&self, endpoint: &'static str, params: Params) -> ProviderFuture<'_> {
        self.call("GET", endpoint, params)
    }

    fn post(&self, endpoint: &'static str, params: Params) -> ProviderFuture<'_> {
        self.call("POST", endpoint, params)
    }

    fn label(&self) -> &str {
        "mock"
    }
}
