use log::info;
use rouille::{Request, Response};
use serde::Serialize;
use serde_json::{Value, json};
use std::{
    io::Read,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    config::{HttpConfig, LoadConfig, StorageConfig, TransformConfig},
    http::error::ApiError,
    pipeline::{
        load::run_load,
        query::{QueryResponse, run_query},
        request::{ObjectEvent, unwrap_body},
        transform::run_transform,
    },
    storage::{
        error::StorageError,
        objects::ObjectStore,
        tracks::{LoadEntry, Warehouse},
    },
};

/// Everything a request handler needs besides the request itself.
pub struct Stages {
    pub store: ObjectStore,
    pub storage: StorageConfig,
    pub transform: TransformConfig,
    pub load: LoadConfig,
}

pub struct HttpServer {
    warehouse: Arc<Mutex<Warehouse>>,
    stages: Stages,
    pub config: HttpConfig,
}

#[derive(Serialize)]
struct StatusResponse {
    tracks: i64,
    last_load: Option<LoadEntry>,
}

impl HttpServer {
    pub fn new(warehouse: Warehouse, stages: Stages, config: HttpConfig) -> Self {
        Self {
            warehouse: Arc::new(Mutex::new(warehouse)),
            stages,
            config,
        }
    }

    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let response = rouille::router!(request,
            (POST) (/transform) => {
                self.handle_transform(request).unwrap_or_else(ApiError::into_response)
            },
            (POST) (/load) => {
                self.handle_load(request).unwrap_or_else(ApiError::into_response)
            },
            (POST) (/query) => {
                self.handle_query(request).unwrap_or_else(ApiError::into_response)
            },
            (GET) (/objects/{bucket: String}/{key: String}) => {
                self.handle_get(&bucket, &key).unwrap_or_else(ApiError::into_response)
            },
            (GET) (/objects/{bucket: String}) => {
                self.handle_list(&bucket, request).unwrap_or_else(ApiError::into_response)
            },
            (GET) (/status) => {
                self.handle_status().unwrap_or_else(ApiError::into_response)
            },
            _ => Response::empty_404()
        );

        info!("Response: {} {}", request.method(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.url());
    }

    fn lock_warehouse(&self) -> Result<MutexGuard<'_, Warehouse>, ApiError> {
        self.warehouse.lock().map_err(|e| {
            ApiError::from(StorageError::Internal(anyhow::anyhow!(
                "Could not access warehouse under lock: {e}"
            )))
        })
    }

    /// Reads the request body as json. An empty body reads as `{}`.
    fn read_json(request: &Request) -> Result<Value, ApiError> {
        let mut body = String::new();
        if let Some(mut data) = request.data() {
            data.read_to_string(&mut body)
                .map_err(|e| ApiError::BadRequest(format!("unreadable request body: {e}")))?;
        }
        if body.trim().is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(format!("malformed json: {e}")))
    }

    fn read_event(request: &Request) -> Result<ObjectEvent, ApiError> {
        serde_json::from_value(Self::read_json(request)?)
            .map_err(|e| ApiError::BadRequest(format!("malformed event: {e}")))
    }

    fn handle_transform(&self, request: &Request) -> Result<Response, ApiError> {
        let event = Self::read_event(request)?;
        let report = run_transform(
            &self.stages.store,
            &self.stages.storage,
            &self.stages.transform,
            event,
        )?;
        Ok(Response::json(&report))
    }

    fn handle_load(&self, request: &Request) -> Result<Response, ApiError> {
        let event = Self::read_event(request)?;
        let mut warehouse = self.lock_warehouse()?;
        let report = run_load(
            &self.stages.store,
            &self.stages.storage,
            &self.stages.load,
            &mut warehouse,
            event,
        )?;
        Ok(Response::json(&report))
    }

    fn handle_query(&self, request: &Request) -> Result<Response, ApiError> {
        let spec = unwrap_body(Self::read_json(request)?);
        let warehouse = self.lock_warehouse()?;

        match run_query(&warehouse, &spec) {
            Ok(response) => Ok(Response::json(&response)),
            Err(StorageError::UnknownAction(_)) => {
                Ok(Response::json(&QueryResponse::unknown_action(&spec)).with_status_code(400))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn handle_list(&self, bucket: &str, request: &Request) -> Result<Response, ApiError> {
        let prefix = request.get_param("prefix").unwrap_or_default();
        let objects = self.stages.store.list(bucket, &prefix)?;
        Ok(Response::json(&objects))
    }

    /// Serves one object. Keys containing `/` must be percent-encoded.
    fn handle_get(&self, bucket: &str, key: &str) -> Result<Response, ApiError> {
        let meta = self.stages.store.head(bucket, key)?;
        let bytes = self.stages.store.get(bucket, key)?;
        let response = Response::from_data(meta.content_type, bytes);
        Ok(match meta.digest {
            Some(digest) => response.with_unique_header("ETag", format!("\"{digest}\"")),
            None => response,
        })
    }

    fn handle_status(&self) -> Result<Response, ApiError> {
        let warehouse = self.lock_warehouse()?;
        Ok(Response::json(&StatusResponse {
            tracks: warehouse.count_tracks()?,
            last_load: warehouse.last_load()?,
        }))
    }
}

#[cfg(test)]
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: rouille::Response,
) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(
        response.data.into_reader_and_size().0,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tracks::tests::setup_warehouse;

    use rouille::Request;
    use tempfile::{TempDir, tempdir};

    fn create_server(dir: &TempDir) -> anyhow::Result<HttpServer> {
        let stages = Stages {
            store: ObjectStore::new(dir.path()),
            storage: StorageConfig {
                root: dir.path().to_path_buf(),
                raw_bucket: Some("raw".into()),
                transformed_bucket: Some("canonical".into()),
            },
            transform: TransformConfig::default(),
            load: LoadConfig::default(),
        };
        Ok(HttpServer::new(
            setup_warehouse()?,
            stages,
            HttpConfig {
                bind_addr: "0.0.0.0".to_string(),
                port: 8080,
            },
        ))
    }

    fn post(url: &str, body: Value) -> Request {
        Request::fake_http("POST", url, vec![], body.to_string().into_bytes())
    }

    // --------------------------------------------------
    // pipeline stages
    // --------------------------------------------------

    #[test]
    fn test_http_transform_load_query() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let server = create_server(&dir)?;
        server.stages.store.put(
            "raw",
            "top.csv",
            b"song,Artist(s),Popularity,Explicit\nA,X,95,yes\nB,Y,20,no\n",
        )?;

        let response = server.handle_request(&post("/transform", json!({"key": "top.csv"})));
        assert_eq!(response.status_code, 200);
        let report: Value = parse_json_response(response)?;
        assert_eq!(report["rows"], 2);
        assert_eq!(report["output_key"], "top_transformed.csv");

        let response =
            server.handle_request(&post("/load", json!({"key": "top_transformed.csv"})));
        assert_eq!(response.status_code, 200);
        let report: Value = parse_json_response(response)?;
        assert_eq!(report["inserted"], 2);

        let response = server.handle_request(&post(
            "/query",
            json!({"body": "{\"action\": \"explicit_vs_clean_stats\"}"}),
        ));
        assert_eq!(response.status_code, 200);
        let body: Value = parse_json_response(response)?;
        assert_eq!(body["version"], 1);
        assert_eq!(body["action"], "explicit_vs_clean_stats");
        assert_eq!(body["query_result"].as_array().map(Vec::len), Some(2));

        Ok(())
    }

    #[test]
    fn test_http_transform_missing_object() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let server = create_server(&dir)?;

        let response = server.handle_request(&post("/transform", json!({"key": "none.csv"})));

        assert_eq!(response.status_code, 404);
        Ok(())
    }

    #[test]
    fn test_http_load_without_key() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let server = create_server(&dir)?;

        let response = server.handle_request(&post("/load", json!({})));

        assert_eq!(response.status_code, 400);
        Ok(())
    }

    // --------------------------------------------------
    // query errors
    // --------------------------------------------------

    #[test]
    fn test_http_unknown_action() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let server = create_server(&dir)?;

        let response = server.handle_request(&post("/query", json!({"action": "nope"})));

        assert_eq!(response.status_code, 400);
        let body: Value = parse_json_response(response)?;
        assert_eq!(body["query_result"]["error"], "Unknown or missing action: nope");
        assert_eq!(body["query_result"]["received_spec"]["action"], "nope");
        Ok(())
    }

    #[test]
    fn test_http_malformed_json() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let server = create_server(&dir)?;

        let request = Request::fake_http("POST", "/query", vec![], b"{not json".to_vec());
        let response = server.handle_request(&request);

        assert_eq!(response.status_code, 400);
        Ok(())
    }

    // --------------------------------------------------
    // inspection
    // --------------------------------------------------

    #[test]
    fn test_http_list_objects() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let server = create_server(&dir)?;
        server.stages.store.put("raw", "a/1.csv", b"x")?;
        server.stages.store.put("raw", "b/2.csv", b"y")?;

        let request = Request::fake_http("GET", "/objects/raw?prefix=a/", vec![], vec![]);
        let response = server.handle_request(&request);

        assert_eq!(response.status_code, 200);
        let objects: Vec<Value> = parse_json_response(response)?;
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0]["key"], "a/1.csv");
        Ok(())
    }

    #[test]
    fn test_http_get_object() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let server = create_server(&dir)?;
        server.stages.store.put("canonical", "top_transformed.csv", b"Track Name\nA\n")?;

        let request =
            Request::fake_http("GET", "/objects/canonical/top_transformed.csv", vec![], vec![]);
        let response = server.handle_request(&request);

        assert_eq!(response.status_code, 200);
        let mut body = Vec::new();
        response.data.into_reader_and_size().0.read_to_end(&mut body)?;
        assert_eq!(body, b"Track Name\nA\n");

        let request = Request::fake_http("GET", "/objects/canonical/missing.csv", vec![], vec![]);
        assert_eq!(server.handle_request(&request).status_code, 404);
        Ok(())
    }

    #[test]
    fn test_http_status_empty() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let server = create_server(&dir)?;

        let request = Request::fake_http("GET", "/status", vec![], vec![]);
        let response = server.handle_request(&request);

        assert_eq!(response.status_code, 200);
        let body: Value = parse_json_response(response)?;
        assert_eq!(body["tracks"], 0);
        assert_eq!(body["last_load"], Value::Null);
        Ok(())
    }

    #[test]
    fn test_http_unknown_route() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let server = create_server(&dir)?;

        let request = Request::fake_http("GET", "/tracks", vec![], vec![]);
        assert_eq!(server.handle_request(&request).status_code, 404);
        Ok(())
    }
}
