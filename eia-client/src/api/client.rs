use std::time::Duration;

use futures::Stream;
use serde::{de::DeserializeOwned, Deserialize};

use super::{de, ClientError};

/// Hard page-size ceiling enforced by the provider.
pub const MAX_PAGE_SIZE: usize = 5000;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub page_size: usize,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.eia.gov/v2".to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
            page_size: MAX_PAGE_SIZE,
        }
    }
}

/// Query parameters for a `/data` request.
///
/// Facets and columns are repeated keys (`facets[name][]=a&facets[name][]=b`),
/// so the query is kept as an ordered list rather than a map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataQuery {
    columns: Vec<String>,
    facets: Vec<(String, Vec<String>)>,
    frequency: Option<String>,
    sort_desc: Vec<String>,
    length: Option<usize>,
    offset: usize,
}

impl DataQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, name: &str) -> Self {
        self.columns.push(name.to_string());
        self
    }

    pub fn facet<I, S>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if !values.is_empty() {
            self.facets.push((name.to_string(), values));
        }
        self
    }

    pub fn frequency(mut self, frequency: &str) -> Self {
        self.frequency = Some(frequency.to_string());
        self
    }

    pub fn sort_desc(mut self, column: &str) -> Self {
        self.sort_desc.push(column.to_string());
        self
    }

    pub fn length(mut self, length: usize) -> Self {
        self.length = Some(length.min(MAX_PAGE_SIZE));
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        for col in &self.columns {
            params.push(("data[]".to_string(), col.clone()));
        }
        for (name, values) in &self.facets {
            for value in values {
                params.push((format!("facets[{name}][]"), value.clone()));
            }
        }
        if let Some(frequency) = &self.frequency {
            params.push(("frequency".to_string(), frequency.clone()));
        }
        for (i, col) in self.sort_desc.iter().enumerate() {
            params.push((format!("sort[{i}][column]"), col.clone()));
            params.push((format!("sort[{i}][direction]"), "desc".to_string()));
        }
        if let Some(length) = self.length {
            params.push(("length".to_string(), length.to_string()));
        }
        if self.offset > 0 {
            params.push(("offset".to_string(), self.offset.to_string()));
        }
        params
    }
}

/// One page of a `/data` response.
#[derive(Debug, Clone)]
pub struct DataPage<T> {
    pub total: usize,
    pub data: Vec<T>,
}

#[derive(Deserialize)]
struct ResponseEnvelope<T> {
    response: ResponseBody<T>,
}

#[derive(Deserialize)]
struct ResponseBody<T> {
    #[serde(default, deserialize_with = "de::lenient_usize")]
    total: Option<usize>,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

/// Async client for the EIA open-data API v2.
#[derive(Debug, Clone)]
pub struct EiaClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl EiaClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn data_url(&self, route: &str) -> String {
        let route = route.trim_matches('/');
        let route = route.strip_suffix("/data").unwrap_or(route);
        format!("{}/{}/data", self.config.base_url.trim_end_matches('/'), route)
    }

    /// Fetch one page, retrying transient failures with linear backoff.
    pub async fn get_data<T>(&self, route: &str, query: &DataQuery) -> Result<DataPage<T>, ClientError>
    where
        T: DeserializeOwned,
    {
        let url = self.data_url(route);
        let mut params = vec![("api_key".to_string(), self.config.api_key.clone())];
        params.extend(query.to_params());

        let mut attempt: u32 = 0;
        loop {
            match self.send(&url, &params).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let sleep_for = self.config.retry_backoff * attempt;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        route,
                        "EIA request failed, retrying with backoff"
                    );
                    tokio::time::sleep(sleep_for).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, route, "EIA request failed, giving up");
                    return Err(e);
                }
            }
        }
    }

    async fn send<T>(&self, url: &str, params: &[(String, String)]) -> Result<DataPage<T>, ClientError>
    where
        T: DeserializeOwned,
    {
        let response = self.http.get(url).query(params).send().await?;
        let status = response.status().as_u16();
        match status {
            401 | 403 => return Err(ClientError::Authentication),
            429 => return Err(ClientError::RateLimited),
            404 => return Err(ClientError::NotFound(url.to_string())),
            s if s >= 400 => {
                let body = response.text().await.unwrap_or_default();
                return Err(ClientError::Status { status: s, body });
            }
            _ => {}
        }

        let bytes = response.bytes().await?;
        let envelope: ResponseEnvelope<T> =
            serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))?;

        let data = envelope.response.data;
        let total = envelope.response.total.unwrap_or(data.len());
        Ok(DataPage { total, data })
    }

    /// Stream rows across pages until `max_records` rows were yielded or the
    /// provider runs out of data.
    pub fn paginate<'a, T>(
        &'a self,
        route: &'a str,
        query: DataQuery,
        max_records: usize,
    ) -> impl Stream<Item = Result<T, ClientError>> + Send + 'a
    where
        T: DeserializeOwned + Send + 'a,
    {
        let page_size = self.config.page_size.clamp(1, MAX_PAGE_SIZE);
        async_stream::try_stream! {
            let mut offset = 0usize;
            let mut fetched = 0usize;

            while fetched < max_records {
                let requested = page_size.min(max_records - fetched);
                let q = query.clone().length(requested).offset(offset);
                let page: DataPage<T> = self.get_data(route, &q).await?;

                let received = page.data.len();
                if received == 0 {
                    break;
                }
                let has_more = offset + received < page.total;

                for row in page.data.into_iter().take(max_records - fetched) {
                    fetched += 1;
                    yield row;
                }

                if !has_more || received < requested {
                    break;
                }
                offset += received;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_params_repeat_facets_and_columns() {
        let q = DataQuery::new()
            .column("latitude")
            .column("longitude")
            .facet("energy_source_code", ["SUN", "WND"])
            .facet("status", Vec::<String>::new())
            .frequency("monthly")
            .sort_desc("period")
            .length(10)
            .offset(20);

        let params = q.to_params();
        let pairs: Vec<(&str, &str)> = params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                ("data[]", "latitude"),
                ("data[]", "longitude"),
                ("facets[energy_source_code][]", "SUN"),
                ("facets[energy_source_code][]", "WND"),
                ("frequency", "monthly"),
                ("sort[0][column]", "period"),
                ("sort[0][direction]", "desc"),
                ("length", "10"),
                ("offset", "20"),
            ]
        );
    }

    #[test]
    fn length_is_capped_at_provider_maximum() {
        let q = DataQuery::new().length(20_000);
        assert!(q.to_params().contains(&("length".to_string(), "5000".to_string())));
    }

    #[test]
    fn data_url_normalises_slashes_and_suffix() {
        let mut cfg = ClientConfig::new("k");
        cfg.base_url = "http://localhost:9000/v2/".to_string();
        let client = EiaClient::new(cfg).unwrap();
        assert_eq!(
            client.data_url("/electricity/rto/fuel-type-data/"),
            "http://localhost:9000/v2/electricity/rto/fuel-type-data/data"
        );
        assert_eq!(
            client.data_url("electricity/operating-generator-capacity/data"),
            "http://localhost:9000/v2/electricity/operating-generator-capacity/data"
        );
    }

    #[test]
    fn envelope_tolerates_string_totals_and_missing_data() {
        let env: ResponseEnvelope<serde_json::Value> =
            serde_json::from_str(r#"{"response": {"total": "12", "data": [{"a": 1}]}}"#).unwrap();
        assert_eq!(env.response.total, Some(12));
        assert_eq!(env.response.data.len(), 1);

        let empty: ResponseEnvelope<serde_json::Value> = serde_json::from_str(r#"{"response": {}}"#).unwrap();
        assert!(empty.response.data.is_empty());
        assert_eq!(empty.response.total, None);
    }

    mod served {
        use super::super::*;
        use axum::{
            extract::{Query, State},
            http::StatusCode,
            response::{IntoResponse, Response},
            routing::get,
            Json, Router,
        };
        use futures::TryStreamExt;
        use serde_json::{json, Value};
        use std::sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        };

        const ROUTE: &str = "electricity/test-route";

        async fn serve(app: Router) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{addr}")
        }

        fn client(base_url: String, max_retries: u32, page_size: usize) -> EiaClient {
            let mut cfg = ClientConfig::new("test-key");
            cfg.base_url = base_url;
            cfg.max_retries = max_retries;
            cfg.retry_backoff = Duration::from_millis(1);
            cfg.page_size = page_size;
            EiaClient::new(cfg).unwrap()
        }

        fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
            params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
        }

        async fn limited_then_ok(State(calls): State<Arc<AtomicUsize>>) -> Response {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                StatusCode::TOO_MANY_REQUESTS.into_response()
            } else {
                Json(json!({ "response": { "total": 1, "data": [{ "n": 1 }] } })).into_response()
            }
        }

        #[tokio::test]
        async fn rate_limited_request_is_retried() {
            let calls = Arc::new(AtomicUsize::new(0));
            let app = Router::new()
                .route("/electricity/test-route/data", get(limited_then_ok))
                .with_state(calls.clone());
            let client = client(serve(app).await, 3, MAX_PAGE_SIZE);

            let page: DataPage<Value> = client.get_data(ROUTE, &DataQuery::new()).await.unwrap();
            assert_eq!(page.data.len(), 1);
            assert_eq!(calls.load(Ordering::SeqCst), 2);
        }

        #[tokio::test]
        async fn unauthorized_request_is_not_retried() {
            let calls = Arc::new(AtomicUsize::new(0));
            let app = Router::new()
                .route(
                    "/electricity/test-route/data",
                    get(|State(calls): State<Arc<AtomicUsize>>| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        StatusCode::UNAUTHORIZED
                    }),
                )
                .with_state(calls.clone());
            let client = client(serve(app).await, 3, MAX_PAGE_SIZE);

            let err = client.get_data::<Value>(ROUTE, &DataQuery::new()).await.unwrap_err();
            assert!(matches!(err, ClientError::Authentication));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn exhausted_retries_return_the_last_error() {
            let calls = Arc::new(AtomicUsize::new(0));
            let app = Router::new()
                .route(
                    "/electricity/test-route/data",
                    get(|State(calls): State<Arc<AtomicUsize>>| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        (StatusCode::SERVICE_UNAVAILABLE, "busy")
                    }),
                )
                .with_state(calls.clone());
            let client = client(serve(app).await, 2, MAX_PAGE_SIZE);

            let err = client.get_data::<Value>(ROUTE, &DataQuery::new()).await.unwrap_err();
            assert!(matches!(err, ClientError::Status { status: 503, .. }));
            assert_eq!(calls.load(Ordering::SeqCst), 3);
        }

        type Seen = Arc<Mutex<Vec<(usize, usize)>>>;

        // Five rows total, served in whatever window the request asks for.
        async fn five_rows(State(seen): State<Seen>, Query(params): Query<Vec<(String, String)>>) -> Json<Value> {
            let offset: usize = param(&params, "offset").and_then(|v| v.parse().ok()).unwrap_or(0);
            let length: usize = param(&params, "length").and_then(|v| v.parse().ok()).unwrap_or(5000);
            seen.lock().unwrap().push((offset, length));
            let rows: Vec<Value> = (offset..(offset + length).min(5)).map(|n| json!({ "n": n })).collect();
            Json(json!({ "response": { "total": 5, "data": rows } }))
        }

        fn paged_app(seen: Seen) -> Router {
            Router::new()
                .route("/electricity/test-route/data", get(five_rows))
                .with_state(seen)
        }

        #[tokio::test]
        async fn paginate_walks_every_page() {
            let seen: Seen = Arc::default();
            let client = client(serve(paged_app(seen.clone())).await, 0, 2);

            let rows: Vec<Value> = client.paginate(ROUTE, DataQuery::new(), 100).try_collect().await.unwrap();
            let ns: Vec<u64> = rows.iter().map(|r| r["n"].as_u64().unwrap()).collect();
            assert_eq!(ns, vec![0, 1, 2, 3, 4]);
            assert_eq!(*seen.lock().unwrap(), vec![(0, 2), (2, 2), (4, 2)]);
        }

        #[tokio::test]
        async fn paginate_stops_at_max_records() {
            let seen: Seen = Arc::default();
            let client = client(serve(paged_app(seen.clone())).await, 0, 2);

            let rows: Vec<Value> = client.paginate(ROUTE, DataQuery::new(), 3).try_collect().await.unwrap();
            assert_eq!(rows.len(), 3);
            assert_eq!(*seen.lock().unwrap(), vec![(0, 2), (2, 1)]);
        }
    }
}
