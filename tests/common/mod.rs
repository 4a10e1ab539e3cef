//! Shared test infrastructure
//!
//! - `FakeS3`: an in-process S3 stand-in on wiremock that understands the
//!   four calls the harness makes (CreateBucket, PutObject, ListObjects,
//!   ListObjectsV2). It only accepts path-style requests with plain
//!   (non aws-chunked) bodies, so it also checks the client configuration.
//! - `docker_available`: skip check for the LocalStack suite; pings the
//!   Docker daemon over `DOCKER_HOST` or the default socket.

#![allow(dead_code)]

use bytes::Bytes;
use http_body_util::Empty;
use hyper_util::rt::TokioIo;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Keys the fake leaves out of listings, to provoke verification failures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Hidden {
    #[default]
    Nothing,
    /// Lexicographically first key, in both listing APIs
    FirstKey,
    /// Lexicographically first key, in ListObjectsV2 only
    FirstKeyInV2,
}

#[derive(Debug, Clone, Copy)]
pub struct FakeS3Options {
    pub page_size: usize,
    pub hidden: Hidden,
}

impl Default for FakeS3Options {
    fn default() -> Self {
        Self {
            page_size: 1000,
            hidden: Hidden::Nothing,
        }
    }
}

#[derive(Debug, Default)]
struct Store {
    buckets: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    // Bucket -> LocationConstraint of its CreateBucket request
    constraints: BTreeMap<String, Option<String>>,
    rejected: Vec<String>,
}

type SharedStore = Arc<Mutex<Store>>;

fn lock(store: &SharedStore) -> MutexGuard<'_, Store> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-process fake S3 endpoint
pub struct FakeS3 {
    server: MockServer,
    store: SharedStore,
}

impl FakeS3 {
    pub async fn start() -> Self {
        Self::with_options(FakeS3Options::default()).await
    }

    pub async fn with_options(options: FakeS3Options) -> Self {
        let server = MockServer::start().await;
        let store = SharedStore::default();

        Mock::given(method("PUT"))
            .and(path_regex(r"^/[^/]+/?$"))
            .respond_with(CreateBucket {
                store: store.clone(),
            })
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path_regex(r"^/[^/]+/.+$"))
            .respond_with(PutObject {
                store: store.clone(),
            })
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/[^/]+/?$"))
            .respond_with(ListObjects {
                store: store.clone(),
                options,
            })
            .mount(&server)
            .await;

        Self { server, store }
    }

    /// Endpoint URL for the S3 client
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn buckets(&self) -> Vec<String> {
        lock(&self.store).buckets.keys().cloned().collect()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        lock(&self.store)
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        lock(&self.store)
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key).cloned())
    }

    /// `LocationConstraint` sent when `bucket` was created; `None` inside
    /// means the request had no constraint
    pub fn location_constraint(&self, bucket: &str) -> Option<Option<String>> {
        lock(&self.store).constraints.get(bucket).cloned()
    }

    /// Descriptions of requests the fake refused
    pub fn rejected(&self) -> Vec<String> {
        lock(&self.store).rejected.clone()
    }
}

fn split_path(request: &Request) -> (String, String) {
    let path = request.url.path().trim_start_matches('/');
    match path.split_once('/') {
        Some((bucket, key)) => (bucket.to_string(), key.to_string()),
        None => (path.to_string(), String::new()),
    }
}

fn header<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|value| value.to_str().ok())
}

fn error_response(status: u16, code: &str, message: &str) -> ResponseTemplate {
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Error><Code>{}</Code><Message>{}</Message><RequestId>fake</RequestId></Error>",
        code, message
    );
    ResponseTemplate::new(status)
        .insert_header("content-type", "application/xml")
        .set_body_string(body)
}

fn xml_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/xml")
        .set_body_string(body)
}

struct CreateBucket {
    store: SharedStore,
}

impl Respond for CreateBucket {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let (bucket, _) = split_path(request);
        let constraint = location_constraint(&request.body);
        let mut store = lock(&self.store);
        if store.buckets.contains_key(&bucket) {
            return error_response(
                409,
                "BucketAlreadyOwnedByYou",
                "Your previous request to create the named bucket succeeded and you already own it.",
            );
        }
        store.buckets.insert(bucket.clone(), BTreeMap::new());
        store.constraints.insert(bucket.clone(), constraint);
        ResponseTemplate::new(200).insert_header("Location", format!("/{}", bucket).as_str())
    }
}

/// `<LocationConstraint>` of a CreateBucketConfiguration body, if any
fn location_constraint(body: &[u8]) -> Option<String> {
    let body = String::from_utf8_lossy(body);
    let (_, rest) = body.split_once("<LocationConstraint>")?;
    let (value, _) = rest.split_once("</LocationConstraint>")?;
    Some(value.trim().to_string())
}

struct PutObject {
    store: SharedStore,
}

impl Respond for PutObject {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let (bucket, key) = split_path(request);
        let mut store = lock(&self.store);

        let chunked = header(request, "content-encoding")
            .is_some_and(|value| value.contains("aws-chunked"))
            || header(request, "x-amz-content-sha256")
                .is_some_and(|value| value.starts_with("STREAMING-"));
        if chunked {
            store.rejected.push(format!("chunked upload of {}/{}", bucket, key));
            return error_response(400, "NotImplemented", "aws-chunked uploads are not supported");
        }

        let Some(objects) = store.buckets.get_mut(&bucket) else {
            return error_response(404, "NoSuchBucket", "The specified bucket does not exist");
        };
        objects.insert(key, request.body.clone());

        ResponseTemplate::new(200).insert_header("ETag", "\"5d41402abc4b2a76b9719d911017c592\"")
    }
}

struct ListObjects {
    store: SharedStore,
    options: FakeS3Options,
}

impl ListObjects {
    fn contents(objects: &BTreeMap<String, Vec<u8>>, keys: &[String]) -> String {
        keys.iter()
            .map(|key| {
                let size = objects.get(key).map(Vec::len).unwrap_or_default();
                format!(
                    "<Contents><Key>{}</Key><LastModified>2024-01-01T00:00:00.000Z</LastModified>\
                     <ETag>&quot;5d41402abc4b2a76b9719d911017c592&quot;</ETag><Size>{}</Size>\
                     <StorageClass>STANDARD</StorageClass></Contents>",
                    key, size
                )
            })
            .collect()
    }
}

impl Respond for ListObjects {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let (bucket, _) = split_path(request);
        let params: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
        let v2 = params.get("list-type").is_some_and(|value| value == "2");
        let prefix = params.get("prefix").cloned().unwrap_or_default();

        let store = lock(&self.store);
        let Some(objects) = store.buckets.get(&bucket) else {
            return error_response(404, "NoSuchBucket", "The specified bucket does not exist");
        };

        let mut matching: Vec<String> = objects
            .keys()
            .filter(|key| key.starts_with(&prefix))
            .cloned()
            .collect();
        let hide = match self.options.hidden {
            Hidden::Nothing => false,
            Hidden::FirstKey => true,
            Hidden::FirstKeyInV2 => v2,
        };
        if hide && !matching.is_empty() {
            matching.remove(0);
        }

        let start_after = if v2 {
            params
                .get("continuation-token")
                .or_else(|| params.get("start-after"))
                .cloned()
        } else {
            params.get("marker").cloned()
        };
        let remaining: Vec<String> = matching
            .into_iter()
            .filter(|key| start_after.as_ref().map_or(true, |after| key > after))
            .collect();

        let page_size = self.options.page_size.max(1);
        let truncated = remaining.len() > page_size;
        let page: Vec<String> = remaining.into_iter().take(page_size).collect();
        let contents = Self::contents(objects, &page);

        let body = if v2 {
            let continuation = params
                .get("continuation-token")
                .map(|token| format!("<ContinuationToken>{}</ContinuationToken>", token))
                .unwrap_or_default();
            let next = match (truncated, page.last()) {
                (true, Some(last)) => {
                    format!("<NextContinuationToken>{}</NextContinuationToken>", last)
                }
                _ => String::new(),
            };
            format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                 <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
                 <Name>{}</Name><Prefix>{}</Prefix><KeyCount>{}</KeyCount><MaxKeys>{}</MaxKeys>\
                 <IsTruncated>{}</IsTruncated>{}{}{}</ListBucketResult>",
                bucket,
                prefix,
                page.len(),
                page_size,
                truncated,
                continuation,
                next,
                contents
            )
        } else {
            // Like S3 without a delimiter: no NextMarker, clients resume
            // after the last key.
            format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
                 <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
                 <Name>{}</Name><Prefix>{}</Prefix><Marker>{}</Marker><MaxKeys>{}</MaxKeys>\
                 <IsTruncated>{}</IsTruncated>{}</ListBucketResult>",
                bucket,
                prefix,
                start_after.unwrap_or_default(),
                page_size,
                truncated,
                contents
            )
        };

        xml_response(body)
    }
}

/// A Docker daemon answers `GET /_ping` within two seconds
pub async fn docker_available() -> bool {
    tokio::time::timeout(Duration::from_secs(2), ping_docker())
        .await
        .unwrap_or(false)
}

async fn ping_docker() -> bool {
    let host = std::env::var("DOCKER_HOST").unwrap_or_default();

    if let Some(addr) = host.strip_prefix("tcp://") {
        return match tokio::net::TcpStream::connect(addr).await {
            Ok(stream) => ping(stream).await,
            Err(_) => false,
        };
    }

    match host.strip_prefix("unix://") {
        Some(path) => ping_socket(path).await,
        None if host.is_empty() => ping_socket("/var/run/docker.sock").await,
        None => false,
    }
}

#[cfg(unix)]
pub async fn ping_socket(path: &str) -> bool {
    match tokio::net::UnixStream::connect(path).await {
        Ok(stream) => ping(stream).await,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
pub async fn ping_socket(_path: &str) -> bool {
    false
}

/// `GET /_ping` over an open connection to the daemon
pub async fn ping<S>(stream: S) -> bool
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let Ok((mut sender, connection)) =
        hyper::client::conn::http1::handshake(TokioIo::new(stream)).await
    else {
        return false;
    };
    tokio::spawn(connection);

    let Ok(request) = hyper::Request::get("/_ping")
        .header(hyper::header::HOST, "docker")
        .body(Empty::<Bytes>::new())
    else {
        return false;
    };

    match sender.send_request(request).await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}
