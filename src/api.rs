//! HTTP client for the Eagle proxy backend.
//!
//! All calls are blocking (`ureq`). The page endpoint is driven from fetch
//! worker threads through the `PageFetcher` impl; everything else is called
//! directly by the CLI or the viewer.

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::fetch::{CancelToken, FetchError, PageFetcher, PageRequest};
use crate::item::Item;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("library '{name}' not active after {attempts} checks")]
    SwitchTimeout { name: String, attempts: u32 },
}

/// One entry of `/library/image_list`.
#[derive(Debug, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "thumbnailUrl")]
    pub thumbnail_url: Option<String>,
}

impl From<RawItem> for Item {
    fn from(raw: RawItem) -> Self {
        Item::from_wire(raw.id.as_deref(), raw.thumbnail_url.as_deref())
    }
}

/// Node of the `/folder/list` tree.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub children: Vec<Folder>,
}

impl Folder {
    /// Depth-first walk of `tree`, yielding `(depth, folder)` in display order.
    pub fn flatten(tree: &[Folder]) -> Vec<(usize, &Folder)> {
        fn walk<'a>(nodes: &'a [Folder], depth: usize, out: &mut Vec<(usize, &'a Folder)>) {
            for node in nodes {
                out.push((depth, node));
                walk(&node.children, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        walk(tree, 0, &mut out);
        out
    }

    /// Find a folder by exact id, falling back to a case-insensitive name match.
    pub fn find<'a>(tree: &'a [Folder], key: &str) -> Option<&'a Folder> {
        let flat = Self::flatten(tree);
        flat.iter()
            .map(|(_, f)| *f)
            .find(|f| f.id == key)
            .or_else(|| {
                flat.iter()
                    .map(|(_, f)| *f)
                    .find(|f| f.name.eq_ignore_ascii_case(key))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    pub name: String,
    pub path: String,
}

/// `/api/item/info/{id}` record. Known fields are typed; the rest is kept.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ItemInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub width: Option<u64>,
    #[serde(default)]
    pub height: Option<u64>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ItemInfo {
    /// One-line summary: `name.ext  WxH  N KB  #tag #tag`.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        match (&self.name, &self.ext) {
            (Some(name), Some(ext)) => parts.push(format!("{name}.{ext}")),
            (Some(name), None) => parts.push(name.clone()),
            _ => {}
        }
        if let (Some(w), Some(h)) = (self.width, self.height) {
            parts.push(format!("{w}x{h}"));
        }
        if let Some(size) = self.size {
            parts.push(format!("{} KB", size.div_ceil(1024)));
        }
        if !self.tags.is_empty() {
            let tags: Vec<String> = self.tags.iter().map(|t| format!("#{t}")).collect();
            parts.push(tags.join(" "));
        }
        parts.join("  ")
    }
}

#[derive(Debug, Deserialize)]
struct SwitchResponse {
    #[serde(default)]
    message: String,
}

/// `/library/current` may answer with a JSON string or bare text; strip the
/// surrounding quotes either way.
pub fn normalize_library_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Ok(name) = serde_json::from_str::<String>(trimmed) {
        return name.trim().to_string();
    }
    let unquoted = trimmed.strip_prefix('"').unwrap_or(trimmed);
    let unquoted = unquoted.strip_suffix('"').unwrap_or(unquoted);
    unquoted.trim().to_string()
}

/// Re-check the active library until it equals `name`.
///
/// Check errors are logged and retried like a mismatch. Sleeps `interval`
/// between checks, never after the last one.
pub fn wait_until_current(
    name: &str,
    attempts: u32,
    interval: Duration,
    mut current: impl FnMut() -> Result<String, ApiError>,
) -> Result<(), ApiError> {
    let wanted = name.trim();
    for attempt in 1..=attempts {
        match current() {
            Ok(active) if active == wanted => {
                info!("api: library '{wanted}' active after {attempt} check(s)");
                return Ok(());
            }
            Ok(active) => debug!(
                "api: library is '{active}', waiting for '{wanted}' ({attempt}/{attempts})"
            ),
            Err(e) => warn!("api: current library check failed ({attempt}/{attempts}): {e}"),
        }
        if attempt < attempts {
            thread::sleep(interval);
        }
    }
    Err(ApiError::SwitchTimeout {
        name: wanted.to_string(),
        attempts,
    })
}

pub struct EagleClient {
    agent: ureq::Agent,
    base: Url,
}

impl EagleClient {
    /// Create a client rooted at `base_url` (may include a proxy prefix such
    /// as `http://host:5173/eagle`).
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base = parse_base_url(base_url)?;
        let mut config = ureq::Agent::config_builder();
        config = config
            .http_status_as_error(false)
            .user_agent(concat!("eaglet/", env!("CARGO_PKG_VERSION")));
        Ok(Self {
            agent: config.build().into(),
            base,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Absolute URL for `segments` under the base path. Segments are
    /// percent-encoded individually.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// URL of the original image file, for opening outside the terminal.
    pub fn original_image_url(&self, id: &str) -> String {
        self.endpoint(&["library", "image", id]).to_string()
    }

    fn get_text(&self, url: &Url) -> Result<String, ApiError> {
        debug!("api: GET {url}");
        let mut response = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(|e| ApiError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(ApiError::Status {
                status,
                url: url.to_string(),
            });
        }
        response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ApiError> {
        let body = self.get_text(url)?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// `GET /library/image_list` for one cumulative page.
    pub fn image_list(&self, request: &PageRequest) -> Result<Vec<Item>, ApiError> {
        let mut url = self.endpoint(&["library", "image_list"]);
        url.query_pairs_mut().extend_pairs(request.query_pairs());
        let raw: Vec<RawItem> = self.get_json(&url)?;
        Ok(raw.into_iter().map(Item::from).collect())
    }

    pub fn current_library(&self) -> Result<String, ApiError> {
        let text = self.get_text(&self.endpoint(&["library", "current"]))?;
        Ok(normalize_library_name(&text))
    }

    /// Available libraries, sorted by name.
    pub fn library_list(&self) -> Result<Vec<Library>, ApiError> {
        let map: BTreeMap<String, String> = self.get_json(&self.endpoint(&["library_list"]))?;
        Ok(map
            .into_iter()
            .map(|(name, path)| Library { name, path })
            .collect())
    }

    pub fn folder_list(&self) -> Result<Vec<Folder>, ApiError> {
        self.get_json(&self.endpoint(&["folder", "list"]))
    }

    /// Ask the backend to switch libraries. Returns the backend's message.
    ///
    /// The switch is asynchronous on the Eagle side; use `wait_for_library`
    /// before trusting any listing.
    pub fn switch_library(&self, name: &str) -> Result<String, ApiError> {
        let resp: SwitchResponse =
            self.get_json(&self.endpoint(&["library", "switch", name.trim()]))?;
        info!("api: switch requested: {}", resp.message);
        Ok(resp.message)
    }

    pub fn wait_for_library(
        &self,
        name: &str,
        attempts: u32,
        interval: Duration,
    ) -> Result<(), ApiError> {
        wait_until_current(name, attempts, interval, || self.current_library())
    }

    pub fn item_info(&self, id: &str) -> Result<ItemInfo, ApiError> {
        self.get_json(&self.endpoint(&["api", "item", "info", id]))
    }
}

impl PageFetcher for EagleClient {
    fn fetch(&self, request: &PageRequest, token: &CancelToken) -> Result<Vec<Item>, FetchError> {
        token.check()?;
        let items = self
            .image_list(request)
            .map_err(|e| FetchError::failed(e.to_string()))?;
        // The blocking call cannot be interrupted; drop its result instead.
        token.check()?;
        Ok(items)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let invalid = |reason: String| ApiError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(invalid("missing host".into()));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::{self, BufRead, BufReader, Write};
    use std::net::TcpListener;

    fn client(base: &str) -> EagleClient {
        EagleClient::new(base).unwrap()
    }

    #[test]
    fn endpoint_joins_segments() {
        let c = client("http://127.0.0.1:8000");
        assert_eq!(
            c.endpoint(&["library", "image_list"]).as_str(),
            "http://127.0.0.1:8000/library/image_list"
        );
    }

    #[test]
    fn endpoint_keeps_proxy_prefix() {
        let c = client("http://localhost:5173/eagle/");
        assert_eq!(
            c.endpoint(&["folder", "list"]).as_str(),
            "http://localhost:5173/eagle/folder/list"
        );
    }

    #[test]
    fn endpoint_encodes_names() {
        let c = client("http://localhost:8000");
        assert_eq!(
            c.endpoint(&["library", "switch", "My Photos/2024"]).as_str(),
            "http://localhost:8000/library/switch/My%20Photos%2F2024"
        );
    }

    #[test]
    fn page_query_string() {
        let c = client("http://localhost:8000");
        let mut url = c.endpoint(&["library", "image_list"]);
        url.query_pairs_mut()
            .extend_pairs(PageRequest::new(20, Some("KF1".into())).query_pairs());
        assert_eq!(url.query(), Some("limit=40&offset=20&folderId=KF1"));
    }

    #[test]
    fn original_image_url() {
        let c = client("http://localhost:8000");
        assert_eq!(c.original_image_url("LX1"), "http://localhost:8000/library/image/LX1");
    }

    #[test]
    fn rejects_bad_base_urls() {
        assert!(matches!(
            EagleClient::new("not a url"),
            Err(ApiError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            EagleClient::new("ftp://host/"),
            Err(ApiError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn raw_items_translate_with_fallback() {
        let raw: Vec<RawItem> = serde_json::from_str(
            r#"[{"id":"A1","thumbnailUrl":"http://x/a"},{"id":"","thumbnailUrl":"http://x/b"},{"thumbnailUrl":"http://x/c"}]"#,
        )
        .unwrap();
        let items: Vec<Item> = raw.into_iter().map(Item::from).collect();
        assert_eq!(items[0], Item::new("A1", "http://x/a"));
        assert!(items[1].is_placeholder());
        assert_eq!(items[1].url, "http://x/b");
        assert!(items[2].is_placeholder());
        assert_ne!(items[1].id, items[2].id);
    }

    #[test]
    fn library_name_normalization() {
        assert_eq!(normalize_library_name("\"Photos\""), "Photos");
        assert_eq!(normalize_library_name("  Photos \n"), "Photos");
        assert_eq!(normalize_library_name("\" Spaced \""), "Spaced");
        assert_eq!(normalize_library_name("\"Half"), "Half");
    }

    #[test]
    fn folder_tree_flatten_and_find() {
        let tree: Vec<Folder> = serde_json::from_str(
            r#"[
                {"id":"F1","name":"Refs","children":[{"id":"F2","name":"Faces"}]},
                {"id":"F3","name":"Scenery","children":[]}
            ]"#,
        )
        .unwrap();
        let flat: Vec<(usize, &str)> = Folder::flatten(&tree)
            .into_iter()
            .map(|(d, f)| (d, f.id.as_str()))
            .collect();
        assert_eq!(flat, vec![(0, "F1"), (1, "F2"), (0, "F3")]);
        assert_eq!(Folder::find(&tree, "F2").map(|f| f.name.as_str()), Some("Faces"));
        assert_eq!(Folder::find(&tree, "scenery").map(|f| f.id.as_str()), Some("F3"));
        assert!(Folder::find(&tree, "nope").is_none());
    }

    #[test]
    fn item_info_summary() {
        let info: ItemInfo = serde_json::from_str(
            r#"{"id":"A","name":"cat","ext":"png","width":640,"height":480,"size":2048,"tags":["pet"],"annotation":"x"}"#,
        )
        .unwrap();
        assert_eq!(info.summary(), "cat.png  640x480  2 KB  #pet");
        assert!(info.extra.contains_key("annotation"));
    }

    #[test]
    fn wait_until_current_retries_then_succeeds() {
        let calls = Cell::new(0);
        let result = wait_until_current("Photos", 5, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            match calls.get() {
                1 => Err(ApiError::Status {
                    status: 503,
                    url: "u".into(),
                }),
                2 => Ok("Old".into()),
                _ => Ok("Photos".into()),
            }
        });
        assert!(result.is_ok());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn wait_until_current_gives_up() {
        let calls = Cell::new(0);
        let result = wait_until_current("Photos", 3, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            Ok("Old".into())
        });
        assert!(matches!(result, Err(ApiError::SwitchTimeout { attempts: 3, .. })));
        assert_eq!(calls.get(), 3);
    }

    /// Answer exactly one HTTP request on a local port. The join handle
    /// yields the request line that was received.
    fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}/eagle", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            loop {
                let mut header = String::new();
                let n = reader.read_line(&mut header).unwrap();
                if n == 0 || header == "\r\n" {
                    break;
                }
            }
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            request_line.trim_end().to_string()
        });
        (base, handle)
    }

    fn folder_page() -> PageRequest {
        PageRequest::new(20, Some("F 1".into()))
    }

    #[test]
    fn fetch_page_over_http() {
        let (base, server) = serve_once(
            "200 OK",
            r#"[{"id":"A1","thumbnailUrl":"http://x/a"},{"thumbnailUrl":"http://x/b"}]"#,
        );
        let items = client(&base)
            .fetch(&folder_page(), &CancelToken::new())
            .unwrap();
        assert_eq!(items[0], Item::new("A1", "http://x/a"));
        assert!(items[1].is_placeholder());
        assert_eq!(
            server.join().unwrap(),
            "GET /eagle/library/image_list?limit=40&offset=20&folderId=F+1 HTTP/1.1"
        );
    }

    #[test]
    fn fetch_non_2xx_is_failed() {
        let (base, server) = serve_once("500 Internal Server Error", "oops");
        let err = client(&base)
            .fetch(&folder_page(), &CancelToken::new())
            .unwrap_err();
        server.join().unwrap();
        match err {
            FetchError::Failed(msg) => assert!(msg.contains("HTTP 500"), "{msg}"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn fetch_unparsable_body_is_failed() {
        let (base, server) = serve_once("200 OK", "not json");
        let err = client(&base)
            .fetch(&folder_page(), &CancelToken::new())
            .unwrap_err();
        server.join().unwrap();
        match err {
            FetchError::Failed(msg) => assert!(msg.contains("unexpected response"), "{msg}"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn fetch_with_cancelled_token_skips_network() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let base = format!("http://{}/", listener.local_addr().unwrap());

        let token = CancelToken::new();
        token.cancel();
        let result = client(&base).fetch(&folder_page(), &token);
        assert_eq!(result, Err(FetchError::Cancelled));

        let accepted = listener.accept();
        assert!(
            matches!(&accepted, Err(e) if e.kind() == io::ErrorKind::WouldBlock),
            "no connection expected"
        );
    }
}
