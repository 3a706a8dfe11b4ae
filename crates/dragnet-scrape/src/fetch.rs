use bytes::Bytes;
use dragnet_core::{Context, EngineError, ProxyProvider as _, StepError, USER_AGENT};
use dragnet_journal::StatusData;
use md5::{Digest, Md5};
use serde_json::{Map, Value, json};
use std::path::Path;

/// Scratch-file suffix for raw response bodies: `<key>.scrape`.
pub const SCRAPE_SUFFIX: &str = "scrape";

const POST_PAYLOAD_PARAM: &str = "post_payload";
const COOKIES_PARAM: &str = "cookies";

pub(crate) fn required_url(key: &str, status: &StatusData) -> Result<String, StepError> {
    status.url().map(str::to_string).ok_or_else(|| {
        StepError::Fatal(EngineError::MissingParam {
            key: key.to_string(),
            param: "url",
        })
    })
}

pub(crate) fn md5_hex(body: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

/// Issues the request configured by the task's params (GET by default,
/// POST when `post_payload` is present), writes the body to `file_path`,
/// and returns the scrape patch: size, body digest, response headers.
/// Non-2xx responses fail recoverably before anything is written.
pub(crate) async fn fetch_into_file(
    ctx: &Context,
    url: &str,
    status: &StatusData,
    file_path: &Path,
) -> Result<Value, StepError> {
    let client = request_client(ctx)?;
    let params = status.params();

    let mut request = match params.and_then(|p| p.get(POST_PAYLOAD_PARAM)) {
        Some(payload) => client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(payload),
        None => client.get(url),
    };
    if let Some(cookies) = params.and_then(|p| p.get(COOKIES_PARAM)).and_then(cookie_header) {
        request = request.header(reqwest::header::COOKIE, cookies);
    }

    let response = request.send().await?;
    let status_code = response.status();
    let headers = single_valued_headers(response.headers());
    if !status_code.is_success() {
        return Err(StepError::Runtime(format!(
            "HTTP response {}",
            status_code.as_u16()
        )));
    }

    let body: Bytes = response.bytes().await?;
    let patch = json!({
        "size": body.len(),
        "content": md5_hex(&body),
        "response_headers": Value::Object(headers),
    });
    tokio::fs::write(file_path, &body)
        .await
        .map_err(|e| scratch_error(file_path, e))?;
    Ok(patch)
}

pub(crate) fn scratch_error(path: &Path, error: std::io::Error) -> StepError {
    StepError::Fatal(EngineError::Scratch {
        path: path.display().to_string(),
        detail: error.to_string(),
    })
}

/// Picks the client for one request. Proxied requests get a short-lived
/// client of their own because reqwest scopes proxies to the client, not
/// the request.
fn request_client(ctx: &Context) -> Result<reqwest::Client, StepError> {
    let proxy_url = ctx
        .proxy_provider
        .as_ref()
        .and_then(|provider| provider.get_one_proxy(None));
    match proxy_url {
        Some(proxy_url) => {
            let proxy = reqwest::Proxy::all(&proxy_url)?;
            let client = reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .danger_accept_invalid_certs(true)
                .proxy(proxy)
                .build()?;
            Ok(client)
        }
        None => ctx.session.clone().ok_or_else(|| {
            StepError::Fatal(EngineError::InvariantViolation(
                "scrape executors require an http session".to_string(),
            ))
        }),
    }
}

fn cookie_header(cookies: &Value) -> Option<String> {
    let cookies = cookies.as_object()?;
    if cookies.is_empty() {
        return None;
    }
    let rendered: Vec<String> = cookies
        .iter()
        .map(|(name, value)| {
            // Bare text for string values, JSON rendering otherwise.
            let value = match value.as_str() {
                Some(text) => text.to_string(),
                None => value.to_string(),
            };
            format!("{name}={value}")
        })
        .collect();
    Some(rendered.join("; "))
}

fn single_valued_headers(headers: &reqwest::header::HeaderMap) -> Map<String, Value> {
    let mut map = Map::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_insert_with(|| Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()));
    }
    map
}
