use std::{borrow::Cow, io::ErrorKind, path::PathBuf, sync::Arc};

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use minijinja::context;
use tokio::net::TcpListener;
use tower::ServiceExt;
use tower_http::{services::ServeFile, trace::TraceLayer};

use crate::error::{Error, Result};
use crate::path::RelPath;
use crate::site::{Body, Site};
use crate::templates::{INDEX_PAGE, INDEX_TEXT, NOT_FOUND_PAGE};
use crate::tree::DEFAULT_IGNORE;

/// ports tried after the requested one is taken
pub const MAX_PORT_RETRIES: u16 = 10;

enum Resolved {
    Text { extension: String, content: String },
    File(PathBuf),
    NotFound(String),
}

pub fn router(site: Arc<Site>) -> Router {
    Router::new()
        .route("/_index.html", get(index_page))
        .route("/_index.txt", get(index_text))
        .fallback(page)
        .with_state(site)
}

/// serve `site` until the process is stopped
pub async fn serve(site: Site, host: &str, port: u16) -> Result<()> {
    let listener = bind(host, port).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    let app = router(Arc::new(site)).layer(TraceLayer::new_for_http());
    axum::serve(listener, app).await?;
    Ok(())
}

async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let mut last_err = std::io::Error::from(ErrorKind::AddrInUse);
    for offset in 0..MAX_PORT_RETRIES {
        let Some(candidate) = port.checked_add(offset) else {
            break;
        };
        match TcpListener::bind((host, candidate)).await {
            Ok(listener) => {
                if offset > 0 {
                    tracing::warn!("port {port} is in use, using {candidate} instead");
                }
                return Ok(listener);
            }
            Err(err) if err.kind() == ErrorKind::AddrInUse => last_err = err,
            Err(err) => return Err(err.into()),
        }
    }
    Err(last_err.into())
}

/// `.html` for `_index.html`
fn extension(name: &str) -> &str {
    name.rfind('.').map(|idx| &name[idx..]).unwrap_or_default()
}

/// for rendered text, binary files go through `ServeFile`
fn content_type(extension: &str) -> &'static str {
    match extension.to_lowercase().as_str() {
        ".html" | ".htm" => "text/html; charset=utf-8",
        ".css" => "text/css; charset=utf-8",
        ".js" | ".mjs" => "application/javascript; charset=utf-8",
        ".json" => "application/json; charset=utf-8",
        ".xml" => "application/xml; charset=utf-8",
        ".svg" => "image/svg+xml",
        ".md" => "text/markdown; charset=utf-8",
        _ => "text/plain; charset=utf-8",
    }
}

fn text(status: StatusCode, extension: &str, content: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, content_type(extension))],
        content,
    )
        .into_response()
}

fn server_error(err: impl std::fmt::Display) -> Response {
    tracing::error!("{err}");
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
}

fn not_found(site: &Site, path: &str) -> Response {
    let content = site
        .renderer()
        .render_name(NOT_FOUND_PAGE, context! { path => path })
        .unwrap_or_else(|err| {
            tracing::warn!("Unable to render `{NOT_FOUND_PAGE}`: {err}");
            format!("Not found: {path}")
        });
    text(StatusCode::NOT_FOUND, extension(NOT_FOUND_PAGE), content)
}

fn is_private(path: &RelPath) -> bool {
    path.segments()
        .any(|s| DEFAULT_IGNORE.iter().any(|prefix| s.starts_with(prefix)))
}

/// the source file behind a request path, rendered
fn resolve(site: &Site, uri_path: &str) -> Result<Resolved> {
    let decoded = urlencoding::decode(uri_path)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| uri_path.to_string());
    let mut path = match RelPath::new(&decoded) {
        Ok(path) => path,
        Err(Error::Traversal(_)) => return Ok(Resolved::NotFound(decoded)),
        Err(err) => return Err(err),
    };
    if path.is_empty() || path.to_path(site.source_dir()).is_dir() {
        path = path.join("index.html")?;
    }
    if is_private(&path) {
        return Ok(Resolved::NotFound(path.to_string()));
    }

    let renderer = site.renderer();
    let candidates = std::iter::once(path.clone()).chain(site.translator().sources_for(&path));
    for source in candidates {
        let output = site.translator().translate(&source).output;
        if !source.to_path(site.source_dir()).is_file()
            || site.qualifier().is_excluded(&source, &output)
        {
            continue;
        }
        if let Some(processed) = site.render(&renderer, &source)? {
            return Ok(match processed.body {
                Body::Text(content) => Resolved::Text {
                    extension: site.translator().output_extension(&source),
                    content,
                },
                Body::File(file) => Resolved::File(file),
            });
        }
    }
    Ok(Resolved::NotFound(path.to_string()))
}

async fn page(State(site): State<Arc<Site>>, request: Request) -> Response {
    let uri_path = request.uri().path().to_string();
    let resolved = {
        let (site, uri_path) = (site.clone(), uri_path.clone());
        tokio::task::spawn_blocking(move || resolve(&site, &uri_path)).await
    };
    match resolved {
        Ok(Ok(Resolved::Text { extension, content })) => text(StatusCode::OK, &extension, content),
        Ok(Ok(Resolved::File(file))) => match ServeFile::new(file).oneshot(request).await {
            Ok(response) => response.into_response(),
            Err(infallible) => match infallible {},
        },
        Ok(Ok(Resolved::NotFound(path))) => not_found(&site, &path),
        // deleted while being rendered
        Ok(Err(err)) if err.is_not_found() => not_found(&site, &uri_path),
        Ok(Err(err)) => server_error(err),
        Err(err) => server_error(err),
    }
}

async fn index(site: Arc<Site>, name: &'static str) -> Response {
    let rendered = tokio::task::spawn_blocking(move || {
        let renderer = site.renderer();
        site.pages_index(&renderer)
            .and_then(|entries| site.render_index(&renderer, name, &entries))
    })
    .await;
    match rendered {
        Ok(Ok(content)) => text(StatusCode::OK, extension(name), content),
        Ok(Err(err)) => server_error(err),
        Err(err) => server_error(err),
    }
}

async fn index_page(State(site): State<Arc<Site>>) -> Response {
    index(site, INDEX_PAGE).await
}

async fn index_text(State(site): State<Arc<Site>>) -> Response {
    index(site, INDEX_TEXT).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Overrides, Settings, SOURCE_DIR};
    use crate::processors::{testing::Shout, ProcessorRegistry};
    use crate::site::SiteOptions;
    use axum::body::Body as HttpBody;
    use std::fs;

    const PAGE: &str = r#"<!DOCTYPE html><html><link href="/css/style.css"><body>{{ request.path }}</body></html>"#;

    fn app() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let files = [
            ("index.html", PAGE),
            ("blog/index.html", PAGE),
            ("hello world.html", PAGE),
            ("fragment.html", "<p>part</p>"),
            ("_layout.html", "private"),
            ("css/style.scss", "body {}"),
            ("img/a.png", "png"),
        ];
        for (name, content) in files {
            let path = dir.path().join(SOURCE_DIR).join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let settings = Settings::load(dir.path(), &Overrides::default());
        let registry = ProcessorRegistry::default().with(Box::new(Shout));
        let site = Site::with_registry(dir.path(), SiteOptions::default(), settings, registry).unwrap();
        (dir, router(Arc::new(site)))
    }

    async fn fetch(app: Router, uri: &str) -> (StatusCode, String, String) {
        let request = axum::http::Request::builder()
            .uri(uri)
            .body(HttpBody::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn pages_are_rendered_not_relativized() {
        let (_dir, app) = app();
        let (status, ct, body) = fetch(app.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(ct.starts_with("text/html"));
        assert!(body.contains(r#"href="/css/style.css""#));
        assert!(body.contains("<body>index.html</body>"));

        let (status, _, body) = fetch(app, "/blog").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("blog/index.html"));
    }

    #[tokio::test]
    async fn processed_files_by_their_built_name() {
        let (_dir, app) = app();
        let (status, ct, body) = fetch(app, "/css/style.css?v=3").await;
        assert_eq!(status, StatusCode::OK);
        assert!(ct.starts_with("text/css"));
        assert_eq!(body, "BODY {}");
    }

    #[tokio::test]
    async fn static_files_and_encoded_names() {
        let (_dir, app) = app();
        let (status, _, body) = fetch(app.clone(), "/img/a.png").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "png");

        let (status, _, body) = fetch(app.clone(), "/hello%20world.html").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("hello world.html"));

        // fragments are still served while designing
        let (status, _, _) = fetch(app, "/fragment.html").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_private_and_traversal_are_not_found() {
        let (_dir, app) = app();
        for uri in ["/nope.html", "/_layout.html", "/../Cargo.toml", "/%2e%2e/secret"] {
            let (status, ct, _) = fetch(app.clone(), uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert!(ct.starts_with("text/html"));
        }
        let (_, _, body) = fetch(app, "/nope.html").await;
        assert!(body.contains("nope.html"));
    }

    #[tokio::test]
    async fn index_lists_pages() {
        let (_dir, app) = app();
        let (status, ct, body) = fetch(app.clone(), "/_index.txt").await;
        assert_eq!(status, StatusCode::OK);
        assert!(ct.starts_with("text/plain"));
        let paths: Vec<_> = body.lines().map(|l| l.split('\t').next().unwrap()).collect();
        assert_eq!(paths, ["hello world.html", "index.html", "blog/index.html"]);

        let (status, ct, _) = fetch(app, "/_index.html").await;
        assert_eq!(status, StatusCode::OK);
        assert!(ct.starts_with("text/html"));
    }
}
