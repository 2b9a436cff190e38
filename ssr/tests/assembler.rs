use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use http::{header, StatusCode, Uri};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use ssr_assembler::{
    Action, AssetManifest, Assembler, Head, InitialData, InitializationError, Location,
    PreloadError, Preloads, RenderOutcome, RenderRequest, RenderedPage, Renderer, RenderingError,
    SsrConfig, State, Template, TemplateSource,
};

const TEMPLATE: &str = concat!(
    "<!doctype html><html><head>{{META}}<title>Build title</title>{{LINK}}</head>",
    "<body><div id=\"root\"></div><script src=\"/main.js\"></script></body></html>"
);

struct FnRenderer<F> {
    render: F,
    calls: Arc<AtomicUsize>,
}

impl<F> FnRenderer<F> {
    fn new(render: F) -> Self {
        Self {
            render,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl<F> Renderer for FnRenderer<F>
where
    F: Fn(&Location, &State) -> Result<RenderOutcome, RenderingError> + Send + Sync,
{
    async fn render(&self, request: RenderRequest<'_>) -> Result<RenderOutcome, RenderingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        (self.render)(request.location, request.state)
    }
}

fn page(markup: &str) -> RenderedPage {
    RenderedPage {
        markup: markup.to_owned(),
        ..RenderedPage::default()
    }
}

fn manifest() -> AssetManifest {
    vec![("home.js", "a1b2.js"), ("about.js", "c3d4.js")]
        .into_iter()
        .collect()
}

async fn assembler<R: Renderer + 'static>(renderer: R) -> Assembler {
    let cfg = SsrConfig {
        manifest: None,
        default_title: "Fallback".to_owned(),
        ..SsrConfig::default()
    };
    Assembler::new(cfg, renderer)
        .await
        .unwrap()
        .with_template(Template::new(TEMPLATE))
        .with_manifest(manifest())
}

fn request(uri: &'static str) -> ssr_assembler::RequestContext {
    ssr_assembler::RequestContext::new(Uri::from_static(uri))
}

fn embedded_state(html: &str) -> Value {
    let start = html
        .find("window.__PRELOADED_STATE__ = ")
        .expect("state script is present")
        + "window.__PRELOADED_STATE__ = ".len();
    let end = start + html[start..].find("</script>").unwrap();
    serde_json::from_str(&html[start..end]).unwrap()
}

#[tokio::test]
async fn renders_complete_document() {
    let renderer = FnRenderer::new(|location: &Location, _: &State| {
        assert_eq!(location.to_string(), "/?tab=news");
        Ok(RenderOutcome::Rendered(RenderedPage {
            markup: "<h1>Home</h1>".to_owned(),
            head: Head {
                title: "<title>Home</title>".to_owned(),
                meta: r#"<meta name="description" content="Front page">"#.to_owned(),
                link: r#"<link rel="canonical" href="https://example.com/">"#.to_owned(),
                html_attributes: r#"lang="en""#.to_owned(),
                script: r#"<script type="application/ld+json">{}</script>"#.to_owned(),
            },
            modules: vec!["home".to_owned(), "home".to_owned(), "unknown".to_owned()],
            state: None,
        }))
    });
    let assembler = assembler(renderer).await;

    let res = assembler
        .respond(&request("/?tab=news").logged(true), InitialData::new())
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()[header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    assert_eq!(
        res.body(),
        concat!(
            r#"<!doctype html><html lang="en"><head><meta name="description" content="Front page">"#,
            r#"<title>Home</title><link rel="canonical" href="https://example.com/"></head>"#,
            r#"<body><div id="root"><h1>Home</h1></div>"#,
            r#"<script>window.__PRELOADED_STATE__ = {"logged":true,"urlCurrent":"/?tab=news"}</script>"#,
            r#"<script src="/main.js"></script><script type="application/ld+json">{}</script>"#,
            r#"<script type="text/javascript" src="/a1b2.js"></script></body></html>"#
        )
    );
}

#[tokio::test]
async fn only_touched_chunks_are_injected() {
    let renderer = FnRenderer::new(|_: &Location, _: &State| {
        Ok(RenderOutcome::Rendered(RenderedPage {
            modules: vec!["home".to_owned()],
            ..page("")
        }))
    });
    let res = assembler(renderer)
        .await
        .respond(&request("/"), InitialData::new())
        .await;

    assert!(res
        .body()
        .contains(r#"<script type="text/javascript" src="/a1b2.js"></script>"#));
    assert!(!res.body().contains("c3d4.js"));
}

#[tokio::test]
async fn empty_title_falls_back_to_default() {
    let renderer = FnRenderer::new(|_: &Location, _: &State| Ok(RenderOutcome::Rendered(page(""))));
    let res = assembler(renderer)
        .await
        .respond(&request("/"), InitialData::new())
        .await;

    assert!(res.body().contains("<title>Fallback</title>"));
    assert!(!res.body().contains("Build title"));
}

#[tokio::test]
async fn rendered_title_wins_over_default() {
    let renderer = FnRenderer::new(|_: &Location, _: &State| {
        Ok(RenderOutcome::Rendered(RenderedPage {
            head: Head {
                title: "<title>Article</title>".to_owned(),
                ..Head::default()
            },
            ..page("")
        }))
    });
    let res = assembler(renderer)
        .await
        .respond(&request("/"), InitialData::new())
        .await;

    assert!(res.body().contains("<title>Article</title>"));
    assert!(!res.body().contains("Fallback"));
}

#[tokio::test]
async fn redirect_short_circuits_the_document() {
    let renderer = FnRenderer::new(|_: &Location, _: &State| {
        Ok(RenderOutcome::Redirect {
            url: "/login?next=%2Faccount".to_owned(),
        })
    });
    let res = assembler(renderer)
        .await
        .respond(&request("/account"), InitialData::new())
        .await;

    assert_eq!(res.status(), StatusCode::FOUND);
    assert_eq!(res.headers()[header::LOCATION], "/login?next=%2Faccount");
    assert_eq!(res.headers().len(), 1);
    assert_eq!(res.body(), "");
}

#[tokio::test]
async fn unusable_redirect_target_is_not_found() {
    let renderer = FnRenderer::new(|_: &Location, _: &State| {
        Ok(RenderOutcome::Redirect {
            url: "/next\nSet-Cookie: x=1".to_owned(),
        })
    });
    let res = assembler(renderer)
        .await
        .respond(&request("/"), InitialData::new())
        .await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.body(), "");
}

#[tokio::test]
async fn state_is_escaped_inside_the_script() {
    let renderer = FnRenderer::new(|_: &Location, _: &State| Ok(RenderOutcome::Rendered(page(""))));
    let mut data = InitialData::new();
    data.insert("comment".to_owned(), json!("<script>alert(1)</script>"));

    let res = assembler(renderer)
        .await
        .respond(&request("/"), data)
        .await;

    let body = res.body();
    assert!(body.contains(r#""comment":"\u003cscript\u003ealert(1)\u003c/script\u003e""#));
    assert!(!body.contains("<script>alert(1)"));
    assert_eq!(
        embedded_state(body)["comment"],
        json!("<script>alert(1)</script>")
    );
}

#[tokio::test]
async fn missing_template_is_not_found_and_skips_rendering() {
    let renderer = FnRenderer::new(|_: &Location, _: &State| Ok(RenderOutcome::Rendered(page("x"))));
    let calls = renderer.calls.clone();
    let cfg = SsrConfig {
        template: "/definitely/not/here/template.html".into(),
        template_source: TemplateSource::PerRequest,
        manifest: None,
        ..SsrConfig::default()
    };
    let assembler = Assembler::new(cfg, renderer).await.unwrap();

    let res = assembler.respond(&request("/"), InitialData::new()).await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.body(), "");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cached_template_must_exist_at_startup() {
    let cfg = SsrConfig {
        template: "/definitely/not/here/template.html".into(),
        template_source: TemplateSource::Cached,
        manifest: None,
        ..SsrConfig::default()
    };
    let renderer = FnRenderer::new(|_: &Location, _: &State| Ok(RenderOutcome::Rendered(page(""))));
    let err = Assembler::new(cfg, renderer).await.err().unwrap();
    assert!(matches!(err, InitializationError::InvalidTemplatePath(_)));
}

#[tokio::test]
async fn artifacts_are_loaded_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("template.html");
    let manifest = dir.path().join("manifest.json");
    std::fs::write(&template, TEMPLATE).unwrap();
    std::fs::write(&manifest, r#"{"about.js": "c3d4.js"}"#).unwrap();

    let cfg = SsrConfig {
        template,
        template_source: TemplateSource::Cached,
        manifest: Some(manifest),
        ..SsrConfig::default()
    };
    let renderer = FnRenderer::new(|_: &Location, _: &State| {
        Ok(RenderOutcome::Rendered(RenderedPage {
            modules: vec!["about".to_owned()],
            ..page("<p>About</p>")
        }))
    });
    let res = Assembler::new(cfg, renderer)
        .await
        .unwrap()
        .respond(&request("/about"), InitialData::new())
        .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.body().contains(r#"<div id="root"><p>About</p></div>"#));
    assert!(res.body().contains(r#"src="/c3d4.js""#));
}

#[tokio::test]
async fn render_exception_is_not_found() {
    let renderer = FnRenderer::new(|_: &Location, _: &State| {
        Err(RenderingError::JsExceptionDuringRendering(
            "TypeError: cannot read property 'id' of undefined".to_owned(),
        ))
    });
    let res = assembler(renderer)
        .await
        .respond(&request("/broken"), InitialData::new())
        .await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.body(), "");
}

#[tokio::test]
async fn preload_rejection_is_not_found() {
    let renderer = FnRenderer::new(|_: &Location, _: &State| Ok(RenderOutcome::Rendered(page("x"))));
    let calls = renderer.calls.clone();
    let assembler = assembler(renderer).await.with_preloader(
        |location: &Location, _: &State, preloads: &mut Preloads| {
            if location.path() == "/products/404" {
                preloads.push(async { Err(PreloadError::from("product not found")) });
            }
        },
    );

    let res = assembler
        .respond(&request("/products/404"), InitialData::new())
        .await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.body(), "");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn preloaded_data_reaches_renderer_and_client() {
    let renderer = FnRenderer::new(|_: &Location, state: &State| {
        let name = state["product"]["name"].as_str().unwrap_or("missing");
        Ok(RenderOutcome::Rendered(page(&format!("<h1>{}</h1>", name))))
    });
    let assembler = assembler(renderer).await.with_preloader(
        |location: &Location, _: &State, preloads: &mut Preloads| {
            let id = location.path().trim_start_matches("/products/").to_owned();
            preloads.push(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Action::new("product", json!({ "id": id, "name": "Lamp" })))
            });
        },
    );

    let res = assembler
        .respond(&request("/products/7"), InitialData::new())
        .await;

    assert!(res.body().contains("<h1>Lamp</h1>"));
    assert_eq!(
        embedded_state(res.body())["product"],
        json!({ "id": "7", "name": "Lamp" })
    );
}

#[tokio::test]
async fn renderer_state_replaces_store_contents() {
    let renderer = FnRenderer::new(|_: &Location, state: &State| {
        let mut after = state.clone();
        after.insert("visited".to_owned(), json!(true));
        Ok(RenderOutcome::Rendered(RenderedPage {
            state: Some(after),
            ..page("")
        }))
    });
    let res = assembler(renderer)
        .await
        .respond(&request("/"), InitialData::new())
        .await;

    assert_eq!(
        embedded_state(res.body()),
        json!({ "logged": false, "urlCurrent": "/", "visited": true })
    );
}

#[tokio::test]
async fn slow_render_times_out() {
    struct Hanging;

    #[async_trait]
    impl Renderer for Hanging {
        async fn render(&self, _: RenderRequest<'_>) -> Result<RenderOutcome, RenderingError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(RenderOutcome::Rendered(RenderedPage::default()))
        }
    }

    let cfg = SsrConfig {
        manifest: None,
        render_timeout: Some(Duration::from_millis(20)),
        ..SsrConfig::default()
    };
    let assembler = Assembler::new(cfg, Hanging)
        .await
        .unwrap()
        .with_template(Template::new(TEMPLATE));

    let res = assembler.respond(&request("/"), InitialData::new()).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stalled_preload_times_out_before_rendering() {
    let renderer = FnRenderer::new(|_: &Location, _: &State| Ok(RenderOutcome::Rendered(page("x"))));
    let calls = renderer.calls.clone();
    let cfg = SsrConfig {
        manifest: None,
        render_timeout: Some(Duration::from_millis(20)),
        ..SsrConfig::default()
    };
    let assembler = Assembler::new(cfg, renderer)
        .await
        .unwrap()
        .with_template(Template::new(TEMPLATE))
        .with_preloader(|_: &Location, _: &State, preloads: &mut Preloads| {
            preloads.push(futures::future::pending());
        });

    let res = assembler.respond(&request("/"), InitialData::new()).await;

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.body(), "");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_do_not_share_state() {
    let renderer = FnRenderer::new(|_: &Location, state: &State| {
        let user = state["user"].as_str().unwrap_or_default();
        Ok(RenderOutcome::Rendered(page(&format!("<p>{}</p>", user))))
    });
    let assembler = assembler(renderer).await.with_preloader(
        |_: &Location, state: &State, preloads: &mut Preloads| {
            let user = state["user"].clone();
            preloads.push(async move {
                tokio::task::yield_now().await;
                Ok(Action::new("echo", user))
            });
        },
    );

    let tasks: Vec<_> = (0..32)
        .map(|n| {
            let assembler = assembler.clone();
            tokio::spawn(async move {
                let mut data = InitialData::new();
                data.insert("user".to_owned(), json!(format!("user-{}", n)));
                let res = assembler.respond(&request("/me"), data).await;
                (n, res.into_body())
            })
        })
        .collect();

    for task in tasks {
        let (n, body) = task.await.unwrap();
        let expected = format!("user-{}", n);
        assert!(body.contains(&format!("<p>{}</p>", expected)));
        let state = embedded_state(&body);
        assert_eq!(state["user"], json!(expected));
        assert_eq!(state["echo"], json!(expected));
    }
}
