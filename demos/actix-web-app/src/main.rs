#[macro_use]
extern crate log;

use std::{path::PathBuf, time::Duration};

use actix_web::{
    http::{header, StatusCode},
    web, web::Data, App, HttpRequest, HttpResponse, HttpServer,
};
use serde_json::json;
use ssr_assembler::{
    Assembler, InitialData, JsWorkerLog, NodeRenderer, RequestContext, SsrConfig, TemplateSource,
    WorkerConfig,
};

const SESSION_COOKIE: &str = "session";

#[actix_web::main]
pub async fn main() -> std::io::Result<()> {
    env_logger::init();

    let renderer = NodeRenderer::spawn(WorkerConfig {
        port: 9000,
        js_worker: PathBuf::from("./ssr/js/worker.js"),
        js_worker_log: JsWorkerLog::Verbose,
        global_js_renderer: Some(PathBuf::from("./demos/actix-web-app/src/renderer.js")),
    })
    .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?;

    let assembler = Assembler::new(
        SsrConfig {
            template: PathBuf::from("./demos/actix-web-app/assets/template.html"),
            template_source: TemplateSource::Cached,
            manifest: Some(PathBuf::from("./demos/actix-web-app/assets/manifest.json")),
            default_title: "Hello, world!".to_owned(),
            render_timeout: Some(Duration::from_secs(5)),
        },
        renderer,
    )
    .await
    .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?;

    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(assembler.clone()))
            .default_service(web::get().to(page))
    })
    .bind("127.0.0.1:3000")?
    .run()
    .await
}

pub async fn page(assembler: Data<Assembler>, req: HttpRequest) -> HttpResponse {
    let uri = match req.uri().to_string().parse::<http::Uri>() {
        Ok(uri) => uri,
        Err(err) => {
            error!("Error: {}", err);
            return HttpResponse::NotFound().finish();
        }
    };
    let request = RequestContext::new(uri).logged(req.cookie(SESSION_COOKIE).is_some());

    let mut data = InitialData::new();
    data.insert("greeting".to_owned(), json!("Hello, world!"));

    let res = assembler.respond(&request, data).await;

    let status = StatusCode::from_u16(res.status().as_u16()).unwrap_or(StatusCode::NOT_FOUND);
    let mut builder = HttpResponse::build(status);
    for (actix_name, name) in [
        (header::LOCATION, http::header::LOCATION),
        (header::CONTENT_TYPE, http::header::CONTENT_TYPE),
    ] {
        if let Some(value) = res.headers().get(name).and_then(|v| v.to_str().ok()) {
            builder.insert_header((actix_name, value));
        }
    }
    builder.body(res.into_body())
}
