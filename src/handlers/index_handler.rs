// Landing page and liveness probe
use actix_web::{http::header::ContentType, web, HttpRequest, HttpResponse, Responder};
use minijinja::{context, Environment};

use super::events_handler::request_host;

const INDEX_TEMPLATE: &str = include_str!("../../templates/index.html");

pub struct IndexPage {
    env: Environment<'static>,
}

impl IndexPage {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("index.html", INDEX_TEMPLATE)?;
        Ok(Self { env })
    }

    pub fn render(&self, host: &str) -> Result<String, minijinja::Error> {
        self.env
            .get_template("index.html")?
            .render(context! { host => host })
    }
}

pub async fn handle_index(req: HttpRequest, page: web::Data<IndexPage>) -> impl Responder {
    let host = request_host(&req);
    match page.render(&host) {
        Ok(body) => HttpResponse::Ok()
            .content_type(ContentType::html())
            .body(body),
        Err(e) => {
            log::error!("Error rendering index page: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub async fn handle_healthz() -> impl Responder {
    HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body("Still OK")
}
