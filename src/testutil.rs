// ===============================
// src/testutil.rs
// ===============================
//
// Local HTTP endpoint for adapter tests: answers every request with a fixed
// status and body.
//
use std::convert::Infallible;

use hyper::service::{make_service_fn, service_fn};
use hyper::{header, Body, Response, Server, StatusCode};
use url::Url;

pub async fn serve_fixed(status: u16, body: &'static str) -> Url {
    let code = StatusCode::from_u16(status).unwrap();
    let make = make_service_fn(move |_| async move {
        Ok::<_, Infallible>(service_fn(move |_req| async move {
            Ok::<_, Infallible>(
                Response::builder()
                    .status(code)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
        }))
    });
    let server = Server::bind(&([127, 0, 0, 1], 0).into()).serve(make);
    let addr = server.local_addr();
    tokio::spawn(server);
    Url::parse(&format!("http://{addr}/api")).unwrap()
}
