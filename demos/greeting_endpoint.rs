//! Greeting endpoint demonstration.
//!
//! This demo walks a handful of requests through one endpoint:
//! 1. A valid query reaches the handler
//! 2. A missing query parameter is rejected with 400
//! 3. A malformed JSON body never reaches the handler
//! 4. A CORS preflight is answered without a handler
//!
//! Run with: `RUST_LOG=schema_endpoint=debug cargo run --example greeting_endpoint`

use schema_endpoint::web::Request;
use schema_endpoint::{cors, CorsOptions, EndpointConfig, Reply, RequestData, Response, Schema};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct GreetQuery {
    name: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Greeting {
    greeting: String,
}

async fn greet(data: RequestData<GreetQuery>) -> anyhow::Result<Reply<Greeting>> {
    Ok(Reply::ok(Greeting {
        greeting: format!("hi {}", data.query.name),
    }))
}

fn print_response(label: &str, response: &Response) {
    println!("\n=== {label} ===");
    println!("   Status: {}", response.status());
    for (name, value) in response.headers().iter() {
        println!("   {name}: {value}");
    }
    println!("   Body: {}", String::from_utf8_lossy(response.body()));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("schema_endpoint=info".parse()?),
        )
        .with_target(false)
        .init();

    let cors = cors(CorsOptions::default());
    let cors_headers = cors.headers().clone();
    let endpoint = EndpointConfig::new()
        .query(Schema::<GreetQuery>::new())
        .response(Schema::<Greeting>::new())
        .handler(move |data: RequestData<GreetQuery>| {
            let headers = cors_headers.clone();
            async move { Ok::<_, anyhow::Error>(greet(data).await?.with_headers(&headers)) }
        });

    let response = endpoint
        .handle(Request::get("/greet?name=alice")?.with_header("X-Request-Id", "demo-1"))
        .await;
    print_response("Valid query", &response);

    let response = endpoint.handle(Request::get("/greet")?).await;
    print_response("Missing name", &response);

    let request = Request::post("/greet?name=bob")?
        .with_header("Content-Type", "application/json")
        .with_body("{ broken");
    let response = endpoint.handle(request).await;
    print_response("Malformed JSON", &response);

    print_response("Preflight", &cors.preflight());

    Ok(())
}
