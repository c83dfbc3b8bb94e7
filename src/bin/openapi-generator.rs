use anyhow::Context;
use utoipa::OpenApi;
use volley_stats_back::services::documentation::ApiDoc;

fn main() -> anyhow::Result<()> {
    let doc = ApiDoc::openapi();
    let json = doc
        .to_pretty_json()
        .context("serialising the OpenAPI document")?;
    println!("{json}");
    Ok(())
}
