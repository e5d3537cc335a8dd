mod client;
mod basic;

pub use client::HttpClient;
pub use basic::BasicClient;

/// Downloads the body at `url`, treating any non-success status as an error.
pub async fn fetch_bytes<C: HttpClient>(
    client: &C,
    url: &reqwest::Url,
) -> reqwest::Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.clone());

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}
