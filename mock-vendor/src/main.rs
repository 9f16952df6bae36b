use mock_vendor::VendorState;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "9443".to_string());
    let app_key = std::env::var("MOCK_APP_KEY").unwrap_or_else(|_| "23456789".to_string());
    let app_secret = std::env::var("MOCK_APP_SECRET").unwrap_or_else(|_| "lab-secret".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    println!("mock vendor gateway listening on {addr} (app key {app_key})");
    mock_vendor::run(listener, VendorState::new(&app_key, &app_secret)).await
}
