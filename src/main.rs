#[tokio::main]
async fn main() {
    let code = queuestate::app::startup::startup().await;
    std::process::exit(code);
}
