// src/main.rs

#[tokio::main]
async fn main() {
    reflect_ai_lib::logging::init_logging();

    if let Err(e) = reflect_ai_lib::run().await {
        tracing::error!(error = %e, "reflect-ai failed");
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
