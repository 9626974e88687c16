//! `debridfs` entrypoint.

#[tokio::main]
async fn main() {
    std::process::exit(debridfs_cli::run().await);
}
