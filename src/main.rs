use tracing_subscriber::EnvFilter;

fn main() {
    // Optional .env for local development; real env vars win.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    dioxus::launch(studychat::ui::App);
}
