// Sportsbook Settlement Core - Main Entry Point

use std::net::SocketAddr;

use sportsbook_settlement::app_state::AppState;
use sportsbook_settlement::routes::router;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("\n═══════════════════════════════════════════════");
    println!("     Sportsbook Settlement Core");
    println!("═══════════════════════════════════════════════\n");

    let state = AppState::shared();
    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(1234);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "server listening");

    println!("Available Endpoints:");
    println!("   POST /quote                    - Price a prospective trade");
    println!("   POST /trade                    - Execute a trade");
    println!("   GET  /tickets/:id              - Ticket details");
    println!("   POST /tickets/:id/exercise     - Claim / settle one ticket");
    println!("   POST /tickets/:id/cancel       - Owner cancellation");
    println!("   POST /tickets/expire           - Forfeit expired tickets");
    println!("   POST /pool/deposit             - Deposit into next round");
    println!("   POST /pool/start               - Open the first round");
    println!("   POST /pool/withdrawal-request  - Full or partial withdrawal");
    println!("   POST /pool/exercise-batch      - Sweep resolved losers");
    println!("   POST /pool/close/prepare       - Freeze round for closing");
    println!("   POST /pool/close/batch         - Process closing users");
    println!("   POST /pool/close               - Finish closing, open next");
    println!("   GET  /pool/round/:index        - Round details");
    println!("   POST /results                  - Record winning positions");
    println!("   GET  /risk/:game_id            - Game exposure vs cap\n");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listen address");
    axum::serve(listener, app).await.expect("server error");
}
