use std::sync::Arc;

use dotenvy::dotenv;
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use certchain_client::api::Validator;
use certchain_client::{AppContext, NodeProvider, RegistryConfig};

const USAGE: &str = "usage: certchain <verify <hash> | certificate <hash> | student <enrollment> | stats | admin>";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let config = RegistryConfig::load().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    // A node stands in for the injected wallet
    let node = NodeProvider::new(&config.rpc_url)?;
    let app = AppContext::new(Some(Arc::new(node)), &config)?;
    app.session.start().await;
    config.check_chain(app.session.snapshot().chain_id());
    info!("Registry at {:?} via {}", config.contract_address, config.rpc_url);

    let output = match (command, args.get(1)) {
        ("verify", Some(hash)) => {
            Validator::required(hash, "certificateHash", 128)?;
            let exists = app.certificates.try_verify_certificate(hash).await?;
            json!({ "certificateHash": hash, "exists": exists })
        }
        ("certificate", Some(hash)) => {
            Validator::required(hash, "certificateHash", 128)?;
            serde_json::to_value(app.certificates.get_certificate(hash).await?)?
        }
        ("student", Some(enrollment)) => {
            Validator::required(enrollment, "enrollmentNumber", 64)?;
            match app.certificates.try_get_student(enrollment).await? {
                Some(student) => {
                    let certificates = app.certificates.get_student_certificates(enrollment).await;
                    json!({ "student": student, "certificates": certificates })
                }
                None => json!({ "enrollmentNumber": enrollment, "registered": false }),
            }
        }
        ("stats", None) => serde_json::to_value(app.certificates.get_stats().await)?,
        ("admin", None) => {
            let admin = app.certificates.get_admin().await;
            json!({ "admin": admin, "connected": app.session.snapshot().address() })
        }
        _ => {
            eprintln!("{}", USAGE);
            app.session.shutdown();
            std::process::exit(2);
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    app.session.shutdown();
    Ok(())
}
