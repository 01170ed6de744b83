use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use genguard::clock::system_clock;
use genguard::crypto::{EncryptionKey, PayloadCipher, RequestSigner, SealedEnvelope};
use genguard::security::headers::X_SESSION_ID;

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Management and test client for genguard", long_about = None)]
struct Cli {
    /// Admin API base URL
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Admin API key
    #[arg(short, long, default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check guard status and tracked key counts
    Status,
    /// Show the rate-limit record of a session
    Session { id: String },
    /// Block a session for a duration
    Block {
        id: String,
        #[arg(long, default_value_t = 60_000)]
        duration_ms: u64,
    },
    /// Lift a session block
    Unblock { id: String },
    /// Forget a session's rate-limit record
    Reset { id: String },
    /// Print an encrypted, signed envelope for a JSON payload
    Seal {
        /// Shared encryption secret (hex key or passphrase)
        #[arg(long)]
        secret: String,
        /// JSON payload
        payload: String,
    },
    /// Seal a prompt and POST it to /api/generate
    Send {
        #[arg(long)]
        secret: String,
        /// Public API base URL
        #[arg(long, default_value = "http://localhost:8080")]
        api_url: String,
        #[arg(long)]
        session: Option<String>,
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", cli.key))?);
    let admin = |path: String| format!("{}/admin{}", cli.url, path);

    match cli.command {
        Commands::Status => {
            let res = client.get(admin("/status".into())).headers(headers).send().await?;
            print_response(res).await?;
        }
        Commands::Session { id } => {
            let res = client.get(admin(format!("/sessions/{id}"))).headers(headers).send().await?;
            print_response(res).await?;
        }
        Commands::Block { id, duration_ms } => {
            let res = client
                .post(admin(format!("/sessions/{id}/block")))
                .headers(headers)
                .json(&json!({ "durationMs": duration_ms }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Unblock { id } => {
            let res = client.post(admin(format!("/sessions/{id}/unblock"))).headers(headers).send().await?;
            print_response(res).await?;
        }
        Commands::Reset { id } => {
            let res = client.post(admin(format!("/sessions/{id}/reset"))).headers(headers).send().await?;
            print_response(res).await?;
        }
        Commands::Seal { secret, payload } => {
            let payload: Value = serde_json::from_str(&payload)?;
            let sealed = seal(&secret, &payload)?;
            println!("{}", serde_json::to_string_pretty(&sealed)?);
        }
        Commands::Send {
            secret,
            api_url,
            session,
            prompt,
        } => {
            let sealed = seal(&secret, &json!({ "prompt": prompt }))?;

            let mut request_headers = HeaderMap::new();
            for (name, value) in sealed.headers() {
                request_headers.insert(HeaderName::from_static(name), HeaderValue::from_str(&value)?);
            }
            if let Some(session) = session {
                request_headers.insert(X_SESSION_ID, HeaderValue::from_str(&session)?);
            }

            let res = client
                .post(format!("{}/api/generate", api_url))
                .headers(request_headers)
                .json(&sealed.envelope)
                .send()
                .await?;
            if let Some(session) = res.headers().get(X_SESSION_ID).and_then(|v| v.to_str().ok()) {
                eprintln!("Session: {}", session);
            }
            print_response(res).await?;
        }
    }

    Ok(())
}

fn seal(secret: &str, payload: &Value) -> Result<SealedEnvelope, Box<dyn std::error::Error>> {
    let key = EncryptionKey::derive(secret);
    let cipher = PayloadCipher::new(key.clone(), system_clock());
    let signer = RequestSigner::new(key);
    Ok(SealedEnvelope::seal(&cipher, &signer, payload)?)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
    }
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
