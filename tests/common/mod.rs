use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;

pub const PUBLIC_KEY: &str = include_str!("../fixtures/jwt_test_key.pub.pem");
const PRIVATE_KEY: &str = include_str!("../fixtures/jwt_test_key.pem");

static SERVER: OnceLock<TestServer> = OnceLock::new();

/// Integration tests need a reachable Postgres; they skip cleanly without one.
pub fn database_available() -> bool {
    std::env::var("DATABASE_URL").is_ok()
}

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    #[allow(dead_code)]
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Spawn the already-built binary to keep start fast during tests
        // Assumes debug profile; adjust if you run tests with --release
        let mut cmd = Command::new("target/debug/protocol-api-rust");
        cmd.env("PROTOCOL_API_PORT", port.to_string())
            .env("PUBLIC_KEY", PUBLIC_KEY)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // Inherit environment so the server sees DATABASE_URL from .env or the shell
        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK
                    || resp.status() == StatusCode::SERVICE_UNAVAILABLE
                {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!(
            "server did not become ready on {} within {:?}",
            self.base_url,
            timeout
        )
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Mint a signed token for the given roles, valid for an hour.
#[allow(dead_code)]
pub fn token_for(roles: &[&str]) -> String {
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

    #[derive(serde::Serialize)]
    struct TestClaims {
        roles: Vec<String>,
        exp: i64,
        iat: i64,
    }

    let now = chrono::Utc::now().timestamp();
    let claims = TestClaims {
        roles: roles.iter().map(|s| s.to_string()).collect(),
        exp: now + 3600,
        iat: now,
    };
    let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).expect("test private key");
    encode(&Header::new(Algorithm::RS256), &claims, &key).expect("encode test token")
}
