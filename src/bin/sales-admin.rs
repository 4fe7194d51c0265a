use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use uuid::Uuid;

use sales_api::repos::PgUserStore;
use sales_api::services::auth::{Authenticator, Claims, FsKeyStore, ROLE_ADMIN};
use sales_api::services::users::UserService;

const KEY_BITS: usize = 2048;

/// Operator tooling for the sales API: signing keys, tokens and the database.
#[derive(Parser, Debug)]
#[command(name = "sales-admin", version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an RSA signing key as `<kid>.pem` (PKCS#8) and print its public key.
    Genkey {
        /// Directory the private key is written to (the service's AUTH_KEYS_FOLDER)
        #[arg(long, value_name = "DIR", default_value = "keys")]
        out_dir: PathBuf,
    },

    /// Mint a token with the same Authenticator the service uses.
    Gentoken {
        #[arg(long, value_name = "DIR", env = "AUTH_KEYS_FOLDER", default_value = "keys")]
        keys_dir: PathBuf,

        /// Signing key id; must be a private key in keys-dir
        #[arg(long, env = "AUTH_ACTIVE_KID")]
        kid: String,

        /// Subject (user id)
        #[arg(long)]
        sub: String,

        /// Role to grant; repeat for several
        #[arg(long = "role", default_value = ROLE_ADMIN)]
        roles: Vec<String>,

        #[arg(long, env = "AUTH_ISSUER", default_value = "sales-api")]
        issuer: String,

        #[arg(long, default_value_t = 1)]
        ttl_hours: u32,
    },

    /// Apply pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },

    /// Create the first ADMIN user; a no-op when the email is already taken.
    Seed {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,

        #[arg(long, default_value = "Admin Gopher")]
        name: String,

        #[arg(long, default_value = "admin@example.com")]
        email: String,

        #[arg(long, env = "ADMIN_PASSWORD")]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    match Args::parse().command {
        Command::Genkey { out_dir } => genkey(out_dir),
        Command::Gentoken {
            keys_dir,
            kid,
            sub,
            roles,
            issuer,
            ttl_hours,
        } => gentoken(keys_dir, kid, sub, roles, issuer, ttl_hours),
        Command::Migrate { database_url } => migrate(&database_url).await,
        Command::Seed {
            database_url,
            name,
            email,
            password,
        } => seed(&database_url, &name, &email, &password).await,
    }
}

fn genkey(out_dir: PathBuf) -> Result<()> {
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, KEY_BITS).context("generating private key")?;
    let public_key = RsaPublicKey::from(&private_key);

    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .context("encoding private key")?;
    let public_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .context("encoding public key")?;

    let kid = Uuid::new_v4().to_string();
    let path = out_dir.join(format!("{kid}.pem"));
    fs::write(&path, private_pem.as_bytes())
        .with_context(|| format!("writing {}", path.display()))?;

    eprintln!("private key written to {}", path.display());
    println!("kid: {kid}");
    print!("{public_pem}");
    Ok(())
}

fn gentoken(
    keys_dir: PathBuf,
    kid: String,
    sub: String,
    roles: Vec<String>,
    issuer: String,
    ttl_hours: u32,
) -> Result<()> {
    let keys = FsKeyStore::new(&keys_dir)
        .with_context(|| format!("opening key folder {}", keys_dir.display()))?;
    let auth = Authenticator::new(kid, Arc::new(keys))?;

    let iat = chrono::Utc::now().timestamp();
    let exp = iat + i64::from(ttl_hours) * 3600;
    let claims = Claims::new(sub, issuer, iat, exp, roles);

    let token = auth.generate_token(&claims)?;
    println!("{token}");
    Ok(())
}

// Connecting runs every pending migration.
async fn migrate(database_url: &str) -> Result<()> {
    PgUserStore::connect(database_url, 1)
        .await
        .context("migrating database")?;
    println!("migrations complete");
    Ok(())
}

async fn seed(database_url: &str, name: &str, email: &str, password: &str) -> Result<()> {
    let store = PgUserStore::connect(database_url, 1)
        .await
        .context("connecting to database")?;
    let users = UserService::new(Arc::new(store), "sales-api", chrono::Duration::hours(1));

    match users
        .seed_admin(chrono::Utc::now(), name, email, password)
        .await
        .map_err(|e| anyhow!("seeding admin: {e}"))?
    {
        Some(user) => println!("admin created: {} ({})", user.id, user.email),
        None => println!("{email} already exists, nothing to do"),
    }
    Ok(())
}
