use anyhow::{Context, Result};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use sigchain::{Settings, Validator};
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: {} <zone> [type]", args[0]);
        std::process::exit(2);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sigchain=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut zone = Name::from_str(&args[1]).context("invalid zone name")?;
    zone.set_fqdn(true);

    let qtype = match args.get(2) {
        Some(rtype) => RecordType::from_str(&rtype.to_uppercase())
            .context(format!("invalid record type {rtype}"))?,
        None => RecordType::A,
    };

    let settings = Settings::default();
    settings.validate().context("invalid settings")?;
    let validator = Validator::new(settings);

    tracing::info!("resolving and validating {} {}", zone, qtype);
    let rrset = validator
        .fetch_and_validate(&zone, DNSClass::IN, qtype)
        .await
        .context(format!("validation failed for {zone}"))?;

    if rrset.is_empty() {
        println!("no records for {zone} {qtype}");
        return Ok(());
    }

    for record in &rrset {
        println!("{record}");
    }

    Ok(())
}
