//! In-memory lifecycle demo
//!
//! Runs one record through submit → verified decryption → benchmark
//! against a local ledger and encryption service.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use paycloak_benchmark::BenchmarkResult;
use paycloak_config::PaycloakConfig;
use paycloak_core::config::{contract_address, identity_address};
use paycloak_core::{
    Address, ComplianceMarker, LifecycleConfig, LifecycleOrchestrator, LocalEncryptionService,
    MemoryLedger, RecordDraft, WalletSession,
};
use serde::Serialize;

/// Caller used when no identity is configured
const DEMO_CALLER: Address = Address([0xA1; 20]);

/// Form fields for the demo record
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub label: String,
    pub salary: String,
    pub industry: String,
    pub experience: String,
    /// Print a JSON report instead of text
    pub json: bool,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            label: "Senior Engineer".to_string(),
            salary: "120000".to_string(),
            industry: "Technology".to_string(),
            experience: "10".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct DemoReport {
    record_id: String,
    owner: String,
    label: String,
    metadata: String,
    value: u64,
    source: String,
    benchmark: BenchmarkResult,
    compliance: ComplianceMarker,
}

pub async fn run_demo(config: DemoConfig, settings: &PaycloakConfig) -> Result<()> {
    let contract = contract_address(settings)?;
    let caller = identity_address(settings)?.unwrap_or(DEMO_CALLER);
    info!("Demo caller {} against contract {}", caller, contract);

    let fhe = Arc::new(LocalEncryptionService::new());
    let ledger = Arc::new(MemoryLedger::new(contract).with_verifier(fhe.clone()));
    let wallet = Arc::new(WalletSession::connected(caller));
    let orchestrator = LifecycleOrchestrator::new(
        wallet,
        ledger,
        fhe,
        LifecycleConfig::from_config(settings),
    );

    orchestrator
        .start()
        .await
        .context("Failed to start lifecycle")?;

    let draft = RecordDraft::parse(
        &config.label,
        &config.salary,
        &config.industry,
        &config.experience,
    )
    .context("Invalid salary record")?;

    let record = orchestrator
        .submit_record(draft)
        .await
        .context("Submission failed")?;
    if !config.json {
        println!(" Stored record {} ({})", record.id, record.label);
        println!("   handle:   {}", record.encrypted_handle);
        println!("   metadata: {}", record.metadata);
        println!("   status:   {}", orchestrator.status().message);
    }

    let verified = orchestrator
        .decrypt_record(&record.id)
        .await
        .context("Decryption failed")?;

    // second pass reads the ledger's verified value
    let cached = orchestrator
        .decrypt_record(&record.id)
        .await
        .context("Decryption failed")?;
    info!("Re-read {} via {:?}", cached.record_id, cached.source);

    if config.json {
        let report = DemoReport {
            record_id: verified.record_id,
            owner: record.owner.to_hex(),
            label: record.label,
            metadata: record.metadata,
            value: verified.value,
            source: format!("{:?}", verified.source),
            benchmark: verified.benchmark,
            compliance: verified.compliance,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!(" Verified value: {} ({:?})", verified.value, verified.source);
    println!("   verified at: {}", verified.compliance.verified_at.to_rfc3339());
    println!();
    crate::print_benchmark(&verified.benchmark);

    let stats = orchestrator.stats().await;
    println!();
    println!(
        " Records: {} total, {} verified, {:.1} avg years",
        stats.total, stats.verified, stats.average_experience
    );

    Ok(())
}
