//! Sample Retention Client
//!
//! Generates random client profiles and sends them to the retention service
//! as NATS requests. Without a NATS connection the requests are answered
//! in-process from the configured model artifact.

use client_retention::types::profile::{
    ClientStatus, ContactMethod, Household, Month, PreferredLanguage, Season, Sex, YesNo,
    AGE_RANGE, CONTACT_METHODS_RANGE, DEPENDENTS_RANGE, DISTANCE_KM_RANGE,
};
use client_retention::{
    AppConfig, ClientProfile, InferenceEngine, RequestHandler, RetentionRequest, RetentionResponse,
};
use rand::rngs::ThreadRng;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Random profile generator covering every form value
struct ProfileGenerator {
    rng: ThreadRng,
    request_counter: u64,
}

impl ProfileGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            request_counter: 0,
        }
    }

    fn pick<T: Copy>(&mut self, values: &[T]) -> T {
        values[self.rng.gen_range(0..values.len())]
    }

    fn generate_profile(&mut self) -> ClientProfile {
        ClientProfile {
            contact_method: self.pick(ContactMethod::ALL),
            household: self.pick(Household::ALL),
            preferred_languages: self.pick(PreferredLanguage::ALL),
            sex_new: self.pick(Sex::ALL),
            status: self.pick(ClientStatus::ALL),
            season: self.pick(Season::ALL),
            month: self.pick(Month::ALL),
            latest_language_is_english: self.pick(YesNo::ALL),
            age: self.rng.gen_range(AGE_RANGE),
            dependents_qty: self.rng.gen_range(DEPENDENTS_RANGE),
            distance_km: (self.rng.gen_range(DISTANCE_KM_RANGE) * 10.0).round() / 10.0,
            num_of_contact_methods: self.rng.gen_range(CONTACT_METHODS_RANGE),
        }
    }

    fn generate_request(&mut self, explain_rate: f64) -> RetentionRequest {
        self.request_counter += 1;
        let request = RetentionRequest::new(self.generate_profile())
            .with_request_id(format!("req_{:08}", self.request_counter));
        if self.rng.gen_bool(explain_rate) {
            request.with_explanation()
        } else {
            request
        }
    }
}

fn log_response(response: &RetentionResponse) {
    match (&response.prediction, &response.error) {
        (Some(prediction), _) => {
            info!(request_id = %response.request_id, "{}", prediction);
            if let Some(attributions) = &response.attributions {
                for attribution in attributions.top(3) {
                    info!(
                        request_id = %response.request_id,
                        feature = %attribution.feature_name,
                        contribution = attribution.contribution,
                        direction = ?attribution.direction,
                        "Top attribution"
                    );
                }
            }
        }
        (None, Some(error)) => {
            warn!(
                request_id = %response.request_id,
                kind = %error.kind,
                message = %error.message,
                "Request rejected"
            );
        }
        (None, None) => warn!(request_id = %response.request_id, "Empty response"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_client=info".parse()?),
        )
        .init();

    info!("Starting Sample Retention Client");

    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Configuration not found, using defaults");
        AppConfig::default()
    });

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let count: u64 = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(20);
    let explain_rate: f64 = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.5f64)
        .clamp(0.0, 1.0);
    let delay_ms: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(250);

    info!(
        nats_url = %config.nats.url,
        subject = %config.nats.request_subject,
        count = count,
        explain_rate = explain_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(&config.nats.url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Answering requests locally.");
            return run_local(&config, count, explain_rate, delay_ms).await;
        }
    };

    let mut generator = ProfileGenerator::new();
    let mut failed = 0u64;

    for _ in 0..count {
        let request = generator.generate_request(explain_rate);
        let payload = serde_json::to_vec(&request)?;

        let message = client
            .request(config.nats.request_subject.clone(), payload.into())
            .await?;
        let response: RetentionResponse = serde_json::from_slice(&message.payload)?;
        if !response.is_success() {
            failed += 1;
        }
        log_response(&response);

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!("Completed! Sent {} requests ({} failed)", count, failed);

    Ok(())
}

async fn run_local(
    config: &AppConfig,
    count: u64,
    explain_rate: f64,
    delay_ms: u64,
) -> anyhow::Result<()> {
    let engine = InferenceEngine::from_config(config)?;
    let handler = RequestHandler::new(engine).with_top_k(config.explain.top_k);
    info!(model = handler.engine().model_name(), "Running without NATS");

    let mut generator = ProfileGenerator::new();

    for i in 0..count {
        let request = generator.generate_request(explain_rate);
        if i == 0 {
            info!("Sample request:\n{}", serde_json::to_string_pretty(&request)?);
        }
        log_response(&handler.handle(request));

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_profiles_are_valid() {
        let mut generator = ProfileGenerator::new();
        for _ in 0..200 {
            assert!(generator.generate_profile().validate().is_ok());
        }
    }

    #[test]
    fn test_request_ids_are_sequential() {
        let mut generator = ProfileGenerator::new();
        let first = generator.generate_request(0.0);
        let second = generator.generate_request(1.0);

        assert_eq!(first.request_id.as_deref(), Some("req_00000001"));
        assert_eq!(second.request_id.as_deref(), Some("req_00000002"));
        assert!(!first.explain);
        assert!(second.explain);
    }
}
