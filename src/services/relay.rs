use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use tracing::{info, instrument, warn};

use super::composer::{Composer, ForwardingContext};
use super::normalizer::{NormalizedRequest, Normalizer};
use super::translator::{RelaySummary, Translator};
use crate::config::Config;
use crate::error::AppResult;
use crate::metrics;
use crate::models::RelayResult;
use crate::transport::Transport;
use crate::validation::DestinationPolicy;

/// The relay pipeline: normalize, validate, compose and execute, translate.
///
/// Holds only immutable, shared parts; one instance serves every request.
#[derive(Clone)]
pub struct RelayService {
    normalizer: Normalizer,
    policy: Arc<DestinationPolicy>,
    composer: Composer,
    translator: Translator,
}

impl RelayService {
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            normalizer: Normalizer::new(config),
            policy: Arc::new(DestinationPolicy::new(config.allow_private_destinations)),
            composer: Composer::new(transport, config.user_agent.clone()),
            translator: Translator::new(config.status_mode),
        }
    }

    /// Relay one inbound request and produce the outward response.
    #[instrument(skip_all, fields(request_id = context.request_id.as_deref().unwrap_or("-")))]
    pub async fn relay(&self, request: Request, context: ForwardingContext) -> Response {
        let started = Instant::now();

        let response = match self.run(request, &context).await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_relay_outcome("rejected");
                e.into_response()
            }
        };

        metrics::record_request_duration(
            response.status().as_u16(),
            started.elapsed().as_secs_f64(),
        );
        response
    }

    async fn run(&self, request: Request, context: &ForwardingContext) -> AppResult<Response> {
        let NormalizedRequest {
            codec,
            body,
            directive,
        } = self.normalizer.normalize(request).await?;

        let url = match self.policy.validate(directive.destination_url.as_deref()) {
            Ok(url) => url,
            Err(failure) => {
                warn!(reason = ?failure, "Destination rejected");
                let result = RelayResult::ValidationFailure(failure);
                metrics::record_relay_outcome(result.outcome_label());
                return Ok(self.translator.translate(result, RelaySummary::default()));
            }
        };

        let summary = RelaySummary {
            target: Some(url.to_string()),
            fields: body.field_names(),
            files: body.file_summaries(),
        };
        let target_host = url.host_str().unwrap_or_default().to_string();

        let outbound = self
            .composer
            .compose(&directive, url, codec, &body, context)?;
        let result = self
            .composer
            .execute(outbound, directive.timeout.duration)
            .await;

        let outcome = result.outcome_label();
        metrics::record_relay_outcome(outcome);
        match &result {
            RelayResult::Success(response) | RelayResult::UpstreamError(response) => {
                metrics::record_upstream_duration(response.duration.as_secs_f64());
                info!(
                    target_host = %target_host,
                    method = %directive.method,
                    codec = codec.name(),
                    status = response.status.as_u16(),
                    duration_ms = response.duration.as_millis() as u64,
                    outcome,
                    "Relayed request"
                );
            }
            RelayResult::TransportFailure { failure, timeout } => {
                warn!(
                    target_host = %target_host,
                    method = %directive.method,
                    codec = codec.name(),
                    timeout_ms = timeout.as_millis() as u64,
                    error = %failure.message,
                    outcome,
                    "Relay failed"
                );
            }
            RelayResult::ValidationFailure(_) => {}
        }

        Ok(self.translator.translate(result, summary))
    }
}
