pub struct DispatchTracer;

impl DispatchTracer {
    pub fn dispatch_batch_span(batch_size: usize, is_once: bool) -> tracing::Span {
        tracing::info_span!("dispatch_batch", batch.size = batch_size, batch.once = is_once)
    }

    pub fn dispatch_trigger_span(trigger_id: i64, trigger_name: &str) -> tracing::Span {
        tracing::info_span!(
            "dispatch_trigger",
            trigger.id = trigger_id,
            trigger.name = trigger_name,
            log.id = tracing::field::Empty,
        )
    }

    pub fn transport_span(address: &str, log_id: i64) -> tracing::Span {
        tracing::info_span!(
            "executor_request",
            endpoint.address = address,
            log.id = log_id,
            otel.kind = "client"
        )
    }

    pub fn callback_span(log_id: i64, status: &str) -> tracing::Span {
        tracing::info_span!("executor_callback", log.id = log_id, callback.status = status)
    }
}
