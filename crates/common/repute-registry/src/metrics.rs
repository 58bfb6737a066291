use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, register_int_gauge, IntCounterVec, IntGauge};

lazy_static! {
    pub static ref REGISTRY_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "repute_registry_operations_total",
        "Total number of registry operations by name and outcome",
        &["operation", "status"]
    ).unwrap();

    pub static ref REGISTRY_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "repute_registry_events_total",
        "Total number of notifications emitted by the registry",
        &["kind"]
    ).unwrap();

    pub static ref REGISTRY_REGISTERED_USERS: IntGauge = register_int_gauge!(
        "repute_registry_registered_users",
        "Number of addresses in the registration order"
    ).unwrap();

    pub static ref REGISTRY_STORE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "repute_registry_store_errors_total",
        "Total number of errors raised by registry stores",
        &["store", "operation"]
    ).unwrap();
}

pub fn record_operation(operation: &str, ok: bool) {
    let status = if ok { "success" } else { "error" };
    REGISTRY_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}

pub fn record_event(kind: &str) {
    REGISTRY_EVENTS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn set_registered_users(count: usize) {
    REGISTRY_REGISTERED_USERS.set(i64::try_from(count).unwrap_or(i64::MAX));
}

pub fn record_store_error(store: &str, operation: &str) {
    REGISTRY_STORE_ERRORS_TOTAL
        .with_label_values(&[store, operation])
        .inc();
}
