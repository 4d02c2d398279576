use settlement_shared_telemetry::init;
use std::panic;
use tracing::{info, instrument};

#[instrument(name = "test_instrumented_operation")]
fn instrumented_operation() {
    info!("executing traced operation");
}

#[tokio::test]
async fn init_installs_a_panic_hook_that_does_not_abort() {
    init("telemetry_integrity_test");

    instrumented_operation();

    let result = panic::catch_unwind(|| {
        panic!("intentional failure for panic-hook verification");
    });

    assert!(result.is_err(), "panic hook must not prevent unwinding");
}
